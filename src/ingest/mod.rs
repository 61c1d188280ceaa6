//! Data ingestion for the crop water demand service.
//!
//! Submodules:
//! - `csv_table`: reads the per-period observation table exported from the
//!   field sensors.

pub mod csv_table;

pub use csv_table::{LoadError, load_observations, read_observations};
