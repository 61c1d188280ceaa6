//! Crop water demand regression service.
//!
//! Loads per-period agronomic observations, fits crop water demand against
//! humidity, temperature, soil moisture and evapotranspiration by ordinary
//! least squares, and assembles the payload a dashboard renders from the
//! fit.
//!
//! ```no_run
//! use std::path::Path;
//! use agridash_service::{analysis, ingest};
//!
//! let observations = ingest::load_observations(Path::new("data/crop_data.csv"))?;
//! let fit = analysis::fit(&observations)?;
//! println!("R² = {}", fit.r_squared());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod analysis;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod report;
pub mod verify;
