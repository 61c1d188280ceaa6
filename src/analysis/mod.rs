//! Model fitting for the crop water demand service.
//!
//! Submodules:
//! - `regression`: closed-form least-squares fit of crop water demand
//!   against the agronomic predictors.
//! - `goodness`: residual/total sums of squares and R².

pub mod goodness;
pub mod regression;

pub use regression::{fit, fit_design, fit_with};
