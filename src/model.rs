//! Core data types for the crop water demand service.
//!
//! This module defines the shared domain model imported by all other modules:
//! the observation record, the documented predictor column order, the fit
//! result handed to the presentation layer, and the fit error taxonomy.
//! It contains no I/O.

use nalgebra::DVector;

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

/// Label of the constant column prepended to every design matrix.
pub const BIAS_COLUMN: &str = "BIAS";

/// Relative humidity, percent.
pub const COL_HUMIDITY: &str = "HUM_PCT";

/// Air temperature, °C.
pub const COL_TEMPERATURE: &str = "TEMP_C";

/// Soil moisture, g/cm³.
pub const COL_SOIL_MOISTURE: &str = "SMOIST_G_CM3";

/// Evapotranspiration, mm.
pub const COL_EVAPOTRANSPIRATION: &str = "ET_MM";

/// Crop water demand, m³/ha. The regression target.
pub const RESPONSE_COLUMN: &str = "CWD_M3_HA";

/// Predictor columns in design-matrix order. Column `i + 1` of the design
/// matrix holds `PREDICTOR_COLUMNS[i]`; column 0 is the bias.
pub const PREDICTOR_COLUMNS: [&str; 4] = [
    COL_HUMIDITY,
    COL_TEMPERATURE,
    COL_SOIL_MOISTURE,
    COL_EVAPOTRANSPIRATION,
];

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// One period of agronomic measurements for a field.
///
/// Sequences of observations are ordered by period. The order is kept so the
/// presentation layer can plot against a period index; the fit ignores it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub humidity_pct: f64,
    pub temperature_c: f64,
    pub soil_moisture_g_cm3: f64,
    pub evapotranspiration_mm: f64,
    pub crop_water_demand_m3_ha: f64,
}

impl Observation {
    /// Predictor values in `PREDICTOR_COLUMNS` order.
    pub fn predictors(&self) -> [f64; 4] {
        [
            self.humidity_pct,
            self.temperature_c,
            self.soil_moisture_g_cm3,
            self.evapotranspiration_mm,
        ]
    }

    /// Returns the name of the first field holding a NaN or infinity.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        PREDICTOR_COLUMNS
            .iter()
            .zip(self.predictors())
            .find(|(_, v)| !v.is_finite())
            .map(|(name, _)| *name)
            .or_else(|| {
                (!self.crop_water_demand_m3_ha.is_finite()).then_some(RESPONSE_COLUMN)
            })
    }
}

// ---------------------------------------------------------------------------
// Fit result
// ---------------------------------------------------------------------------

/// Output of one least-squares fit. Read-only once returned.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    coefficients: DVector<f64>,
    observed: DVector<f64>,
    fitted: DVector<f64>,
    residual_sum_of_squares: f64,
    total_sum_of_squares: f64,
    r_squared: f64,
    column_labels: Vec<String>,
}

/// Design column labels for a matrix assembled from `Observation`s.
pub fn observation_column_labels() -> Vec<String> {
    std::iter::once(BIAS_COLUMN)
        .chain(PREDICTOR_COLUMNS)
        .map(String::from)
        .collect()
}

/// Positional labels `x0, x1, ...` for a caller-built design matrix.
pub fn positional_column_labels(k: usize) -> Vec<String> {
    (0..k).map(|i| format!("x{}", i)).collect()
}

impl FitResult {
    pub(crate) fn new(
        coefficients: DVector<f64>,
        observed: DVector<f64>,
        fitted: DVector<f64>,
        residual_sum_of_squares: f64,
        total_sum_of_squares: f64,
        r_squared: f64,
    ) -> Self {
        let coefficients_len = coefficients.len();
        Self {
            coefficients,
            observed,
            fitted,
            residual_sum_of_squares,
            total_sum_of_squares,
            r_squared,
            column_labels: positional_column_labels(coefficients_len),
        }
    }

    /// Replaces the positional labels with the design's column names.
    pub(crate) fn with_column_labels(mut self, labels: Vec<String>) -> Self {
        if labels.len() == self.coefficients.len() {
            self.column_labels = labels;
        }
        self
    }

    /// Coefficient vector `w`; entry 0 is the bias term.
    pub fn coefficients(&self) -> &[f64] {
        self.coefficients.as_slice()
    }

    /// Target values the model was fitted to, in input order.
    pub fn observed(&self) -> &[f64] {
        self.observed.as_slice()
    }

    /// Fitted values `X · w`, in input order.
    pub fn fitted(&self) -> &[f64] {
        self.fitted.as_slice()
    }

    pub fn residual_sum_of_squares(&self) -> f64 {
        self.residual_sum_of_squares
    }

    pub fn total_sum_of_squares(&self) -> f64 {
        self.total_sum_of_squares
    }

    /// Coefficient of determination.
    pub fn r_squared(&self) -> f64 {
        self.r_squared
    }

    /// Number of observations in the fit.
    pub fn n_observations(&self) -> usize {
        self.observed.len()
    }

    /// Pairs each coefficient with its column label: `BIAS` then the
    /// predictors for fits assembled from `Observation`s, `x0, x1, ...` for
    /// fits of a caller-built design matrix.
    pub fn labelled_coefficients(&self) -> Vec<(String, f64)> {
        self.column_labels
            .iter()
            .cloned()
            .zip(self.coefficients.iter().copied())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Solve mode
// ---------------------------------------------------------------------------

/// How the least-squares system is solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolveMode {
    /// LU solve of the normal equations. Singular systems are an error.
    #[default]
    Exact,
    /// Minimum-norm solution through the SVD of the design matrix.
    /// Rank-deficient designs are accepted.
    PseudoInverse,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when fitting the regression model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    /// Empty input, a non-finite value, mismatched shapes, or a target with
    /// zero variance.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// The Gram matrix `XᵗX` cannot be inverted.
    #[error("Singular system: {0}")]
    SingularSystem(String),
}
