//! Ordinary least-squares fit of crop water demand.
//!
//! The model is `CWD = w0 + w1·HUM + w2·TEMP + w3·SMOIST + w4·ET`, solved in
//! closed form from the normal equations `XᵗX · w = XᵗY`.
//!
//! # Singularity
//! The Gram matrix is Jacobi-scaled (unit diagonal) before the LU
//! factorisation, so the pivot test does not depend on the predictors' units:
//! humidity in the tens and soil moisture in the tenths produce Gram entries
//! several orders of magnitude apart. A scaled pivot at rounding-error scale
//! (`pivot_tolerance`) means the columns are linearly dependent to working
//! precision and the fit fails with `SingularSystem`. Ill-conditioned but
//! full-rank designs, such as nearly collinear predictors or a predictor with
//! a large offset, still solve. There is no silent fallback; callers that
//! want a rank-deficient answer ask for `SolveMode::PseudoInverse`.

use nalgebra::{DMatrix, DVector};

use crate::analysis::goodness::{r_squared, residual_sum_of_squares, total_sum_of_squares};
use crate::model::{
    FitError, FitResult, Observation, PREDICTOR_COLUMNS, SolveMode, observation_column_labels,
};

/// Multiple of `f64::EPSILON` per coefficient below which a scaled pivot
/// counts as zero.
pub const PIVOT_EPSILONS: f64 = 100.0;

/// Smallest acceptable LU pivot of the unit-diagonal Gram matrix of a
/// `k`-column design.
pub fn pivot_tolerance(k: usize) -> f64 {
    PIVOT_EPSILONS * k as f64 * f64::EPSILON
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Builds the `n × (1 + p)` design matrix: a column of 1.0 followed by the
/// predictors in `PREDICTOR_COLUMNS` order.
pub fn design_matrix(observations: &[Observation]) -> DMatrix<f64> {
    DMatrix::from_fn(
        observations.len(),
        PREDICTOR_COLUMNS.len() + 1,
        |row, col| match col {
            0 => 1.0,
            c => observations[row].predictors()[c - 1],
        },
    )
}

/// Builds the `n × 1` target vector of crop water demand, same row order as
/// `design_matrix`.
pub fn target_vector(observations: &[Observation]) -> DVector<f64> {
    DVector::from_iterator(
        observations.len(),
        observations.iter().map(|o| o.crop_water_demand_m3_ha),
    )
}

// ---------------------------------------------------------------------------
// Fitting
// ---------------------------------------------------------------------------

/// Fits the model with the exact normal-equation solve.
pub fn fit(observations: &[Observation]) -> Result<FitResult, FitError> {
    fit_with(observations, SolveMode::Exact)
}

/// Fits the model with an explicitly chosen solve mode.
///
/// Every observation is checked for non-finite values before any matrix is
/// assembled; the first offending row and column are named in the error.
pub fn fit_with(observations: &[Observation], mode: SolveMode) -> Result<FitResult, FitError> {
    if observations.is_empty() {
        return Err(FitError::InvalidInput("no observations to fit".to_string()));
    }

    for (row, obs) in observations.iter().enumerate() {
        if let Some(column) = obs.first_non_finite() {
            return Err(FitError::InvalidInput(format!(
                "row {}: {} is not a finite number",
                row, column
            )));
        }
    }

    let x = design_matrix(observations);
    let y = target_vector(observations);
    Ok(fit_design(&x, &y, mode)?.with_column_labels(observation_column_labels()))
}

/// Fits `y ≈ x · w` for an already-assembled design matrix.
///
/// Coefficients are labelled by position (`x0, x1, ...`), since the column
/// meaning is the caller's. `x` is expected to carry its own bias column; without one the fitted
/// values are not centred and R² loses its `≤ 1` guarantee.
pub fn fit_design(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    mode: SolveMode,
) -> Result<FitResult, FitError> {
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(FitError::InvalidInput(format!(
            "design matrix is empty ({}x{})",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.nrows() != y.len() {
        return Err(FitError::InvalidInput(format!(
            "design matrix has {} rows but target has {}",
            x.nrows(),
            y.len()
        )));
    }
    // Column-major storage: flat index i is (i % nrows, i / nrows).
    if let Some(i) = x.iter().position(|v| !v.is_finite()) {
        return Err(FitError::InvalidInput(format!(
            "design matrix entry ({}, {}) is not a finite number",
            i % x.nrows(),
            i / x.nrows()
        )));
    }
    if let Some(row) = y.iter().position(|v| !v.is_finite()) {
        return Err(FitError::InvalidInput(format!(
            "target row {} is not a finite number",
            row
        )));
    }
    if y.iter().all(|&v| v == y[0]) {
        return Err(FitError::InvalidInput(format!(
            "target is constant ({}); R² is undefined",
            y[0]
        )));
    }

    let coefficients = match mode {
        SolveMode::Exact => solve_normal_equations(x, y)?,
        SolveMode::PseudoInverse => solve_pseudo_inverse(x, y)?,
    };

    let fitted = x * &coefficients;
    let ssr = residual_sum_of_squares(y, &fitted);
    let sst = total_sum_of_squares(y);
    let r2 = r_squared(ssr, sst)?;

    Ok(FitResult::new(coefficients, y.clone(), fitted, ssr, sst, r2))
}

// ---------------------------------------------------------------------------
// Solvers
// ---------------------------------------------------------------------------

/// LU solve of `XᵗX · w = XᵗY` on the Jacobi-scaled system
/// `(D^-½ G D^-½)(D^½ w) = D^-½ m`.
fn solve_normal_equations(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
) -> Result<DVector<f64>, FitError> {
    let n = x.nrows();
    let k = x.ncols();
    if n < k {
        return Err(FitError::SingularSystem(format!(
            "{} observations cannot determine {} coefficients",
            n, k
        )));
    }

    let gram = x.transpose() * x;
    let moment = x.transpose() * y;

    let diag = gram.diagonal();
    if let Some(col) = diag.iter().position(|&d| d <= 0.0) {
        return Err(FitError::SingularSystem(format!(
            "design column {} is identically zero",
            col
        )));
    }
    let scale = diag.map(|d| 1.0 / d.sqrt());
    let scaled_gram = DMatrix::from_fn(k, k, |i, j| gram[(i, j)] * scale[i] * scale[j]);
    let scaled_moment = moment.component_mul(&scale);

    let lu = scaled_gram.lu();
    let min_pivot = lu
        .u()
        .diagonal()
        .iter()
        .fold(f64::INFINITY, |acc, p| acc.min(p.abs()));
    if min_pivot.is_nan() || min_pivot < pivot_tolerance(k) {
        return Err(FitError::SingularSystem(format!(
            "Gram matrix is not invertible (smallest scaled pivot {:.3e})",
            min_pivot
        )));
    }

    let z = lu.solve(&scaled_moment).ok_or_else(|| {
        FitError::SingularSystem("LU back-substitution hit a zero pivot".to_string())
    })?;
    Ok(z.component_mul(&scale))
}

/// Minimum-norm least-squares solution from the SVD of `X`.
fn solve_pseudo_inverse(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>, FitError> {
    let svd = x.clone().svd(true, true);
    let largest = svd.singular_values.max();
    let eps = largest * (x.nrows().max(x.ncols()) as f64) * f64::EPSILON;
    svd.solve(y, eps)
        .map_err(|e| FitError::SingularSystem(format!("SVD solve failed: {}", e)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
