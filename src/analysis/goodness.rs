//! Sum-of-squares scoring for a fitted model.

use nalgebra::DVector;

use crate::model::FitError;

/// `(Y − Ŷ)ᵗ(Y − Ŷ)`
pub fn residual_sum_of_squares(observed: &DVector<f64>, fitted: &DVector<f64>) -> f64 {
    let residuals = observed - fitted;
    residuals.dot(&residuals)
}

/// `(Y − ȳ)ᵗ(Y − ȳ)`
pub fn total_sum_of_squares(observed: &DVector<f64>) -> f64 {
    let mean = observed.mean();
    let centered = observed.map(|v| v - mean);
    centered.dot(&centered)
}

/// `1 − SSR/SST`.
///
/// R² is undefined for a target with no variance, so `sst == 0` is
/// rejected rather than producing NaN or infinity.
pub fn r_squared(ssr: f64, sst: f64) -> Result<f64, FitError> {
    if sst <= 0.0 {
        return Err(FitError::InvalidInput(
            "target has zero variance; R² is undefined".to_string(),
        ));
    }
    Ok(1.0 - ssr / sst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_residual_sum_of_squares() {
        let y = DVector::from_vec(vec![1.0, 2.0, 3.0]);
        let y_hat = DVector::from_vec(vec![1.5, 2.0, 2.0]);
        assert!((residual_sum_of_squares(&y, &y_hat) - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_total_sum_of_squares_about_the_mean() {
        let y = DVector::from_vec(vec![2.0, 4.0, 6.0]);
        assert!((total_sum_of_squares(&y) - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_r_squared_perfect_and_partial() {
        assert_eq!(r_squared(0.0, 10.0).unwrap(), 1.0);
        assert!((r_squared(2.5, 10.0).unwrap() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_r_squared_can_be_negative_when_residuals_exceed_variance() {
        // Not reachable from a least-squares fit with a bias column, but the
        // scoring function itself does not clamp.
        assert!(r_squared(20.0, 10.0).unwrap() < 0.0);
    }

    #[test]
    fn test_zero_total_sum_of_squares_is_invalid_input() {
        let result = r_squared(0.0, 0.0);
        assert!(
            matches!(result, Err(FitError::InvalidInput(_))),
            "SST of zero should be rejected, got {:?}",
            result
        );
    }
}
