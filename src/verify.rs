//! Dataset Verification Module
//!
//! Checks an observation table before it is handed to the fit and reports,
//! per column, what the data looks like and whether the regression can be
//! determined from it. Use this on a new export before wiring it into the
//! dashboard.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::analysis::fit;
use crate::model::{Observation, PREDICTOR_COLUMNS, RESPONSE_COLUMN};

/// Below this many rows per coefficient the fit is accepted but flagged.
pub const RECOMMENDED_ROWS_PER_COEFFICIENT: usize = 2;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub non_finite: usize,
    /// Statistics over the finite values only; `None` if there are none.
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub constant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetVerification {
    pub source: String,
    pub timestamp: String,
    pub status: VerificationStatus,
    pub row_count: usize,
    pub required_rows: usize,
    pub columns: Vec<ColumnSummary>,
    /// R² of a trial fit, when the dataset passed the static checks.
    pub trial_r_squared: Option<f64>,
    /// Problems that prevent a fit.
    pub errors: Vec<String>,
    /// Problems that allow a fit but weaken it.
    pub warnings: Vec<String>,
}

// ============================================================================
// Verification
// ============================================================================

fn summarize_column(name: &str, values: &[f64]) -> ColumnSummary {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let non_finite = values.len() - finite.len();

    let (min, max, mean) = if finite.is_empty() {
        (None, None, None)
    } else {
        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = finite.iter().sum::<f64>() / finite.len() as f64;
        (Some(min), Some(max), Some(mean))
    };

    ColumnSummary {
        name: name.to_string(),
        non_finite,
        min,
        max,
        mean,
        constant: non_finite == 0 && min == max,
    }
}

/// Runs all checks on an observation sequence.
///
/// A dataset fails when it has fewer rows than coefficients, any non-finite
/// value, a constant column, or when the trial fit itself fails. It passes
/// with warnings when it has fewer than `RECOMMENDED_ROWS_PER_COEFFICIENT`
/// rows per coefficient.
pub fn verify_dataset(source: &str, observations: &[Observation]) -> DatasetVerification {
    let required_rows = PREDICTOR_COLUMNS.len() + 1;
    let row_count = observations.len();

    let mut columns: Vec<ColumnSummary> = PREDICTOR_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let values: Vec<f64> = observations.iter().map(|o| o.predictors()[i]).collect();
            summarize_column(name, &values)
        })
        .collect();
    let target: Vec<f64> = observations
        .iter()
        .map(|o| o.crop_water_demand_m3_ha)
        .collect();
    columns.push(summarize_column(RESPONSE_COLUMN, &target));

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if row_count < required_rows {
        errors.push(format!(
            "{} rows cannot determine {} coefficients",
            row_count, required_rows
        ));
    } else if row_count < required_rows * RECOMMENDED_ROWS_PER_COEFFICIENT {
        warnings.push(format!(
            "only {} rows for {} coefficients; the fit will track noise",
            row_count, required_rows
        ));
    }

    for column in &columns {
        if column.non_finite > 0 {
            errors.push(format!(
                "{} has {} non-finite values",
                column.name, column.non_finite
            ));
        }
        if column.constant && row_count > 0 {
            if column.name == RESPONSE_COLUMN {
                errors.push(format!("{} is constant; R² is undefined", column.name));
            } else {
                errors.push(format!(
                    "{} is constant and indistinguishable from the bias term",
                    column.name
                ));
            }
        }
    }

    let mut trial_r_squared = None;
    if errors.is_empty() {
        match fit(observations) {
            Ok(result) => trial_r_squared = Some(result.r_squared()),
            Err(e) => errors.push(format!("trial fit failed: {}", e)),
        }
    }

    let status = if !errors.is_empty() {
        VerificationStatus::Failed
    } else if !warnings.is_empty() {
        VerificationStatus::PartialSuccess
    } else {
        VerificationStatus::Success
    };

    DatasetVerification {
        source: source.to_string(),
        timestamp: Utc::now().to_rfc3339(),
        status,
        row_count,
        required_rows,
        columns,
        trial_r_squared,
        errors,
        warnings,
    }
}

// ============================================================================
// Output
// ============================================================================

fn format_stat(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.3}", v))
        .unwrap_or_else(|| "-".to_string())
}

pub fn print_summary(report: &DatasetVerification) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("📊 DATASET VERIFICATION: {}", report.source);
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!(
        "Rows: {} (at least {} required)",
        report.row_count, report.required_rows
    );
    println!();
    println!(
        "{:<14} {:>10} {:>10} {:>10} {:>10}",
        "column", "min", "max", "mean", "non-finite"
    );
    for column in &report.columns {
        println!(
            "{:<14} {:>10} {:>10} {:>10} {:>10}",
            column.name,
            format_stat(column.min),
            format_stat(column.max),
            format_stat(column.mean),
            column.non_finite
        );
    }
    println!();

    for error in &report.errors {
        println!("✗ {}", error);
    }
    for warning in &report.warnings {
        println!("⚠ {}", warning);
    }
    if let Some(r2) = report.trial_r_squared {
        println!("Trial fit R²: {:.4}", r2);
    }

    let verdict = match report.status {
        VerificationStatus::Success => "✓ READY",
        VerificationStatus::PartialSuccess => "⚠ USABLE WITH WARNINGS",
        VerificationStatus::Failed => "✗ NOT FIT-READY",
    };
    println!("Status: {}", verdict);
    println!("═══════════════════════════════════════════════════════════");
}

// ============================================================================
// Tests
// ============================================================================
