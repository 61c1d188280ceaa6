//! End-to-end tests for the regression pipeline
//!
//! These tests verify:
//! 1. The bundled observation table loads and fits
//! 2. Tables written to disk go through load → verify → fit → report
//! 3. The report JSON written to disk matches the fit
//! 4. The bundled dashboard config parses and matches the defaults
//!
//! Run with: cargo test --test regression_pipeline

use agridash_service::analysis::{self, regression};
use agridash_service::config::DashboardConfig;
use agridash_service::ingest::{self, LoadError};
use agridash_service::model::{FitError, SolveMode};
use agridash_service::report::{self, DashboardReport};
use agridash_service::verify::{self, VerificationStatus};

use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn bundled(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(path)
}

fn write_table(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create temp file");
    write!(file, "{}", contents).expect("failed to write temp table");
    file
}

const HEADER: &str = "MONTH,HUM_PCT,TEMP_C,SMOIST_G_CM3,ET_MM,CWD_M3_HA\n";

const SEASON: &str = "\
1,50,20,0.30,4.0,119.5
2,55,26,0.22,3.1,131.7
3,48,17,0.35,5.2,117.2
4,60,22,0.27,4.6,140.7
5,52,24,0.25,3.7,128.9
6,58,19,0.31,4.9,128.9
7,45,21,0.33,3.3,109.4
8,63,27,0.21,5.5,162.3
9,51,18,0.29,4.1,117.3
10,57,23,0.24,3.9,132.3
11,49,25,0.34,4.4,130.9
12,62,16,0.28,5.0,128.3
";

// ---------------------------------------------------------------------------
// Bundled data
// ---------------------------------------------------------------------------

#[test]
fn test_bundled_table_fits_four_years_of_months() {
    let observations = ingest::load_observations(&bundled("data/crop_data.csv"))
        .expect("bundled crop data should load");
    assert_eq!(observations.len(), 48);

    let fit = analysis::fit(&observations).expect("bundled crop data should fit");
    assert_eq!(fit.coefficients().len(), 5);
    assert_eq!(fit.fitted().len(), 48);
    assert!(
        fit.r_squared() > 0.9 && fit.r_squared() < 1.0,
        "unexpected R² {}",
        fit.r_squared()
    );
}

#[test]
fn test_bundled_config_matches_defaults() {
    let config = DashboardConfig::parse(
        &std::fs::read_to_string(bundled("agridash.toml")).expect("bundled config should exist"),
    )
    .expect("bundled config should parse");
    assert_eq!(config, DashboardConfig::default());
}

// ---------------------------------------------------------------------------
// Full pipeline
// ---------------------------------------------------------------------------

#[test]
fn test_table_to_report_on_disk() {
    let table = write_table(&format!("{}{}", HEADER, SEASON));
    let observations = ingest::load_observations(table.path()).unwrap();

    let verification = verify::verify_dataset("season", &observations);
    assert_eq!(verification.status, VerificationStatus::Success);

    let fit = analysis::fit(&observations).unwrap();
    let dashboard = report::build_report(&DashboardConfig::default(), &fit).unwrap();

    let out = NamedTempFile::new().unwrap();
    report::write_report(&dashboard, out.path()).unwrap();

    let written: DashboardReport =
        serde_json::from_str(&std::fs::read_to_string(out.path()).unwrap()).unwrap();
    assert_eq!(written.regression.observed.len(), 12);
    assert_eq!(written.regression.observed[7], 162.3);
    assert_eq!(written.regression.coefficients.len(), 5);
    assert!((written.regression.r_squared - fit.r_squared()).abs() < 1e-12);
    for (a, b) in written.regression.fitted.iter().zip(fit.fitted()) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn test_fitted_series_tracks_observed_series() {
    let table = write_table(&format!("{}{}", HEADER, SEASON));
    let observations = ingest::load_observations(table.path()).unwrap();
    let fit = analysis::fit(&observations).unwrap();

    let x = regression::design_matrix(&observations);
    let w = nalgebra::DVector::from_column_slice(fit.coefficients());
    let y_hat = &x * &w;
    for (i, (a, b)) in y_hat.iter().zip(fit.fitted()).enumerate() {
        assert!((a - b).abs() < 1e-9, "period {}: {} vs {}", i, a, b);
    }

    let residual_total: f64 = fit
        .observed()
        .iter()
        .zip(fit.fitted())
        .map(|(y, f)| y - f)
        .sum();
    // With a bias column the residuals sum to zero.
    assert!(residual_total.abs() < 1e-8, "residual sum {}", residual_total);
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

#[test]
fn test_constant_demand_table_is_rejected_before_solving() {
    let table = write_table(&format!(
        "{}1,50,20,0.30,4.0,125\n2,55,26,0.22,3.1,125\n3,48,17,0.35,5.2,125\n\
         4,60,22,0.27,4.6,125\n5,52,24,0.25,3.7,125\n6,58,19,0.31,4.9,125\n",
        HEADER
    ));
    let observations = ingest::load_observations(table.path()).unwrap();
    assert!(matches!(
        analysis::fit(&observations),
        Err(FitError::InvalidInput(_))
    ));
}

#[test]
fn test_nan_cell_loads_then_fails_the_fit() {
    let table = write_table(&format!(
        "{}1,50,20,0.30,NaN,119.5\n{}",
        HEADER,
        &SEASON[SEASON.find('\n').unwrap() + 1..]
    ));
    let observations = ingest::load_observations(table.path()).unwrap();
    match analysis::fit(&observations) {
        Err(FitError::InvalidInput(msg)) => assert!(msg.contains("ET_MM"), "{}", msg),
        other => panic!("expected InvalidInput, got {:?}", other),
    }
}

#[test]
fn test_walkthrough_table_needs_pseudo_inverse() {
    let table = write_table(&format!(
        "{}1,50,20,0.3,4,120\n2,55,22,0.28,4.5,130\n3,48,19,0.31,3.8,115\n\
         4,60,25,0.25,5,140\n5,52,21,0.29,4.2,125\n",
        HEADER
    ));
    let observations = ingest::load_observations(table.path()).unwrap();

    assert!(matches!(
        analysis::fit(&observations),
        Err(FitError::SingularSystem(_))
    ));

    let fit = analysis::fit_with(&observations, SolveMode::PseudoInverse).unwrap();
    assert_eq!(fit.coefficients().len(), 5);
    assert!(fit.coefficients().iter().all(|w| w.is_finite()));
    assert!(fit.r_squared() > 0.0 && fit.r_squared() < 1.0);
}

#[test]
fn test_table_without_target_column_is_rejected() {
    let table = write_table("HUM_PCT,TEMP_C,SMOIST_G_CM3,ET_MM\n50,20,0.3,4\n");
    match ingest::load_observations(table.path()) {
        Err(LoadError::MissingColumn(name)) => assert_eq!(name, "CWD_M3_HA"),
        other => panic!("expected MissingColumn, got {:?}", other),
    }
}
