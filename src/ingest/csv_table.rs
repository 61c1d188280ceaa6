//! Observation table loader.
//!
//! Reads the crop data export: one row per period, a header row naming the
//! columns. Only the five model columns are required; any other columns
//! (dates, field ids, notes) are ignored, and the required ones may appear in
//! any order.
//!
//! ```text
//! MONTH,HUM_PCT,TEMP_C,SMOIST_G_CM3,ET_MM,CWD_M3_HA
//! 1,50,20,0.30,4.0,120
//! 2,55,22,0.28,4.5,130
//! ```
//!
//! Values are parsed but not range-checked. `NaN`/`inf` literals are valid
//! floats here and are rejected by the fit instead, so the loader and the
//! engine report the same data problem the same way regardless of source.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::logging::{self, Stage};
use crate::model::{
    COL_EVAPOTRANSPIRATION, COL_HUMIDITY, COL_SOIL_MOISTURE, COL_TEMPERATURE, Observation,
    RESPONSE_COLUMN,
};

/// Columns that must be present in the header, in the order the loader
/// reads them into an `Observation`.
pub const REQUIRED_COLUMNS: [&str; 5] = [
    COL_HUMIDITY,
    COL_TEMPERATURE,
    COL_SOIL_MOISTURE,
    COL_EVAPOTRANSPIRATION,
    RESPONSE_COLUMN,
];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for observation loading. Row numbers count data rows from 1.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to open {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse CSV: {0}")]
    Csv(String),

    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),

    #[error("Row {row}: {column} is empty")]
    MissingValue { row: usize, column: &'static str },

    #[error("Row {row}: {column} value '{value}' is not a number")]
    InvalidNumber {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("No observations found")]
    NoObservations,
}

impl From<csv::Error> for LoadError {
    fn from(e: csv::Error) -> Self {
        LoadError::Csv(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Loads observations from a CSV file, preserving row order.
pub fn load_observations(path: &Path) -> Result<Vec<Observation>, LoadError> {
    let file = File::open(path).map_err(|e| LoadError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let observations = read_observations(BufReader::new(file))?;
    logging::info(
        Stage::Ingest,
        Some(&path.display().to_string()),
        &format!("Loaded {} observations", observations.len()),
    );
    Ok(observations)
}

/// Parses observations from any CSV source.
pub fn read_observations<R: Read>(source: R) -> Result<Vec<Observation>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    let mut indices = [0usize; REQUIRED_COLUMNS.len()];
    for (slot, name) in indices.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h == name)
            .ok_or(LoadError::MissingColumn(name))?;
    }

    let mut observations = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let row = i + 1;

        let mut values = [0.0f64; REQUIRED_COLUMNS.len()];
        for ((value, &idx), column) in values.iter_mut().zip(&indices).zip(REQUIRED_COLUMNS) {
            *value = parse_field(record.get(idx), row, column)?;
        }

        let [hum, temp, smoist, et, cwd] = values;
        observations.push(Observation {
            humidity_pct: hum,
            temperature_c: temp,
            soil_moisture_g_cm3: smoist,
            evapotranspiration_mm: et,
            crop_water_demand_m3_ha: cwd,
        });
    }

    if observations.is_empty() {
        return Err(LoadError::NoObservations);
    }
    Ok(observations)
}

fn parse_field(field: Option<&str>, row: usize, column: &'static str) -> Result<f64, LoadError> {
    match field {
        None | Some("") => Err(LoadError::MissingValue { row, column }),
        Some(text) => text.parse::<f64>().map_err(|_| LoadError::InvalidNumber {
            row,
            column,
            value: text.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
HUM_PCT,TEMP_C,SMOIST_G_CM3,ET_MM,CWD_M3_HA
50,20,0.3,4,120
55,22,0.28,4.5,130
48,19,0.31,3.8,115
";

    #[test]
    fn test_reads_rows_in_order() {
        let obs = read_observations(SAMPLE.as_bytes()).unwrap();
        assert_eq!(obs.len(), 3);
        assert_eq!(obs[0].humidity_pct, 50.0);
        assert_eq!(obs[1].soil_moisture_g_cm3, 0.28);
        assert_eq!(obs[2].crop_water_demand_m3_ha, 115.0);
    }

    #[test]
    fn test_column_order_and_extra_columns_do_not_matter() {
        let csv = "\
MONTH, CWD_M3_HA, ET_MM, NOTE, SMOIST_G_CM3, TEMP_C, HUM_PCT
1, 120, 4, dry, 0.3, 20, 50
";
        let obs = read_observations(csv.as_bytes()).unwrap();
        assert_eq!(
            obs[0],
            Observation {
                humidity_pct: 50.0,
                temperature_c: 20.0,
                soil_moisture_g_cm3: 0.3,
                evapotranspiration_mm: 4.0,
                crop_water_demand_m3_ha: 120.0,
            }
        );
    }

    #[test]
    fn test_missing_column_is_reported_by_name() {
        let csv = "HUM_PCT,TEMP_C,SMOIST_G_CM3,CWD_M3_HA\n50,20,0.3,120\n";
        match read_observations(csv.as_bytes()) {
            Err(LoadError::MissingColumn(name)) => assert_eq!(name, "ET_MM"),
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_cell_is_missing_value() {
        let csv = "HUM_PCT,TEMP_C,SMOIST_G_CM3,ET_MM,CWD_M3_HA\n50,20,0.3,4,120\n55,,0.28,4.5,130\n";
        match read_observations(csv.as_bytes()) {
            Err(LoadError::MissingValue { row, column }) => {
                assert_eq!(row, 2);
                assert_eq!(column, "TEMP_C");
            }
            other => panic!("expected MissingValue, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_cell_is_invalid_number() {
        let csv = "HUM_PCT,TEMP_C,SMOIST_G_CM3,ET_MM,CWD_M3_HA\n50,20,wet,4,120\n";
        let err = read_observations(csv.as_bytes()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Row 1: SMOIST_G_CM3 value 'wet' is not a number"
        );
    }

    #[test]
    fn test_nan_literal_passes_through_for_the_fit_to_reject() {
        let csv = "HUM_PCT,TEMP_C,SMOIST_G_CM3,ET_MM,CWD_M3_HA\nNaN,20,0.3,4,120\n";
        let obs = read_observations(csv.as_bytes()).unwrap();
        assert!(obs[0].humidity_pct.is_nan());
    }

    #[test]
    fn test_header_only_is_no_observations() {
        let csv = "HUM_PCT,TEMP_C,SMOIST_G_CM3,ET_MM,CWD_M3_HA\n";
        assert!(matches!(
            read_observations(csv.as_bytes()),
            Err(LoadError::NoObservations)
        ));
    }

    #[test]
    fn test_ragged_row_is_csv_error() {
        let csv = "HUM_PCT,TEMP_C,SMOIST_G_CM3,ET_MM,CWD_M3_HA\n50,20,0.3\n";
        assert!(matches!(
            read_observations(csv.as_bytes()),
            Err(LoadError::Csv(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", SAMPLE).unwrap();

        let obs = load_observations(file.path()).unwrap();
        assert_eq!(obs.len(), 3);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_observations(Path::new("/nonexistent/crop_data.csv"));
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }
}
