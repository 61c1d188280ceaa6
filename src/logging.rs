//! Structured logging for the crop water demand service.
//!
//! Provides levelled logging tagged with the pipeline stage and, where one
//! exists, the dataset or file the message concerns. Supports console output
//! and an append-only log file for unattended report generation.
//!
//! The logger is process-wide and initialised once by the binary. Until
//! `init_logger` is called every logging function is a no-op, so library
//! code and tests can call them freely.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;
use std::sync::Mutex;

use crate::ingest::LoadError;
use crate::model::FitError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Config,
    Ingest,
    Fit,
    Report,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Config => write!(f, "CFG"),
            Stage::Ingest => write!(f, "INGEST"),
            Stage::Fit => write!(f, "FIT"),
            Stage::Report => write!(f, "REPORT"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// The dataset is unusable as given: missing or non-finite values,
    /// a constant target, a malformed table. Fixed by correcting the data.
    Data,
    /// The data is well formed but cannot determine the model: too few
    /// periods or collinear predictors.
    Model,
    /// Files could not be opened or written.
    Environment,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Data => write!(f, "DATA"),
            FailureType::Model => write!(f, "MODEL"),
            FailureType::Environment => write!(f, "ENV"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut global) = LOGGER.lock() {
            *global = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, stage: &Stage, subject: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let log_entry = format_entry(
            &Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            level,
            stage,
            subject,
            message,
        );
        let subject_part = subject.map(|s| format!(" [{}]", s)).unwrap_or_default();

        // Console output. Everything goes to stderr; stdout carries report
        // and verification output.
        if self.console_timestamps {
            eprintln!("{}", log_entry);
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", stage, subject_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", stage, subject_part, message),
                LogLevel::Info => eprintln!("   {}", message),
                LogLevel::Debug => eprintln!("   [DEBUG] {}", message),
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

/// One log line: `<timestamp> <LEVEL> <STAGE>[ [subject]]: <message>`.
fn format_entry(
    timestamp: &str,
    level: LogLevel,
    stage: &Stage,
    subject: Option<&str>,
    message: &str,
) -> String {
    let subject_part = subject.map(|s| format!(" [{}]", s)).unwrap_or_default();
    format!("{} {} {}{}: {}", timestamp, level, stage, subject_part, message)
}

fn with_logger(level: LogLevel, stage: Stage, subject: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, &stage, subject, message);
        }
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

/// Log a general informational message
pub fn info(stage: Stage, subject: Option<&str>, message: &str) {
    with_logger(LogLevel::Info, stage, subject, message);
}

/// Log a warning message
pub fn warn(stage: Stage, subject: Option<&str>, message: &str) {
    with_logger(LogLevel::Warning, stage, subject, message);
}

/// Log an error message
pub fn error(stage: Stage, subject: Option<&str>, message: &str) {
    with_logger(LogLevel::Error, stage, subject, message);
}

/// Log a debug message
pub fn debug(stage: Stage, subject: Option<&str>, message: &str) {
    with_logger(LogLevel::Debug, stage, subject, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

pub fn classify_fit_failure(err: &FitError) -> FailureType {
    match err {
        FitError::InvalidInput(_) => FailureType::Data,
        FitError::SingularSystem(_) => FailureType::Model,
    }
}

pub fn classify_load_failure(err: &LoadError) -> FailureType {
    match err {
        LoadError::Io { .. } => FailureType::Environment,
        _ => FailureType::Data,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a fit failure with classification. Data problems are warnings (the
/// table needs fixing); model problems are errors.
pub fn log_fit_failure(dataset: &str, err: &FitError) {
    let failure_type = classify_fit_failure(err);
    let message = format!("fit failed [{}]: {}", failure_type, err);

    match failure_type {
        FailureType::Data => warn(Stage::Fit, Some(dataset), &message),
        FailureType::Model | FailureType::Environment => {
            error(Stage::Fit, Some(dataset), &message)
        }
    }
}

/// Log an observation-table load failure with classification.
pub fn log_load_failure(path: &str, err: &LoadError) {
    let failure_type = classify_load_failure(err);
    let message = format!("load failed [{}]: {}", failure_type, err);

    match failure_type {
        FailureType::Data => warn(Stage::Ingest, Some(path), &message),
        FailureType::Model | FailureType::Environment => {
            error(Stage::Ingest, Some(path), &message)
        }
    }
}

// ---------------------------------------------------------------------------
// Summary Logging
// ---------------------------------------------------------------------------

/// Log the goodness-of-fit line for a completed fit.
pub fn log_fit_summary(dataset: &str, n_observations: usize, r_squared: f64) {
    info(
        Stage::Fit,
        Some(dataset),
        &format!(
            "The r-squared value of the linear regression model is: {}",
            r_squared
        ),
    );
    debug(
        Stage::Fit,
        Some(dataset),
        &format!("fitted on {} observations", n_observations),
    );
}

/// Log a summary of a multi-dataset run
pub fn log_batch_summary(stage: Stage, total: usize, successful: usize, failed: usize) {
    let message = format!(
        "Batch complete: {}/{} successful, {} failed",
        successful, total, failed
    );

    if failed == 0 {
        info(stage, None, &message);
    } else if successful == 0 {
        error(stage, None, &message);
    } else {
        warn(stage, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("debug".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_failure_classification() {
        let constant = FitError::InvalidInput("target is constant".to_string());
        assert_eq!(classify_fit_failure(&constant), FailureType::Data);

        let collinear = FitError::SingularSystem("pivot 1e-17".to_string());
        assert_eq!(classify_fit_failure(&collinear), FailureType::Model);

        let missing = LoadError::Io {
            path: "data/crop_data.csv".to_string(),
            message: "No such file or directory".to_string(),
        };
        assert_eq!(classify_load_failure(&missing), FailureType::Environment);
        assert_eq!(
            classify_load_failure(&LoadError::NoObservations),
            FailureType::Data
        );
    }

    #[test]
    fn test_entry_format_includes_stage_and_subject() {
        let entry = format_entry(
            "2024-05-01 13:00:00 UTC",
            LogLevel::Warning,
            &Stage::Fit,
            Some("crop_data.csv"),
            "fit failed",
        );
        assert_eq!(
            entry,
            "2024-05-01 13:00:00 UTC WARN FIT [crop_data.csv]: fit failed"
        );

        let entry = format_entry("t", LogLevel::Info, &Stage::System, None, "started");
        assert_eq!(entry, "t INFO SYS: started");
    }
}
