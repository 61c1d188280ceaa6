//! agridash
//!
//! Command-line entry point: fit crop water demand from an observation
//! table, verify a table before use, or write the dashboard handoff JSON.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use agridash_service::analysis;
use agridash_service::config::{ConfigError, DashboardConfig};
use agridash_service::ingest::{self, LoadError};
use agridash_service::logging::{self, LogLevel, Stage};
use agridash_service::model::{FitError, FitResult, Observation, SolveMode};
use agridash_service::report::{self, ReportError};
use agridash_service::verify::{self, VerificationStatus};

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Fit(#[from] FitError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("Failed to serialise output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Failed(String),
}

#[derive(Parser)]
#[command(name = "agridash")]
#[command(about = "Crop water demand regression for the agriculture dashboard", long_about = None)]
struct Cli {
    /// Minimum log level (debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: LogLevel,

    /// Also append log lines to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Prefix console log lines with a timestamp
    #[arg(long, global = true)]
    timestamps: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit one or more observation tables and log R² and coefficients
    Fit {
        /// Observation table (CSV); repeat for several fields
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        /// Use the minimum-norm pseudo-inverse solve instead of the exact one
        #[arg(long)]
        pseudo_inverse: bool,
    },

    /// Fit and write the dashboard handoff JSON
    Report {
        /// Dashboard configuration (TOML); falls back to $AGRIDASH_CONFIG, then defaults
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Observation table (CSV); defaults to the config's data_path
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Use the minimum-norm pseudo-inverse solve instead of the exact one
        #[arg(long)]
        pseudo_inverse: bool,
    },

    /// Check an observation table is fit-ready
    Verify {
        /// Observation table (CSV)
        #[arg(short, long)]
        input: PathBuf,

        /// Print the verification as JSON
        #[arg(long)]
        json: bool,
    },
}

fn solve_mode(pseudo_inverse: bool) -> SolveMode {
    if pseudo_inverse {
        SolveMode::PseudoInverse
    } else {
        SolveMode::Exact
    }
}

fn load(path: &Path) -> Result<Vec<Observation>, LoadError> {
    ingest::load_observations(path)
        .inspect_err(|e| logging::log_load_failure(&path.display().to_string(), e))
}

fn fit_logged(
    dataset: &str,
    observations: &[Observation],
    mode: SolveMode,
) -> Result<FitResult, FitError> {
    let fit = analysis::fit_with(observations, mode)
        .inspect_err(|e| logging::log_fit_failure(dataset, e))?;

    logging::log_fit_summary(dataset, fit.n_observations(), fit.r_squared());
    for (label, value) in fit.labelled_coefficients() {
        logging::info(Stage::Fit, Some(dataset), &format!("{:<14} {:>14.6}", label, value));
    }
    Ok(fit)
}

fn run_fit(inputs: &[PathBuf], mode: SolveMode) -> Result<(), AppError> {
    let mut failed = 0;
    for path in inputs {
        let dataset = path.display().to_string();
        let outcome = load(path)
            .map_err(AppError::from)
            .and_then(|obs| fit_logged(&dataset, &obs, mode).map_err(AppError::from));
        if outcome.is_err() {
            failed += 1;
        }
    }

    if inputs.len() > 1 {
        logging::log_batch_summary(Stage::Fit, inputs.len(), inputs.len() - failed, failed);
    }
    if failed > 0 {
        return Err(AppError::Failed(format!(
            "{} of {} fits failed",
            failed,
            inputs.len()
        )));
    }
    Ok(())
}

fn run_report(
    config_path: Option<&Path>,
    input: Option<&Path>,
    output: Option<&Path>,
    mode: SolveMode,
) -> Result<(), AppError> {
    let config = DashboardConfig::resolve(config_path)?;
    let input = input.unwrap_or(config.data_path.as_path());

    let observations = load(input)?;
    let fit = fit_logged(&input.display().to_string(), &observations, mode)?;
    let dashboard = report::build_report(&config, &fit)?;

    match output {
        Some(path) => report::write_report(&dashboard, path)?,
        None => println!("{}", report::to_json(&dashboard)?),
    }
    Ok(())
}

fn run_verify(input: &Path, json: bool) -> Result<(), AppError> {
    let observations = load(input)?;
    let verification = verify::verify_dataset(&input.display().to_string(), &observations);

    if json {
        println!("{}", serde_json::to_string_pretty(&verification)?);
    } else {
        verify::print_summary(&verification);
    }

    if verification.status == VerificationStatus::Failed {
        return Err(AppError::Failed(format!(
            "{} is not fit-ready",
            input.display()
        )));
    }
    Ok(())
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let log_file = cli.log_file.as_ref().map(|p| p.display().to_string());
    logging::init_logger(cli.log_level, log_file.as_deref(), cli.timestamps);

    let result = match &cli.command {
        Commands::Fit {
            input,
            pseudo_inverse,
        } => run_fit(input, solve_mode(*pseudo_inverse)),
        Commands::Report {
            config,
            input,
            output,
            pseudo_inverse,
        } => run_report(
            config.as_deref(),
            input.as_deref(),
            output.as_deref(),
            solve_mode(*pseudo_inverse),
        ),
        Commands::Verify { input, json } => run_verify(input, *json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::error(Stage::System, None, &e.to_string());
            ExitCode::FAILURE
        }
    }
}
