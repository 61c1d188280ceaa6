//! Dashboard configuration.
//!
//! Everything the presentation layer needs besides the fit itself: page
//! title, where the observation table and logo live, the resource-allocation
//! flow diagram, and the field location marker. Read from a TOML file;
//! every section is optional and falls back to the defaults below.
//!
//! ```toml
//! title = "Test dashboard for Agriculture"
//! data_path = "data/crop_data.csv"
//! image_path = "data/RSI.png"
//!
//! [flow]
//! title = "Resource Allocations"
//! nodes = [{ label = "A1", color = "blue" }, { label = "B1", color = "blue" }]
//! links = [{ source = 0, target = 1, value = 8.0 }]
//!
//! [map]
//! title = "Alfalfa Field Location"
//! zoom = 5.0
//! marker = { label = "Alfalfa Fields", latitude = 24.998425, longitude = 51.189871 }
//! ```
//!
//! The map access token is a credential and is never read from the file:
//! it comes from `MAPBOX_ACCESS_TOKEN` (a `.env` file is honoured by the
//! binary).

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::{self, Stage};

/// Environment variable naming the config file when none is passed.
pub const CONFIG_ENV_VAR: &str = "AGRIDASH_CONFIG";

/// Environment variable holding the map tile access token.
pub const MAP_TOKEN_ENV_VAR: &str = "MAPBOX_ACCESS_TOKEN";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid marker coordinate: {0}")]
    InvalidCoordinate(String),
}

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub title: String,
    /// Observation table used when no input is given on the command line.
    pub data_path: PathBuf,
    /// Logo shown above the panels.
    pub image_path: Option<PathBuf>,
    pub flow: FlowConfig,
    pub map: MapConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub title: String,
    pub nodes: Vec<FlowNode>,
    pub links: Vec<FlowLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub label: String,
    #[serde(default = "default_node_color")]
    pub color: String,
}

/// A directed allocation between two nodes, by index into `FlowConfig::nodes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowLink {
    pub source: usize,
    pub target: usize,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub title: String,
    pub zoom: f64,
    pub marker: MapMarker,
    #[serde(skip)]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMarker {
    pub label: String,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
}

fn default_node_color() -> String {
    "blue".to_string()
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            title: "Test dashboard for Agriculture".to_string(),
            data_path: PathBuf::from("data/crop_data.csv"),
            image_path: Some(PathBuf::from("data/RSI.png")),
            flow: FlowConfig::default(),
            map: MapConfig::default(),
        }
    }
}

impl Default for FlowConfig {
    fn default() -> Self {
        let nodes = ["A1", "A2", "B1", "B2", "C1", "C2"]
            .into_iter()
            .map(|label| FlowNode {
                label: label.to_string(),
                color: default_node_color(),
            })
            .collect();
        let links = [(0, 2, 8.0), (1, 3, 4.0), (0, 3, 2.0), (2, 4, 8.0), (3, 4, 4.0), (3, 5, 2.0)]
            .into_iter()
            .map(|(source, target, value)| FlowLink {
                source,
                target,
                value,
            })
            .collect();
        Self {
            title: "Resource Allocations".to_string(),
            nodes,
            links,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            title: "Alfalfa Field Location".to_string(),
            zoom: 5.0,
            marker: MapMarker {
                label: "Alfalfa Fields".to_string(),
                latitude: 24.998425,
                longitude: 51.189871,
            },
            access_token: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl DashboardConfig {
    /// Parses and validates a TOML document. The access token is left unset.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: DashboardConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML config file and fills the access token from the
    /// environment. A relative `data_path` is taken relative to the directory
    /// holding the config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let mut config = Self::parse(&text)?.with_env_token();
        config.data_path = relative_to_config(path, &config.data_path);
        logging::info(
            Stage::Config,
            Some(&path.display().to_string()),
            "Loaded dashboard configuration",
        );
        Ok(config)
    }

    /// Resolves the configuration: an explicit path wins, then the
    /// `AGRIDASH_CONFIG` variable, then the built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::load(Path::new(path.trim())),
            _ => {
                logging::debug(Stage::Config, None, "No config file given; using defaults");
                Ok(Self::default().with_env_token())
            }
        }
    }

    /// Sets the map access token from `MAPBOX_ACCESS_TOKEN`, if present.
    pub fn with_env_token(mut self) -> Self {
        self.map.access_token = env::var(MAP_TOKEN_ENV_VAR)
            .ok()
            .filter(|token| !token.trim().is_empty());
        self
    }

    /// Checks the marker lies on the globe.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let marker = &self.map.marker;
        if !(-90.0..=90.0).contains(&marker.latitude) {
            return Err(ConfigError::InvalidCoordinate(format!(
                "latitude {} for '{}' is outside [-90, 90]",
                marker.latitude, marker.label
            )));
        }
        if !(-180.0..=180.0).contains(&marker.longitude) {
            return Err(ConfigError::InvalidCoordinate(format!(
                "longitude {} for '{}' is outside [-180, 180]",
                marker.longitude, marker.label
            )));
        }
        Ok(())
    }
}

fn relative_to_config(config_path: &Path, data_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(dir) if data_path.is_relative() && !dir.as_os_str().is_empty() => dir.join(data_path),
        _ => data_path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
