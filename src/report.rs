//! Dashboard handoff payload.
//!
//! The rendering side (page layout, charts, map tiles) is not part of this
//! service. What it receives is a single JSON document assembled here from
//! the fit result and the dashboard configuration: observed and fitted crop
//! water demand against a period index, the labelled coefficients and R²,
//! the flow diagram, and the field marker.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::{DashboardConfig, FlowConfig, FlowLink, FlowNode};
use crate::logging::{self, Stage};
use crate::model::FitResult;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Invalid flow link #{index}: {reason}")]
    InvalidFlowLink { index: usize, reason: String },

    #[error("Failed to serialise report: {0}")]
    Serialize(String),

    #[error("Failed to write report {path}: {message}")]
    Io { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Payload types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardReport {
    pub title: String,
    /// RFC 3339, UTC.
    pub generated_at: String,
    pub image_path: Option<String>,
    pub regression: RegressionPanel,
    pub flow: FlowPanel,
    pub map: MapPanel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionPanel {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Period number of each observation, 0-based, in input order.
    pub period_index: Vec<usize>,
    pub observed: Vec<f64>,
    pub fitted: Vec<f64>,
    pub coefficients: Vec<Coefficient>,
    pub r_squared: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowPanel {
    pub title: String,
    pub nodes: Vec<FlowNode>,
    pub links: Vec<FlowLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapPanel {
    pub title: String,
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f64,
    /// Whether the renderer will find a tile token in its environment. The
    /// token itself is never written to the report.
    pub token_configured: bool,
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Checks every link references existing nodes and carries a positive,
/// finite amount.
pub fn validate_flow(flow: &FlowConfig) -> Result<(), ReportError> {
    let node_count = flow.nodes.len();
    for (index, link) in flow.links.iter().enumerate() {
        for (end, node) in [("source", link.source), ("target", link.target)] {
            if node >= node_count {
                return Err(ReportError::InvalidFlowLink {
                    index,
                    reason: format!("{} {} is not one of {} nodes", end, node, node_count),
                });
            }
        }
        if !(link.value.is_finite() && link.value > 0.0) {
            return Err(ReportError::InvalidFlowLink {
                index,
                reason: format!("value {} must be positive", link.value),
            });
        }
    }
    Ok(())
}

/// Builds the handoff payload for one fit.
pub fn build_report(config: &DashboardConfig, fit: &FitResult) -> Result<DashboardReport, ReportError> {
    validate_flow(&config.flow)?;

    let regression = RegressionPanel {
        title: "Crop Water Demand (CWD) variation".to_string(),
        x_label: "Time (month #)".to_string(),
        y_label: "CWD (m3/ha)".to_string(),
        period_index: (0..fit.n_observations()).collect(),
        observed: fit.observed().to_vec(),
        fitted: fit.fitted().to_vec(),
        coefficients: fit
            .labelled_coefficients()
            .into_iter()
            .map(|(label, value)| Coefficient { label, value })
            .collect(),
        r_squared: fit.r_squared(),
    };

    let marker = &config.map.marker;
    let map = MapPanel {
        title: config.map.title.clone(),
        label: marker.label.clone(),
        latitude: marker.latitude,
        longitude: marker.longitude,
        zoom: config.map.zoom,
        token_configured: config.map.access_token.is_some(),
    };

    Ok(DashboardReport {
        title: config.title.clone(),
        generated_at: Utc::now().to_rfc3339(),
        image_path: config
            .image_path
            .as_ref()
            .map(|p| p.display().to_string()),
        regression,
        flow: FlowPanel {
            title: config.flow.title.clone(),
            nodes: config.flow.nodes.clone(),
            links: config.flow.links.clone(),
        },
        map,
    })
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

pub fn to_json(report: &DashboardReport) -> Result<String, ReportError> {
    serde_json::to_string_pretty(report).map_err(|e| ReportError::Serialize(e.to_string()))
}

/// Writes the report as pretty-printed JSON.
pub fn write_report(report: &DashboardReport, path: &Path) -> Result<(), ReportError> {
    let json = to_json(report)?;
    fs::write(path, json).map_err(|e| ReportError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    logging::info(
        Stage::Report,
        Some(&path.display().to_string()),
        "Wrote dashboard report",
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
