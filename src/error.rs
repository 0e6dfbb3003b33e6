//! Error types for the toponym library.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Coordinate out of range ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("Could not parse '{0}' as DMS coordinate")]
    InvalidDms(String),

    #[error("Malformed span [{start}, {end}): {reason}")]
    MalformedSpan {
        start: usize,
        end: usize,
        reason: String,
    },

    #[error("Failed to load model from {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Strategy requires a {0}, but none was configured")]
    MissingModel(&'static str),

    #[error("Invalid configuration value for {key}: {reason}")]
    Config { key: String, reason: String },

    #[error("Gazetteer lookup timed out after {0:?}")]
    LookupTimeout(Duration),
}

pub type Result<T> = std::result::Result<T, Error>;
