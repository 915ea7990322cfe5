//! Error types for Marga

use thiserror::Error;

/// Marga error type
#[derive(Error, Debug)]
pub enum MargaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u8, found: u8 },

    #[error("Insufficient data: {available} usable samples, {required} required")]
    InsufficientData { available: usize, required: usize },

    #[error("Fingerprint index not built")]
    IndexNotBuilt,

    #[error("Fingerprint index already built")]
    IndexAlreadyBuilt,

    #[error("Unknown destination: {0}")]
    UnknownDestination(String),

    #[error("Thread error: {0}")]
    Thread(String),
}

impl From<toml::de::Error> for MargaError {
    fn from(e: toml::de::Error) -> Self {
        MargaError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for MargaError {
    fn from(e: serde_json::Error) -> Self {
        MargaError::Json(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MargaError>;
