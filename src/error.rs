//! Error types for the prediction engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid asset {asset_id}: {reason}")]
    Validation { asset_id: u32, reason: String },

    #[error("Snapshot contains no assets to evaluate")]
    EmptySnapshot,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn validation(asset_id: u32, reason: impl Into<String>) -> Self {
        Error::Validation {
            asset_id,
            reason: reason.into(),
        }
    }

    /// Whether this error only invalidates a single asset rather than the cycle
    pub fn is_per_asset(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
