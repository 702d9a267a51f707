//! Error handling for the application

use thiserror::Error;

/// Exchange-related errors
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resulting amount is too low")]
    AmountTooLow,

    #[error("Provider returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Order not found: {id}")]
    NotFound { id: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl ExchangeError {
    /// Machine-readable error category, paired with the human `Display` text
    pub fn category(&self) -> &'static str {
        match self {
            ExchangeError::Config(_) => "config_error",
            ExchangeError::Validation(_) => "validation_error",
            ExchangeError::AmountTooLow => "amount_too_low",
            ExchangeError::Upstream { .. } => "upstream_error",
            ExchangeError::NotFound { .. } => "not_found",
            ExchangeError::Network(_) => "network_error",
            ExchangeError::Storage(_) => "storage_error",
        }
    }
}

/// Persistence-layer errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Record not found: {0}")]
    MissingRecord(String),

    #[error("Invalid record data: {0}")]
    InvalidRecord(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}
