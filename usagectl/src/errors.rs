use crate::pricing::RateTableKind;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// The backend answered, but reported a failure (or an unusable payload)
    #[error("Backend request failed: {message}")]
    Backend { message: String },

    /// A rate table could not be parsed or contains values that cannot be priced with
    #[error("Invalid {table} table: {reason}")]
    InvalidRateTable { table: RateTableKind, reason: String },

    /// A rate configuration document is not an object of known tables
    #[error("Invalid rate configuration: {reason}")]
    InvalidRateConfig { reason: String },

    /// A price exceeded the decimal range
    #[error("Price computation overflowed for model {model}")]
    PriceOverflow { model: String },

    /// Configuration failed validation after loading
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// Transport-level HTTP error
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization error outside of rate-table parsing
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Returns a message suitable for showing to an operator, without internal details
    pub fn user_message(&self) -> String {
        match self {
            Error::Backend { message } if message.is_empty() => "The backend reported a failure without a message".to_string(),
            Error::Backend { message } => message.clone(),
            Error::InvalidRateTable { table, reason } => format!("The {table} table is not valid JSON rate data: {reason}"),
            Error::InvalidRateConfig { reason } => format!("The rate configuration is not valid: {reason}"),
            Error::PriceOverflow { model } => format!("The price for {model} is too large to compute"),
            Error::Config { message } => message.clone(),
            Error::Http(e) if e.is_timeout() => "The backend did not respond in time".to_string(),
            Error::Http(_) => "Could not reach the backend".to_string(),
            Error::Json(_) => "Received malformed JSON".to_string(),
            Error::Other(_) => "Internal error".to_string(),
        }
    }

    pub(crate) fn backend(message: impl Into<String>) -> Self {
        Error::Backend { message: message.into() }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
