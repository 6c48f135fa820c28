//! Error types for the application

use thiserror::Error;

/// Result type alias using our TradeError
pub type Result<T> = std::result::Result<T, TradeError>;

/// Who is at fault for a failed alert, used to pick the response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The alert itself cannot be acted on (bad action, unknown venue, ...)
    Client,
    /// The alert was valid but execution failed downstream
    Server,
}

/// Main error type for alert handling
#[derive(Error, Debug)]
pub enum TradeError {
    /// Action could not be resolved into a side / reduce-only / position type
    #[error("Intent error: {0}")]
    Intent(String),

    /// Exchange variant missing credentials or not registered
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Ledger bookkeeping failure (e.g. closing a side that is not open)
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Gateway rejected or failed to place the order
    #[error("Execution error: {0}")]
    Execution(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Alert payload failed validation
    #[error("Invalid alert: {0}")]
    InvalidAlert(String),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Invalid API response
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TradeError {
    /// Classify the error for the HTTP boundary
    pub fn class(&self) -> ErrorClass {
        match self {
            TradeError::Intent(_)
            | TradeError::Configuration(_)
            | TradeError::Ledger(_)
            | TradeError::InvalidAlert(_) => ErrorClass::Client,
            TradeError::Execution(_)
            | TradeError::Timeout(_)
            | TradeError::Authentication(_)
            | TradeError::InvalidResponse(_)
            | TradeError::HttpRequest(_)
            | TradeError::JsonParse(_)
            | TradeError::Internal(_) => ErrorClass::Server,
        }
    }

    /// Message without the variant prefix, for response bodies
    pub fn message(&self) -> String {
        match self {
            TradeError::Intent(msg)
            | TradeError::Configuration(msg)
            | TradeError::Ledger(msg)
            | TradeError::Execution(msg)
            | TradeError::Timeout(msg)
            | TradeError::InvalidAlert(msg)
            | TradeError::Authentication(msg)
            | TradeError::InvalidResponse(msg)
            | TradeError::Internal(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
