use thiserror::Error;

/// Main error type for the order orchestrator
#[derive(Error, Debug)]
pub enum HypercopyError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Unknown trader: {0}")]
    UnknownTrader(String),

    #[error("Missing credential for trader {trader}: {field}")]
    CredentialMissing { trader: String, field: String },

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Venue returned HTTP {status}: {body}")]
    Venue { status: u16, body: String },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Msgpack encoding error: {0}")]
    Msgpack(#[from] rmp_serde::encode::Error),

    // Market data errors
    #[error("Symbol unavailable on venue: {0}")]
    SymbolUnavailable(String),

    // Intent and order errors
    #[error("Invalid intent: {0}")]
    InvalidIntent(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Cancel rejected: {0}")]
    CancelRejected(String),

    /// Per-order cancel status saying the order is already canceled, filled or unknown
    #[error("Order already gone: {0}")]
    OrderGone(String),

    // Crypto/signing errors
    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Signature error: {0}")]
    Signature(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HypercopyError {
    /// Errors that abort a single intent before any venue mutation is attempted.
    pub fn is_intent_fatal(&self) -> bool {
        matches!(
            self,
            HypercopyError::UnknownTrader(_)
                | HypercopyError::CredentialMissing { .. }
                | HypercopyError::SymbolUnavailable(_)
                | HypercopyError::InvalidIntent(_)
        )
    }
}

/// Result type alias for HypercopyError
pub type Result<T> = std::result::Result<T, HypercopyError>;
