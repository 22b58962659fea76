use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Rate limited: {provider}")]
    RateLimited { provider: String },

    /// Refused locally before any request was sent.
    #[error("Request budget exhausted for {provider}, next slot in {retry_after:?}")]
    Throttled {
        provider: String,
        retry_after: Duration,
    },

    #[error("Timeout: {provider}")]
    Timeout { provider: String },

    #[error("Provider error: {provider} - {message}")]
    Provider {
        provider: String,
        message: String,
        /// Set for failures worth retrying, e.g. HTTP 5xx.
        transient: bool,
    },

    #[error("Invalid response from {provider}: {message}")]
    Parse { provider: String, message: String },
}

impl MarketDataError {
    pub fn is_transient(&self) -> bool {
        match self {
            MarketDataError::RateLimited { .. } | MarketDataError::Timeout { .. } => true,
            MarketDataError::Provider { transient, .. } => *transient,
            MarketDataError::SymbolNotFound(_)
            | MarketDataError::Throttled { .. }
            | MarketDataError::Parse { .. } => false,
        }
    }
}
