//! Market data providers.
//!
//! A provider answers two questions for a ticker symbol: what is the latest
//! quote, and what did the daily bars look like over a date range. The
//! service layer only sees the [`MarketDataProvider`] trait.

mod alpha_vantage;
mod error;
mod placeholder;
mod rate_limiter;
mod retry;

pub use alpha_vantage::{AlphaVantageProvider, DEFAULT_REQUESTS_PER_MINUTE};
pub use error::MarketDataError;
pub use placeholder::PlaceholderProvider;
pub use rate_limiter::RateLimiter;
pub use retry::{retry_with_backoff, RetryPolicy};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{DailyBar, StockQuote};

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Stable identifier used in logs and error messages.
    fn id(&self) -> &'static str;

    /// Latest quote for `symbol`. `market_cap` may be zero when the provider
    /// does not report it.
    async fn latest_quote(&self, symbol: &str) -> Result<StockQuote, MarketDataError>;

    /// Daily bars with `start <= date <= end`, ordered by date ascending.
    async fn daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, MarketDataError>;
}
