use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use super::{MarketDataError, MarketDataProvider};
use crate::models::{DailyBar, StockQuote};

/// Stand-in used when no market data API key is configured. Every symbol
/// gets the same canned quote and an empty history.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderProvider;

#[async_trait]
impl MarketDataProvider for PlaceholderProvider {
    fn id(&self) -> &'static str {
        "PLACEHOLDER"
    }

    async fn latest_quote(&self, symbol: &str) -> Result<StockQuote, MarketDataError> {
        Ok(StockQuote {
            symbol: symbol.to_string(),
            price: 150.25,
            change: 2.50,
            change_percent: 1.69,
            volume: 1_000_000,
            market_cap: 2_500_000_000.0,
            previous_close: 147.75,
            last_updated: Utc::now(),
        })
    }

    async fn daily_history(
        &self,
        _symbol: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<DailyBar>, MarketDataError> {
        Ok(Vec::new())
    }
}
