use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use tracing::{debug, info, warn};

use super::{indicators, HistoryPeriod, TtlCache};
use crate::{
    error::{Error, Result},
    models::{DailyBar, NewStock, Stock, StockPrice, StockQuote, TechnicalIndicators},
    provider::{MarketDataError, MarketDataProvider},
    repository::StockRepository,
};

const CACHE_CAPACITY: u64 = 1_000;
const DEFAULT_PROVIDER_DEADLINE: Duration = Duration::from_secs(25);
const DEFAULT_INDICATOR_CACHE_TTL: Duration = Duration::from_secs(600);

pub struct StockService {
    repo: StockRepository,
    provider: Arc<dyn MarketDataProvider>,
    provider_deadline: Duration,
    quotes: TtlCache<StockQuote>,
    indicators: TtlCache<TechnicalIndicators>,
}

impl StockService {
    pub fn new(
        repo: StockRepository,
        provider: Arc<dyn MarketDataProvider>,
        quote_cache_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            provider,
            provider_deadline: DEFAULT_PROVIDER_DEADLINE,
            quotes: TtlCache::new(quote_cache_ttl, CACHE_CAPACITY),
            indicators: TtlCache::new(DEFAULT_INDICATOR_CACHE_TTL, CACHE_CAPACITY),
        }
    }

    /// Upper bound on one provider operation, retries included.
    pub fn with_provider_deadline(mut self, deadline: Duration) -> Self {
        self.provider_deadline = deadline;
        self
    }

    pub fn with_indicator_cache_ttl(mut self, ttl: Duration) -> Self {
        self.indicators = TtlCache::new(ttl, CACHE_CAPACITY);
        self
    }

    pub async fn get_stocks(&self, limit: i64) -> Result<Vec<Stock>> {
        self.repo.get_all(limit).await
    }

    pub async fn get_stock_by_symbol(&self, symbol: &str) -> Result<Stock> {
        self.repo.get_by_symbol(symbol).await
    }

    /// Latest quote for `symbol`, served from cache while fresh. The stored
    /// market capitalization wins over whatever the provider reports.
    pub async fn get_stock_quote(&self, symbol: &str) -> Result<StockQuote> {
        if let Some(quote) = self.quotes.get(symbol).await {
            debug!(symbol, "quote cache hit");
            return Ok(quote);
        }

        let mut quote = self
            .within_deadline(self.provider.latest_quote(symbol))
            .await?;

        match self.repo.get_by_symbol(symbol).await {
            Ok(stock) => quote.market_cap = stock.market_cap,
            Err(Error::NotFound) => {}
            Err(err) => warn!(symbol, error = %err, "could not load stored market cap"),
        }

        self.quotes.insert(symbol, quote.clone()).await;
        Ok(quote)
    }

    /// Daily prices inside `period`, oldest first. Symbols that are not
    /// stored have no history.
    pub async fn get_stock_history(
        &self,
        symbol: &str,
        period: HistoryPeriod,
    ) -> Result<Vec<StockPrice>> {
        let end = Utc::now().date_naive();
        self.get_stock_history_between(symbol, period.start_date(end), end)
            .await
    }

    /// The provider is asked for the whole window unless an earlier fetch
    /// already covered it. If the provider fails and rows are stored, the
    /// stored rows are served.
    async fn get_stock_history_between(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<StockPrice>> {
        let stock = match self.repo.get_by_symbol(symbol).await {
            Ok(stock) => stock,
            Err(Error::NotFound) => {
                debug!(symbol, "history requested for unknown symbol");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };

        let fetched = self.repo.get_backfill_range(stock.id).await?;
        if fetched.is_some_and(|(from, to)| from <= start && to >= end) {
            return self.repo.get_prices_between(stock.id, start, end).await;
        }

        match self
            .within_deadline(self.provider.daily_history(symbol, start, end))
            .await
        {
            Ok(bars) => {
                let written = self
                    .repo
                    .store_backfill(stock.id, start, end, &bars)
                    .await?;
                info!(
                    symbol,
                    provider = self.provider.id(),
                    %start,
                    %end,
                    written,
                    "stored provider history"
                );
            }
            Err(err) => {
                let stored = self.repo.get_prices_between(stock.id, start, end).await?;
                if stored.is_empty() {
                    return Err(err);
                }
                warn!(symbol, error = %err, "provider history unavailable, serving stored prices");
                return Ok(stored);
            }
        }

        self.repo.get_prices_between(stock.id, start, end).await
    }

    /// RSI(14), 50/200-day moving averages and the 20-day range for `symbol`,
    /// as of `as_of` or the latest available bar.
    pub async fn get_technical_indicators(
        &self,
        symbol: &str,
        as_of: Option<NaiveDate>,
    ) -> Result<TechnicalIndicators> {
        let key = match as_of {
            Some(day) => format!("{symbol}:{day}"),
            None => format!("{symbol}:latest"),
        };
        if let Some(cached) = self.indicators.get(&key).await {
            debug!(symbol, "indicator cache hit");
            return Ok(cached);
        }

        let end = as_of.unwrap_or_else(|| Utc::now().date_naive());
        let start = end
            .checked_sub_days(Days::new(indicators::LOOKBACK_DAYS))
            .unwrap_or(NaiveDate::MIN);

        let mut bars: Vec<DailyBar> = self
            .within_deadline(self.provider.daily_history(symbol, start, end))
            .await?;
        bars.sort_by_key(|bar| bar.date);

        let result = indicators::compute(symbol, end, &bars);
        self.indicators.insert(key, result.clone()).await;
        Ok(result)
    }

    pub async fn create_stock(&self, stock: &NewStock) -> Result<Stock> {
        self.repo.create(stock).await
    }

    pub async fn update_stock(&self, stock: &Stock) -> Result<Stock> {
        self.repo.update(stock).await
    }

    pub async fn delete_stock(&self, id: i64) -> Result<()> {
        self.repo.delete(id).await
    }

    async fn within_deadline<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, MarketDataError>>,
    {
        match tokio::time::timeout(self.provider_deadline, call).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(
                    provider = self.provider.id(),
                    deadline = ?self.provider_deadline,
                    "market data call exceeded its deadline"
                );
                Err(MarketDataError::Timeout {
                    provider: self.provider.id().to_string(),
                }
                .into())
            }
        }
    }
}
