//! Alpha Vantage client.
//!
//! Quotes come from the `GLOBAL_QUOTE` function and history from
//! `TIME_SERIES_DAILY`. The free tier allows only a handful of calls per
//! minute, so rate-limit answers are treated as transient and retried.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{retry_with_backoff, MarketDataError, MarketDataProvider, RateLimiter, RetryPolicy};
use crate::models::{DailyBar, StockQuote};

const PROVIDER_ID: &str = "ALPHA_VANTAGE";

/// Ranges longer than this need `outputsize=full`; `compact` only returns
/// the latest 100 data points.
const COMPACT_RANGE_DAYS: i64 = 100;

/// Free-tier allowance.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 5;

pub struct AlphaVantageProvider {
    client: Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
    limiter: Option<RateLimiter>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "06. volume")]
    volume: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
    #[serde(rename = "08. previous close")]
    previous_close: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, DailyEntry>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailyEntry {
    #[serde(rename = "1. open")]
    open: Option<String>,
    #[serde(rename = "2. high")]
    high: Option<String>,
    #[serde(rename = "3. low")]
    low: Option<String>,
    #[serde(rename = "4. close")]
    close: Option<String>,
    #[serde(rename = "5. volume")]
    volume: Option<String>,
}

impl AlphaVantageProvider {
    pub fn new(
        api_key: String,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            retry: RetryPolicy::default(),
            limiter: Some(RateLimiter::per_minute(DEFAULT_REQUESTS_PER_MINUTE)),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Outbound calls allowed per minute. Zero turns the limiter off.
    pub fn with_rate_limit(mut self, requests_per_minute: u32) -> Self {
        self.limiter = (requests_per_minute > 0).then(|| RateLimiter::per_minute(requests_per_minute));
        self
    }

    /// One GET against `/query`, counted against the rate limit. The API key
    /// is masked in logs.
    async fn fetch(&self, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        if let Some(limiter) = &self.limiter {
            limiter.try_acquire().map_err(|retry_after| {
                warn!(?retry_after, "alpha vantage request budget exhausted");
                MarketDataError::Throttled {
                    provider: PROVIDER_ID.to_string(),
                    retry_after,
                }
            })?;
        }

        let mut all_params = params.to_vec();
        all_params.push(("apikey", self.api_key.as_str()));

        let url = reqwest::Url::parse_with_params(&format!("{}/query", self.base_url), &all_params)
            .map_err(|e| provider_error(format!("Failed to build URL: {e}"), false))?;

        debug!(url = %url.as_str().replace(&self.api_key, "***"), "alpha vantage request");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                MarketDataError::Timeout {
                    provider: PROVIDER_ID.to_string(),
                }
            } else {
                provider_error(e.to_string(), e.is_connect())
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        if !status.is_success() {
            return Err(provider_error(
                format!("HTTP {status}"),
                status.is_server_error(),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| provider_error(e.to_string(), false))
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn latest_quote(&self, symbol: &str) -> Result<StockQuote, MarketDataError> {
        let this = self;
        retry_with_backoff(&self.retry, move || async move {
            let body = this
                .fetch(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
                .await?;
            parse_global_quote(&body, symbol)
        })
        .await
    }

    async fn daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, MarketDataError> {
        let output_size = if (end - start).num_days() > COMPACT_RANGE_DAYS {
            "full"
        } else {
            "compact"
        };

        let this = self;
        retry_with_backoff(&self.retry, move || async move {
            let body = this
                .fetch(&[
                    ("function", "TIME_SERIES_DAILY"),
                    ("symbol", symbol),
                    ("outputsize", output_size),
                ])
                .await?;
            parse_daily_series(&body, symbol, start, end)
        })
        .await
    }
}

fn provider_error(message: String, transient: bool) -> MarketDataError {
    MarketDataError::Provider {
        provider: PROVIDER_ID.to_string(),
        message,
        transient,
    }
}

fn parse_error(message: impl Into<String>) -> MarketDataError {
    MarketDataError::Parse {
        provider: PROVIDER_ID.to_string(),
        message: message.into(),
    }
}

/// Alpha Vantage reports most failures with HTTP 200 and a message field.
fn check_api_error(
    symbol: &str,
    error_message: &Option<String>,
    note: &Option<String>,
    information: &Option<String>,
) -> Result<(), MarketDataError> {
    if let Some(msg) = error_message {
        if msg.contains("Invalid API call") || msg.contains("not found") {
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }
        return Err(provider_error(msg.clone(), false));
    }

    for msg in [note, information].into_iter().flatten() {
        if msg.contains("API call frequency") || msg.contains("rate limit") {
            return Err(MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            });
        }
        warn!(notice = %msg, "alpha vantage notice");
    }

    Ok(())
}

fn parse_f64(value: &Option<String>) -> Option<f64> {
    value
        .as_deref()
        .map(|s| s.trim().trim_end_matches('%'))
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
}

fn parse_i64(value: &Option<String>) -> i64 {
    value
        .as_deref()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}

fn parse_global_quote(body: &str, symbol: &str) -> Result<StockQuote, MarketDataError> {
    let parsed: GlobalQuoteResponse =
        serde_json::from_str(body).map_err(|e| parse_error(e.to_string()))?;
    check_api_error(symbol, &parsed.error_message, &parsed.note, &parsed.information)?;

    // Unknown symbols come back as an empty "Global Quote" object.
    let quote = parsed
        .global_quote
        .filter(|q| q.price.as_deref().is_some_and(|p| !p.trim().is_empty()))
        .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

    let price = parse_f64(&quote.price)
        .ok_or_else(|| parse_error(format!("unparseable price for {symbol}")))?;

    let last_updated = quote
        .latest_trading_day
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_else(Utc::now);

    Ok(StockQuote {
        symbol: quote.symbol.unwrap_or_else(|| symbol.to_string()),
        price,
        change: parse_f64(&quote.change).unwrap_or_default(),
        change_percent: parse_f64(&quote.change_percent).unwrap_or_default(),
        volume: parse_i64(&quote.volume),
        market_cap: 0.0,
        previous_close: parse_f64(&quote.previous_close).unwrap_or_default(),
        last_updated,
    })
}

fn parse_daily_series(
    body: &str,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<DailyBar>, MarketDataError> {
    let parsed: TimeSeriesResponse =
        serde_json::from_str(body).map_err(|e| parse_error(e.to_string()))?;
    check_api_error(symbol, &parsed.error_message, &parsed.note, &parsed.information)?;

    let series = parsed
        .time_series
        .ok_or_else(|| parse_error("missing \"Time Series (Daily)\""))?;

    let mut bars: Vec<DailyBar> = series
        .into_iter()
        .filter_map(|(day, entry)| {
            let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d").ok()?;
            if date < start || date > end {
                return None;
            }
            Some(DailyBar {
                date,
                open: parse_f64(&entry.open)?,
                high: parse_f64(&entry.high)?,
                low: parse_f64(&entry.low)?,
                close: parse_f64(&entry.close)?,
                volume: parse_i64(&entry.volume),
            })
        })
        .collect();

    bars.sort_by_key(|bar| bar.date);
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const GLOBAL_QUOTE: &str = r#"{
        "Global Quote": {
            "01. symbol": "IBM",
            "02. open": "167.0000",
            "03. high": "168.5000",
            "04. low": "166.2000",
            "05. price": "167.9400",
            "06. volume": "3219340",
            "07. latest trading day": "2024-05-03",
            "08. previous close": "165.7100",
            "09. change": "2.2300",
            "10. change percent": "1.3457%"
        }
    }"#;

    const DAILY_SERIES: &str = r#"{
        "Meta Data": { "2. Symbol": "IBM" },
        "Time Series (Daily)": {
            "2024-05-03": { "1. open": "167.0", "2. high": "168.5", "3. low": "166.2", "4. close": "167.9", "5. volume": "3219340" },
            "2024-05-01": { "1. open": "165.0", "2. high": "166.0", "3. low": "164.0", "4. close": "165.5", "5. volume": "100" },
            "2024-05-02": { "1. open": "n/a", "2. high": "166.0", "3. low": "164.0", "4. close": "165.7", "5. volume": "200" },
            "2024-04-01": { "1. open": "160.0", "2. high": "161.0", "3. low": "159.0", "4. close": "160.5", "5. volume": "300" }
        }
    }"#;

    #[test]
    fn parses_global_quote() {
        let quote = parse_global_quote(GLOBAL_QUOTE, "IBM").unwrap();
        assert_eq!(quote.symbol, "IBM");
        assert_eq!(quote.price, 167.94);
        assert_eq!(quote.change, 2.23);
        assert_eq!(quote.change_percent, 1.3457);
        assert_eq!(quote.volume, 3_219_340);
        assert_eq!(quote.previous_close, 165.71);
        assert_eq!(quote.last_updated.date_naive(), date(2024, 5, 3));
    }

    #[test]
    fn empty_global_quote_means_unknown_symbol() {
        let err = parse_global_quote(r#"{ "Global Quote": {} }"#, "NOPE").unwrap_err();
        assert!(matches!(err, MarketDataError::SymbolNotFound(s) if s == "NOPE"));
    }

    #[test]
    fn api_messages_are_classified() {
        let invalid = r#"{ "Error Message": "Invalid API call. Please retry or visit the documentation." }"#;
        assert!(matches!(
            parse_global_quote(invalid, "NOPE"),
            Err(MarketDataError::SymbolNotFound(_))
        ));

        let throttled = r#"{ "Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute." }"#;
        let err = parse_daily_series(throttled, "IBM", date(2024, 1, 1), date(2024, 2, 1)).unwrap_err();
        assert!(matches!(err, MarketDataError::RateLimited { .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn daily_series_is_filtered_sorted_and_skips_bad_rows() {
        let bars = parse_daily_series(DAILY_SERIES, "IBM", date(2024, 5, 1), date(2024, 5, 3)).unwrap();
        let dates: Vec<_> = bars.iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![date(2024, 5, 1), date(2024, 5, 3)]);
        assert_eq!(bars[1].close, 167.9);
        assert_eq!(bars[1].volume, 3_219_340);
    }

    #[test]
    fn garbage_body_is_a_parse_error() {
        assert!(matches!(
            parse_global_quote("<html>", "IBM"),
            Err(MarketDataError::Parse { .. })
        ));
    }
}
