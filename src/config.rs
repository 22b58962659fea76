use std::{env, net::AddrParseError, net::SocketAddr, str::FromStr, time::Duration};

use crate::provider::DEFAULT_REQUESTS_PER_MINUTE;

pub const DEFAULT_ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co";

#[derive(Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub request_timeout: Duration,
    pub alpha_vantage_api_key: Option<String>,
    pub alpha_vantage_base_url: String,
    pub alpha_vantage_requests_per_minute: u32,
    pub provider_timeout: Duration,
    /// Budget for one market data operation, retries included. Always below
    /// `request_timeout`.
    pub provider_deadline: Duration,
    pub quote_cache_ttl: Duration,
    pub indicator_cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, AddrParseError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Unset or unparseable
    /// numeric values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AddrParseError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = lookup("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".into())
            .parse()?;

        let request_timeout = Duration::from_millis(parse_or(&lookup, "REQUEST_TIMEOUT_MS", 30_000));
        let mut provider_deadline =
            Duration::from_millis(parse_or(&lookup, "PROVIDER_DEADLINE_MS", 25_000));
        if provider_deadline >= request_timeout {
            provider_deadline = request_timeout * 4 / 5;
        }

        Ok(Self {
            listen_addr,
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://stocks.db?mode=rwc".into()),
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10),
            request_timeout,
            alpha_vantage_api_key: lookup("ALPHA_VANTAGE_API_KEY").filter(|k| !k.trim().is_empty()),
            alpha_vantage_base_url: lookup("ALPHA_VANTAGE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_ALPHA_VANTAGE_URL.into()),
            alpha_vantage_requests_per_minute: parse_or(
                &lookup,
                "ALPHA_VANTAGE_REQUESTS_PER_MINUTE",
                DEFAULT_REQUESTS_PER_MINUTE,
            ),
            provider_timeout: Duration::from_secs(parse_or(&lookup, "PROVIDER_TIMEOUT_SECS", 10)),
            provider_deadline,
            quote_cache_ttl: Duration::from_secs(parse_or(&lookup, "QUOTE_CACHE_TTL_SECS", 60)),
            indicator_cache_ttl: Duration::from_secs(parse_or(&lookup, "INDICATOR_CACHE_TTL_SECS", 600)),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
