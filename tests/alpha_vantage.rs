use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::NaiveDate;
use stock_api::provider::{AlphaVantageProvider, MarketDataError, MarketDataProvider, RetryPolicy};

/// Fake Alpha Vantage endpoint. The first `failures` calls answer with
/// `failure_status`; later calls answer with canned payloads.
#[derive(Clone)]
struct Upstream {
    hits: Arc<AtomicUsize>,
    failures: usize,
    failure_status: StatusCode,
    last_params: Arc<std::sync::Mutex<HashMap<String, String>>>,
}

async fn query(State(upstream): State<Upstream>, Query(params): Query<HashMap<String, String>>) -> Response {
    let hit = upstream.hits.fetch_add(1, Ordering::SeqCst);
    *upstream.last_params.lock().unwrap() = params.clone();
    if hit < upstream.failures {
        return upstream.failure_status.into_response();
    }

    let body = match params.get("function").map(String::as_str) {
        Some("GLOBAL_QUOTE") if params.get("symbol").map(String::as_str) == Some("IBM") => {
            r#"{ "Global Quote": {
                "01. symbol": "IBM", "05. price": "167.94", "06. volume": "3219340",
                "07. latest trading day": "2024-05-03", "08. previous close": "165.71",
                "09. change": "2.23", "10. change percent": "1.3457%" } }"#
        }
        Some("GLOBAL_QUOTE") => r#"{ "Global Quote": {} }"#,
        Some("TIME_SERIES_DAILY") => {
            r#"{ "Time Series (Daily)": {
                "2024-05-02": { "1. open": "165", "2. high": "166", "3. low": "164", "4. close": "165.7", "5. volume": "200" },
                "2024-05-01": { "1. open": "164", "2. high": "165", "3. low": "163", "4. close": "164.5", "5. volume": "100" },
                "2023-01-01": { "1. open": "120", "2. high": "121", "3. low": "119", "4. close": "120.5", "5. volume": "50" } } }"#
        }
        _ => r#"{ "Error Message": "Invalid API call." }"#,
    };
    ([("content-type", "application/json")], body).into_response()
}

async fn spawn_upstream(failures: usize, failure_status: StatusCode) -> (String, Upstream) {
    let upstream = Upstream {
        hits: Arc::new(AtomicUsize::new(0)),
        failures,
        failure_status,
        last_params: Arc::default(),
    };
    let app = Router::new()
        .route("/query", get(query))
        .with_state(upstream.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), upstream)
}

fn provider(base_url: &str) -> AlphaVantageProvider {
    AlphaVantageProvider::new("test-key".into(), base_url, Duration::from_secs(5))
        .unwrap()
        .with_retry_policy(RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
        })
        .with_rate_limit(0)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn fetches_quote_and_sends_api_key() {
    let (base_url, upstream) = spawn_upstream(0, StatusCode::OK).await;

    let quote = provider(&base_url).latest_quote("IBM").await.unwrap();
    assert_eq!(quote.symbol, "IBM");
    assert_eq!(quote.price, 167.94);
    assert_eq!(quote.volume, 3_219_340);

    let params = upstream.last_params.lock().unwrap().clone();
    assert_eq!(params.get("apikey").map(String::as_str), Some("test-key"));
    assert_eq!(params.get("function").map(String::as_str), Some("GLOBAL_QUOTE"));
}

#[tokio::test]
async fn unknown_symbol_is_not_retried() {
    let (base_url, upstream) = spawn_upstream(0, StatusCode::OK).await;

    let err = provider(&base_url).latest_quote("NOPE").await.unwrap_err();
    assert!(matches!(err, MarketDataError::SymbolNotFound(_)));
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn server_errors_are_retried() {
    let (base_url, upstream) = spawn_upstream(2, StatusCode::SERVICE_UNAVAILABLE).await;

    let quote = provider(&base_url).latest_quote("IBM").await.unwrap();
    assert_eq!(quote.price, 167.94);
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn rate_limiting_exhausts_retries() {
    let (base_url, upstream) = spawn_upstream(usize::MAX, StatusCode::TOO_MANY_REQUESTS).await;

    let err = provider(&base_url).latest_quote("IBM").await.unwrap_err();
    assert!(matches!(err, MarketDataError::RateLimited { .. }));
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (base_url, upstream) = spawn_upstream(usize::MAX, StatusCode::FORBIDDEN).await;

    let err = provider(&base_url).latest_quote("IBM").await.unwrap_err();
    assert!(!err.is_transient());
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn daily_history_is_windowed_and_sized() {
    let (base_url, upstream) = spawn_upstream(0, StatusCode::OK).await;
    let provider = provider(&base_url);

    let bars = provider
        .daily_history("IBM", date(2024, 4, 1), date(2024, 5, 31))
        .await
        .unwrap();
    let dates: Vec<_> = bars.iter().map(|b| b.date).collect();
    assert_eq!(dates, vec![date(2024, 5, 1), date(2024, 5, 2)]);
    assert_eq!(
        upstream.last_params.lock().unwrap().get("outputsize").map(String::as_str),
        Some("compact")
    );

    provider
        .daily_history("IBM", date(2020, 1, 1), date(2024, 5, 31))
        .await
        .unwrap();
    assert_eq!(
        upstream.last_params.lock().unwrap().get("outputsize").map(String::as_str),
        Some("full")
    );
}

#[tokio::test]
async fn calls_over_the_minute_budget_never_reach_upstream() {
    let (base_url, upstream) = spawn_upstream(0, StatusCode::OK).await;
    let provider = provider(&base_url).with_rate_limit(2);

    provider.latest_quote("IBM").await.unwrap();
    provider.latest_quote("IBM").await.unwrap();
    let err = provider.latest_quote("IBM").await.unwrap_err();

    assert!(matches!(err, MarketDataError::Throttled { .. }));
    assert!(!err.is_transient());
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn retries_spend_rate_limit_permits() {
    let (base_url, upstream) = spawn_upstream(usize::MAX, StatusCode::SERVICE_UNAVAILABLE).await;
    let provider = provider(&base_url).with_rate_limit(2);

    let err = provider.latest_quote("IBM").await.unwrap_err();
    assert!(matches!(err, MarketDataError::Throttled { .. }));
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 2);
}
