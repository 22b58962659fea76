use axum::{
    extract::{rejection::PathRejection, Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, error};

use super::DataResponse;
use crate::{
    error::{ApiError, Error},
    models::{Stock, StockPrice, StockQuote, TechnicalIndicators},
    services::HistoryPeriod,
    state::AppState,
};

pub const DEFAULT_LIMIT: i64 = 50;

/// Raw query strings; bad values fall back to defaults instead of rejecting
/// the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub period: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IndicatorParams {
    pub as_of: Option<String>,
}

fn parse_limit(raw: Option<&str>) -> i64 {
    raw.and_then(|l| l.trim().parse().ok())
        .unwrap_or(DEFAULT_LIMIT)
}

fn parse_period(raw: Option<&str>) -> HistoryPeriod {
    match raw {
        None => HistoryPeriod::default(),
        Some(token) => token.parse().unwrap_or_else(|err| {
            debug!(%err, "falling back to default period");
            HistoryPeriod::default()
        }),
    }
}

fn parse_as_of(raw: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match raw.map(str::trim).filter(|d| !d.is_empty()) {
        None => Ok(None),
        Some(day) => NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ApiError::InvalidDate),
    }
}

/// Surrounding whitespace is dropped before lookup.
fn normalize_symbol(symbol: &str) -> Result<&str, ApiError> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(ApiError::SymbolRequired);
    }
    Ok(symbol)
}

/// Undecodable path segments are reported the same way as blank ones.
fn symbol_param(path: Result<Path<String>, PathRejection>) -> Result<String, ApiError> {
    let Path(raw) = path.map_err(|rejection| {
        debug!(%rejection, "unusable symbol path segment");
        ApiError::SymbolRequired
    })?;
    normalize_symbol(&raw).map(str::to_string)
}

#[utoipa::path(
    get,
    path = "/api/v1/stocks",
    params(("limit" = Option<i64>, Query, description = "Maximum number of stocks, default 50")),
    responses(
        (status = 200, description = "Stocks wrapped in a data envelope"),
        (status = 500, description = "Failed to fetch stocks")
    )
)]
pub async fn list_stocks(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<DataResponse<Vec<Stock>>>, ApiError> {
    let limit = parse_limit(params.limit.as_deref());

    let stocks = state
        .stock_service
        .get_stocks(limit)
        .await
        .map_err(|err| {
            error!(error = %err, limit, "failed to fetch stocks");
            ApiError::FetchStocks
        })?;

    Ok(Json(DataResponse::new(stocks)))
}

#[utoipa::path(
    get,
    path = "/api/v1/stocks/{symbol}",
    params(("symbol" = String, Path, description = "Ticker symbol")),
    responses(
        (status = 200, description = "Stock wrapped in a data envelope"),
        (status = 400, description = "Stock symbol is required"),
        (status = 404, description = "Stock not found")
    )
)]
pub async fn get_stock(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<DataResponse<Stock>>, ApiError> {
    let symbol = symbol_param(path)?;

    let stock = state
        .stock_service
        .get_stock_by_symbol(&symbol)
        .await
        .map_err(|err| {
            match &err {
                Error::NotFound => debug!(%symbol, "stock not found"),
                _ => error!(error = %err, %symbol, "stock lookup failed"),
            }
            ApiError::StockNotFound
        })?;

    Ok(Json(DataResponse::new(stock)))
}

#[utoipa::path(
    get,
    path = "/api/v1/stocks/{symbol}/quote",
    params(("symbol" = String, Path, description = "Ticker symbol")),
    responses(
        (status = 200, description = "Quote wrapped in a data envelope"),
        (status = 400, description = "Stock symbol is required"),
        (status = 500, description = "Failed to fetch stock quote")
    )
)]
pub async fn get_stock_quote(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<DataResponse<StockQuote>>, ApiError> {
    let symbol = symbol_param(path)?;

    let quote = state
        .stock_service
        .get_stock_quote(&symbol)
        .await
        .map_err(|err| {
            error!(error = %err, %symbol, "failed to fetch stock quote");
            ApiError::FetchQuote
        })?;

    Ok(Json(DataResponse::new(quote)))
}

#[utoipa::path(
    get,
    path = "/api/v1/stocks/{symbol}/history",
    params(
        ("symbol" = String, Path, description = "Ticker symbol"),
        ("period" = Option<String>, Query, description = "1d, 5d, 1m, 3m, 6m, 1y, 2y, 5y, 10y, ytd or max; default 1y")
    ),
    responses(
        (status = 200, description = "Daily prices wrapped in a data envelope"),
        (status = 400, description = "Stock symbol is required"),
        (status = 500, description = "Failed to fetch stock history")
    )
)]
pub async fn get_stock_history(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<DataResponse<Vec<StockPrice>>>, ApiError> {
    let symbol = symbol_param(path)?;
    let period = parse_period(params.period.as_deref());

    let history = state
        .stock_service
        .get_stock_history(&symbol, period)
        .await
        .map_err(|err| {
            error!(error = %err, %symbol, %period, "failed to fetch stock history");
            ApiError::FetchHistory
        })?;

    Ok(Json(DataResponse::new(history)))
}

#[utoipa::path(
    get,
    path = "/api/v1/stocks/{symbol}/indicators",
    params(
        ("symbol" = String, Path, description = "Ticker symbol"),
        ("as_of" = Option<String>, Query, description = "YYYY-MM-DD; latest bar when omitted")
    ),
    responses(
        (status = 200, description = "Technical indicators wrapped in a data envelope"),
        (status = 400, description = "Stock symbol is required, or as_of is malformed"),
        (status = 500, description = "Failed to fetch technical indicators")
    )
)]
pub async fn get_stock_indicators(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    Query(params): Query<IndicatorParams>,
) -> Result<Json<DataResponse<TechnicalIndicators>>, ApiError> {
    let symbol = symbol_param(path)?;
    let as_of = parse_as_of(params.as_of.as_deref())?;

    let indicators = state
        .stock_service
        .get_technical_indicators(&symbol, as_of)
        .await
        .map_err(|err| {
            error!(error = %err, %symbol, ?as_of, "failed to fetch technical indicators");
            ApiError::FetchIndicators
        })?;

    Ok(Json(DataResponse::new(indicators)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_falls_back() {
        assert_eq!(parse_limit(None), 50);
        assert_eq!(parse_limit(Some("2")), 2);
        assert_eq!(parse_limit(Some("abc")), 50);
        assert_eq!(parse_limit(Some("")), 50);
    }

    #[test]
    fn period_defaults_and_falls_back() {
        assert_eq!(parse_period(None), HistoryPeriod::OneYear);
        assert_eq!(parse_period(Some("5d")), HistoryPeriod::FiveDays);
        assert_eq!(parse_period(Some("forever")), HistoryPeriod::OneYear);
    }

    #[test]
    fn blank_symbols_are_rejected() {
        assert_eq!(normalize_symbol(""), Err(ApiError::SymbolRequired));
        assert_eq!(normalize_symbol("   "), Err(ApiError::SymbolRequired));
        assert_eq!(normalize_symbol(" AAPL "), Ok("AAPL"));
    }

    #[test]
    fn as_of_must_be_a_calendar_date() {
        assert_eq!(parse_as_of(None), Ok(None));
        assert_eq!(parse_as_of(Some("")), Ok(None));
        assert_eq!(
            parse_as_of(Some("2024-06-03")),
            Ok(NaiveDate::from_ymd_opt(2024, 6, 3))
        );
        assert_eq!(parse_as_of(Some("2024-13-01")), Err(ApiError::InvalidDate));
        assert_eq!(parse_as_of(Some("yesterday")), Err(ApiError::InvalidDate));
    }
}
