use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::provider::MarketDataError;

/// Failures raised below the HTTP layer.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client-visible failures. The underlying cause is logged by the handler and
/// never serialized.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    #[error("Stock symbol is required")]
    SymbolRequired,

    #[error("Stock not found")]
    StockNotFound,

    #[error("Failed to fetch stocks")]
    FetchStocks,

    #[error("Failed to fetch stock quote")]
    FetchQuote,

    #[error("Failed to fetch stock history")]
    FetchHistory,

    #[error("Failed to fetch technical indicators")]
    FetchIndicators,

    #[error("Invalid as_of date, expected YYYY-MM-DD")]
    InvalidDate,

    #[error("Request timed out")]
    RequestTimeout,

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::SymbolRequired | ApiError::InvalidDate => StatusCode::BAD_REQUEST,
            ApiError::StockNotFound => StatusCode::NOT_FOUND,
            ApiError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::FetchStocks
            | ApiError::FetchQuote
            | ApiError::FetchHistory
            | ApiError::FetchIndicators
            | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string()
        }));

        (self.status(), body).into_response()
    }
}
