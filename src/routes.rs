use std::time::Duration;

use axum::{error_handling::HandleErrorLayer, routing::get, BoxError, Router};
use tower::{timeout::error::Elapsed, timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, warn};

use crate::{
    error::ApiError,
    handlers::{
        get_stock, get_stock_history, get_stock_indicators, get_stock_quote, health, list_stocks,
    },
    openapi::openapi_json,
    state::AppState,
};

pub fn app_router(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // CORS goes on last so every response, timeouts included, carries it.
    Router::new()
        .route("/health", get(health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .route("/api/v1/stocks", get(list_stocks))
        .route("/api/v1/stocks/:symbol", get(get_stock))
        .route("/api/v1/stocks/:symbol/quote", get(get_stock_quote))
        .route("/api/v1/stocks/:symbol/history", get(get_stock_history))
        .route("/api/v1/stocks/:symbol/indicators", get(get_stock_indicators))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        warn!("request deadline exceeded");
        ApiError::RequestTimeout
    } else {
        error!(error = %err, "unhandled middleware error");
        ApiError::Internal
    }
}
