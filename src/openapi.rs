use axum::Json;
use utoipa::OpenApi;

use crate::{handlers, models};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::list_stocks,
        handlers::get_stock,
        handlers::get_stock_quote,
        handlers::get_stock_history,
        handlers::get_stock_indicators,
    ),
    components(schemas(
        models::Stock,
        models::StockPrice,
        models::StockQuote,
        models::TechnicalIndicators
    )),
    tags((name = "stocks", description = "Stock metadata, quotes, daily history and indicators"))
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
