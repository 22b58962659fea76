use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Technical indicators for a symbol as of the last daily bar used. Each
/// value is `None` when there are too few bars to compute it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TechnicalIndicators {
    pub symbol: String,
    pub as_of_date: NaiveDate,
    /// RSI(14) with Wilder smoothing, 0 to 100.
    pub rsi14: Option<f64>,
    pub ma50: Option<f64>,
    pub ma200: Option<f64>,
    pub twenty_day_high: Option<f64>,
    pub twenty_day_low: Option<f64>,
}
