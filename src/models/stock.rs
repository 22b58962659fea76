use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// A listed instrument and its descriptive metadata.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Stock {
    pub id: i64,
    pub symbol: String,
    pub name: String,
    pub exchange: String,
    pub sector: String,
    pub industry: String,
    pub market_cap: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
pub struct NewStock {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub exchange: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub market_cap: f64,
}
