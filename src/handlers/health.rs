use axum::Json;
use serde_json::{json, Value};

#[utoipa::path(get, path = "/health", responses((status = 200, description = "Service is up")))]
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Financial App Backend is running"
    }))
}
