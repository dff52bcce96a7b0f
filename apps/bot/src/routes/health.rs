use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::state::AppState;

/// GET /health
/// Returns service status and the date of the last completed reminder scan.
pub async fn health_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let last_scan = state.store.last_scan_date().await?;
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": env!("CARGO_PKG_NAME"),
        "last_scan_date": last_scan,
    })))
}
