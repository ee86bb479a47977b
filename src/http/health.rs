//! Liveness endpoint.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub ok: bool,
    /// Milliseconds since the Unix epoch.
    pub time: u64,
}

/// `GET /health`: always `200 {"ok": true, "time": <ms>}`.
pub async fn health() -> Json<HealthStatus> {
    let time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;

    Json(HealthStatus { ok: true, time })
}
