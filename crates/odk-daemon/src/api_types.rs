//! Request and response types for odk-daemon HTTP endpoints.
//!
//! Order domain shapes live in `odk-schemas`; only daemon-local response
//! bodies are defined here. No business logic.

use serde::{Deserialize, Serialize};

/// Error body for 404 / 422 / 500 responses: `{"detail": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Response for GET /health.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
    /// Store connectivity + schema presence probe result.
    pub db_ok: bool,
    /// WebSocket connections currently registered.
    pub ws_clients: usize,
}
