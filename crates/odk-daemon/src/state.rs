//! Shared runtime state for odk-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The store pool and the
//! registry handle are both cheap to clone; this module owns nothing async
//! itself beyond spawning the registry task.

use sqlx::SqlitePool;

use crate::registry::Registry;

/// Static build metadata included in health responses.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (Arc) handle shared across all Axum handlers.
pub struct AppState {
    /// Order store pool; one session per request.
    pub db: SqlitePool,
    /// Channel-serialized WebSocket connection registry.
    pub registry: Registry,
    /// Static build metadata.
    pub build: BuildInfo,
}

impl AppState {
    /// Build the shared state over an already-migrated pool and spawn the
    /// registry task. Must be called on a Tokio runtime.
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            registry: Registry::spawn(),
            build: BuildInfo {
                service: "odk-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}
