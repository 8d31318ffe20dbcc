//! Axum router and all HTTP handlers for odk-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers.  All handlers are `pub(crate)` so the scenario tests in
//! `tests/` can compose the router directly.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use odk_schemas::{NewOrder, OrderEvent, OrderPatch};
use tracing::{error, info};

use crate::{
    api_types::{ErrorResponse, HealthResponse},
    state::AppState,
    ws,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/:id", put(update_order))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let db_ok = match odk_db::status(&st.db).await {
        Ok(s) => s.ok && s.has_orders_table,
        Err(err) => {
            error!(?err, "health: db status probe failed");
            false
        }
    };

    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
            db_ok,
            ws_clients: st.registry.client_count(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /orders
// ---------------------------------------------------------------------------

pub(crate) async fn list_orders(State(st): State<Arc<AppState>>) -> Response {
    match odk_db::list_open_orders(&st.db).await {
        Ok(orders) => (StatusCode::OK, Json(orders)).into_response(),
        Err(err) => internal_error(err),
    }
}

// ---------------------------------------------------------------------------
// POST /orders
// ---------------------------------------------------------------------------

pub(crate) async fn create_order(
    State(st): State<Arc<AppState>>,
    payload: Result<Json<NewOrder>, JsonRejection>,
) -> Response {
    // Shape violations are refused before any write reaches the store.
    let Json(new) = match payload {
        Ok(p) => p,
        Err(rej) => return unprocessable(rej),
    };

    match odk_db::insert_order(&st.db, &new).await {
        Ok(order) => {
            info!(order_id = order.id, "orders/create");
            st.registry.broadcast(OrderEvent::OrderCreated(order.clone()));
            (StatusCode::OK, Json(order)).into_response()
        }
        Err(err) => internal_error(err),
    }
}

// ---------------------------------------------------------------------------
// PUT /orders/:id
// ---------------------------------------------------------------------------

pub(crate) async fn update_order(
    State(st): State<Arc<AppState>>,
    Path(order_id): Path<i64>,
    payload: Result<Json<OrderPatch>, JsonRejection>,
) -> Response {
    let Json(patch) = match payload {
        Ok(p) => p,
        Err(rej) => return unprocessable(rej),
    };

    match odk_db::update_order(&st.db, order_id, &patch).await {
        Ok(Some(order)) => {
            info!(order_id = order.id, "orders/update");
            st.registry.broadcast(OrderEvent::OrderUpdated(order.clone()));
            (StatusCode::OK, Json(order)).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Order not found")),
        )
            .into_response(),
        Err(err) => internal_error(err),
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Malformed or shape-violating JSON body: structured 422, nothing written.
fn unprocessable(rej: JsonRejection) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse::new(rej.body_text())),
    )
        .into_response()
}

/// Store failures surface as a generic 500; the chain goes to the log only.
fn internal_error(err: anyhow::Error) -> Response {
    error!(?err, "internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("internal server error")),
    )
        .into_response()
}
