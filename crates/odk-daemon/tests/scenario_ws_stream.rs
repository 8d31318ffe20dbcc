//! End-to-end scenario for the /ws streaming endpoint.
//!
//! Unlike the other scenario files this one binds a real TCP socket: the
//! upgrade handshake and close frames cannot be driven through `oneshot`.
//! A `tokio-tungstenite` client connects to the served router while HTTP
//! writes are issued in-process against the same shared state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{Request, StatusCode};
use futures_util::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use odk_daemon::{routes, state};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn make_state() -> Arc<state::AppState> {
    let pool = odk_db::connect("sqlite::memory:").await.expect("connect");
    odk_db::migrate(&pool).await.expect("migrate");
    Arc::new(state::AppState::new(pool))
}

/// Serve the router on an ephemeral local port; returns the bound address.
async fn serve(st: Arc<state::AppState>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = routes::build_router(st);
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("serve");
    });
    addr
}

async fn wait_for_clients(st: &state::AppState, n: usize) {
    for _ in 0..200 {
        if st.registry.client_count() == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "registry population never reached {n} (now {})",
        st.registry.client_count()
    );
}

async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn json_req(method: &str, uri: &str, body: &str) -> Request<axum::body::Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

// ---------------------------------------------------------------------------
// Connect → create → receive → close
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ws_client_receives_events_and_close_unregisters() {
    let st = make_state().await;
    let addr = serve(Arc::clone(&st)).await;

    let (mut ws, _resp) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("ws connect");
    wait_for_clients(&st, 1).await;

    // The health probe sees the registered connection.
    let (_, body) = call(
        routes::build_router(Arc::clone(&st)),
        Request::builder()
            .method("GET")
            .uri("/health")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["ws_clients"], 1);

    // A create issued against the same state reaches the socket.
    let (status, body) = call(
        routes::build_router(Arc::clone(&st)),
        json_req(
            "POST",
            "/orders",
            r#"{"customer_name":"A","item":"X","quantity":2,"price":10}"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let created: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let frame = timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timed out waiting for ws frame")
        .expect("ws stream ended")
        .expect("ws error");
    let WsMessage::Text(text) = frame else {
        panic!("expected a text frame, got {frame:?}");
    };
    let event: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(event["event"], "order_created");
    assert_eq!(event["order"], created);

    // Closing the socket unregisters the connection.
    ws.close(None).await.expect("close");
    wait_for_clients(&st, 0).await;
}

#[tokio::test]
async fn inbound_payloads_are_discarded_without_closing() {
    let st = make_state().await;
    let addr = serve(Arc::clone(&st)).await;

    let (mut ws, _resp) = connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("ws connect");
    wait_for_clients(&st, 1).await;

    // No inbound protocol exists: any payload is read and dropped.
    ws.send(WsMessage::Text("hello?".to_string()))
        .await
        .expect("send");

    let (_, body) = call(
        routes::build_router(Arc::clone(&st)),
        json_req(
            "POST",
            "/orders",
            r#"{"customer_name":"B","item":"Y","quantity":1,"price":5}"#,
        ),
    )
    .await;
    let created: serde_json::Value = serde_json::from_slice(&body).unwrap();

    // The connection is still open and still receives events; the inbound
    // text was never echoed or answered.
    let frame = timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timed out waiting for ws frame")
        .expect("ws stream ended")
        .expect("ws error");
    let WsMessage::Text(text) = frame else {
        panic!("expected a text frame, got {frame:?}");
    };
    let event: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(event["event"], "order_created");
    assert_eq!(event["order"], created);
    assert_eq!(st.registry.client_count(), 1);
}
