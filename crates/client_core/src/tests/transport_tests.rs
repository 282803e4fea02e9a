use super::*;
use anyhow::Result;
use axum::{
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use shared::error::ErrorCode;
use tokio::net::TcpListener;

#[derive(Debug, Deserialize, PartialEq)]
struct Echo {
    value: i64,
}

async fn spawn_echo_server() -> Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/api/echo", get(|| async { Json(json!({ "value": 7 })) }))
        .route(
            "/api/echo",
            post(|Json(body): Json<Value>| async move { Json(body) }),
        )
        .route(
            "/api/missing",
            get(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": "Session not found" })),
                )
            }),
        )
        .route("/api/garbled", get(|| async { "not json" }))
        .route("/api/gone", delete(|| async { StatusCode::OK }));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}/api/"))
}

#[tokio::test]
async fn decodes_json_and_trims_base_url() {
    let base = spawn_echo_server().await.expect("spawn server");
    let transport = HttpTransport::new(&base).expect("transport");
    assert!(!transport.base_url().ends_with('/'));

    let echo: Echo = transport.get_json("/echo").await.expect("get");
    assert_eq!(echo, Echo { value: 7 });

    let echo: Echo = transport
        .post_json("/echo", &json!({ "value": 11 }))
        .await
        .expect("post");
    assert_eq!(echo.value, 11);

    transport.delete("/gone").await.expect("delete");
}

#[tokio::test]
async fn error_status_carries_service_message() {
    let base = spawn_echo_server().await.expect("spawn server");
    let transport = HttpTransport::new(&base).expect("transport");

    let err = transport
        .get_json::<Echo>("/missing")
        .await
        .expect_err("404");
    match err {
        TransportError::Status {
            endpoint,
            status,
            error,
        } => {
            assert_eq!(endpoint, "/missing");
            assert_eq!(status, 404);
            assert_eq!(error.code, ErrorCode::NotFound);
            assert_eq!(error.message, "Session not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn undecodable_body_is_a_decode_error() {
    let base = spawn_echo_server().await.expect("spawn server");
    let transport = HttpTransport::new(&base).expect("transport");

    let err = transport
        .get_json::<Echo>("/garbled")
        .await
        .expect_err("decode");
    assert!(matches!(err, TransportError::Decode { .. }));
}

#[tokio::test]
async fn unreachable_service_is_a_request_error() {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let transport = HttpTransport::new(&format!("http://{addr}")).expect("transport");
    let err = transport.get_json::<Echo>("/echo").await.expect_err("refused");
    assert!(matches!(err, TransportError::Request { .. }));
}

#[test]
fn rejects_invalid_base_url() {
    assert!(HttpTransport::new("not a url").is_err());
}
