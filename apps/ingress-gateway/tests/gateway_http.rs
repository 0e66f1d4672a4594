use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use notify_bus::InMemoryBus;
use notify_ingress_gateway::{build_router, GatewayConfig, GatewayState};
use notify_store::MessageStore;
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_config() -> GatewayConfig {
    GatewayConfig {
        addr: "127.0.0.1:0".parse().unwrap(),
        database_path: ":memory:".into(),
        nats_url: "nats://127.0.0.1:4222".into(),
        max_bulk_items: 100,
    }
}

async fn test_router() -> (axum::Router, Arc<InMemoryBus>) {
    let store = MessageStore::open_in_memory().unwrap();
    let bus = Arc::new(InMemoryBus::default());
    let state = Arc::new(GatewayState {
        store,
        bus: bus.clone(),
        config: test_config(),
    });
    (build_router(state), bus)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn register_then_send_requires_site_key() {
    let (router, _bus) = test_router().await;

    let register = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sites/register")
                .header("content-type", "application/json")
                .body(Body::from(json!({"siteName": "acme"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(register.status(), StatusCode::CREATED);

    let unauthorized = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/notifications/send")
                .header("content-type", "application/json")
                .body(
                    Body::from(
                        json!({
                            "channel": "EMAIL",
                            "recipient": "u@x.test",
                            "subject": "hi",
                            "body": "hello"
                        })
                        .to_string(),
                    ),
                )
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn send_with_valid_key_is_accepted_and_published() {
    let (router, bus) = test_router().await;

    let register_response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sites/register")
                .header("content-type", "application/json")
                .body(Body::from(json!({"siteName": "acme"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let registered = body_json(register_response).await;
    let api_key = registered["apiKey"].as_str().unwrap().to_string();

    let send_response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/notifications/send")
                .header("content-type", "application/json")
                .header("x-site-key", api_key)
                .body(
                    Body::from(
                        json!({
                            "channel": "EMAIL",
                            "recipient": "u@x.test",
                            "subject": "hi",
                            "body": "hello"
                        })
                        .to_string(),
                    ),
                )
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(send_response.status(), StatusCode::ACCEPTED);
    let body = body_json(send_response).await;
    assert_eq!(body["status"], "PENDING");

    let published = bus.take_published().await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "notifications.email");
}

#[tokio::test]
async fn missing_required_email_fields_is_rejected() {
    let (router, _bus) = test_router().await;

    let register_response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sites/register")
                .header("content-type", "application/json")
                .body(Body::from(json!({"siteName": "acme"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let registered = body_json(register_response).await;
    let api_key = registered["apiKey"].as_str().unwrap().to_string();

    let send_response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/notifications/send")
                .header("content-type", "application/json")
                .header("x-site-key", api_key)
                .body(
                    Body::from(
                        json!({
                            "channel": "EMAIL",
                            "recipient": "u@x.test"
                        })
                        .to_string(),
                    ),
                )
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(send_response.status(), StatusCode::BAD_REQUEST);
}
