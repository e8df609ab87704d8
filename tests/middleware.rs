//! Integration tests for the rate limit layer and demo router.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::request::Parts;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};
use chrono::{TimeZone, Utc};
use tower::{BoxError, ServiceBuilder, ServiceExt};

use hitguard::error::{HitguardError, Result};
use hitguard::http::{router, RateLimitInfo, RateLimitLayer, RateLimitOptions};
use hitguard::ratelimit::{ManualClock, WindowStore};

const LEGACY_HEADERS: [&str; 4] = [
    "x-ratelimit-limit",
    "x-ratelimit-used",
    "x-ratelimit-remaining",
    "x-retry-after",
];
const STANDARD_HEADERS: [&str; 4] = [
    "ratelimit-limit",
    "ratelimit-used",
    "ratelimit-remaining",
    "retry-after",
];

fn store(window_secs: u64, max_connections: u64) -> Arc<WindowStore> {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    Arc::new(WindowStore::new(window_secs, max_connections).with_clock(clock))
}

fn request_from(ip: [u8; 4]) -> Request<Body> {
    let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((ip, 40000))));
    request
}

async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_admitted_request_reaches_handler_with_headers() {
    let layer = RateLimitLayer::builder().store(store(60, 2)).build().unwrap();
    let app = router(layer);

    let response = app.oneshot(request_from([10, 0, 0, 1])).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-limit"], "2");
    assert_eq!(response.headers()["x-ratelimit-used"], "1");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "1");
    assert!(!response.headers().contains_key("x-retry-after"));

    let body = body_string(response).await;
    assert!(body.contains("\"remaining\":1"), "unexpected body: {}", body);
}

#[tokio::test]
async fn test_rejected_request_gets_429_and_legacy_headers_only() {
    let layer = RateLimitLayer::builder().store(store(60, 2)).build().unwrap();
    let app = router(layer);

    for _ in 0..2 {
        let response = app.clone().oneshot(request_from([10, 0, 0, 1])).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(request_from([10, 0, 0, 1])).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    for name in LEGACY_HEADERS {
        assert!(response.headers().contains_key(name), "missing {}", name);
    }
    for name in STANDARD_HEADERS {
        assert!(!response.headers().contains_key(name), "unexpected {}", name);
    }
    assert_eq!(response.headers()["x-ratelimit-used"], "3");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    assert_eq!(response.headers()["x-retry-after"], "2024-01-01T00:01:00.000Z");
    assert_eq!(body_string(response).await, "Too many requests, please try again later.");

    // Other clients are unaffected
    let response = app.oneshot(request_from([10, 0, 0, 2])).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_standard_headers_only() {
    let layer = RateLimitLayer::builder()
        .store(store(60, 0))
        .legacy_headers(false)
        .standard_headers(true)
        .build()
        .unwrap();
    let app = router(layer);

    app.clone().oneshot(request_from([10, 0, 0, 1])).await.unwrap();
    let response = app.oneshot(request_from([10, 0, 0, 1])).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    for name in STANDARD_HEADERS {
        assert!(response.headers().contains_key(name), "missing {}", name);
    }
    for name in LEGACY_HEADERS {
        assert!(!response.headers().contains_key(name), "unexpected {}", name);
    }
}

#[tokio::test]
async fn test_no_headers_when_both_conventions_disabled() {
    let layer = RateLimitLayer::builder()
        .store(store(60, 0))
        .legacy_headers(false)
        .build()
        .unwrap();
    let app = router(layer);

    app.clone().oneshot(request_from([10, 0, 0, 1])).await.unwrap();
    let response = app.oneshot(request_from([10, 0, 0, 1])).await.unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    for name in LEGACY_HEADERS.iter().chain(STANDARD_HEADERS.iter()) {
        assert!(!response.headers().contains_key(*name), "unexpected {}", name);
    }
}

#[tokio::test]
async fn test_custom_status_and_message() {
    let layer = RateLimitLayer::builder()
        .store(store(60, 0))
        .status_code(503)
        .message("come back later")
        .build()
        .unwrap();
    let app = router(layer);

    app.clone().oneshot(request_from([10, 0, 0, 1])).await.unwrap();
    let response = app.oneshot(request_from([10, 0, 0, 1])).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_string(response).await, "come back later");
}

#[tokio::test]
async fn test_custom_handler_still_gets_headers() {
    let layer = RateLimitLayer::builder()
        .store(store(60, 0))
        .handler(|_: &Parts, info: &RateLimitInfo, _: &RateLimitOptions| -> Response {
            (StatusCode::FORBIDDEN, format!("limit {}", info.limit)).into_response()
        })
        .build()
        .unwrap();
    let app = router(layer);

    app.clone().oneshot(request_from([10, 0, 0, 1])).await.unwrap();
    let response = app.oneshot(request_from([10, 0, 0, 1])).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(response.headers().contains_key("x-retry-after"));
    assert_eq!(body_string(response).await, "limit 0");
}

#[tokio::test]
async fn test_missing_peer_address_is_server_error() {
    let store = store(60, 5);
    let layer = RateLimitLayer::builder().store(store.clone()).build().unwrap();
    let app = router(layer);

    let request = Request::builder().uri("/").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_key_error_propagates_through_service_error() {
    let layer = RateLimitLayer::builder()
        .store(store(60, 5))
        .key_generator(|_: &Parts| -> Result<String> {
            Err(HitguardError::KeyExtraction("no identity".to_string()))
        })
        .build()
        .unwrap();

    let service = ServiceBuilder::new()
        .layer(layer)
        .service_fn(|_: Request<Body>| async { Ok::<_, BoxError>(StatusCode::OK.into_response()) });

    let error = service
        .oneshot(Request::new(Body::empty()))
        .await
        .unwrap_err();

    let error = error.downcast::<HitguardError>().unwrap();
    assert!(matches!(*error, HitguardError::KeyExtraction(_)));
}

#[tokio::test]
async fn test_admin_reset_restores_client() {
    let layer = RateLimitLayer::builder().store(store(60, 0)).build().unwrap();
    let app = router(layer);

    app.clone().oneshot(request_from([10, 0, 0, 1])).await.unwrap();
    let response = app.clone().oneshot(request_from([10, 0, 0, 1])).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let reset = Request::builder()
        .method("DELETE")
        .uri("/limits/10.0.0.1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(reset).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(request_from([10, 0, 0, 1])).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-used"], "1");
}

#[tokio::test]
async fn test_health_is_not_rate_limited() {
    let layer = RateLimitLayer::builder().store(store(60, 0)).build().unwrap();
    let app = router(layer);

    for _ in 0..5 {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_layer_on_custom_router_exposes_info() {
    let layer = RateLimitLayer::builder()
        .store(store(60, 10))
        .key_generator(|_: &Parts| -> Result<String> { Ok("everyone".to_string()) })
        .build()
        .unwrap();

    let app = Router::new()
        .route(
            "/items",
            get(|Extension(info): Extension<RateLimitInfo>| async move { info.remaining.to_string() }),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::error_handling::HandleErrorLayer::new(|_: BoxError| async {
                    StatusCode::INTERNAL_SERVER_ERROR
                }))
                .layer(layer),
        );

    let request = Request::builder().uri("/items").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(body_string(response).await, "9");

    let request = Request::builder().uri("/items").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(body_string(response).await, "8");
}
