use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use shortlink::http::{router, AppState};
use shortlink::service::ShortUrlService;
use tempfile::TempDir;
use tower::ServiceExt;

// The TempDir keeps the store alive for the duration of the test.
async fn test_app(base_url: Option<&str>) -> (TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    let service = ShortUrlService::open(dir.path().join("shorturl.sqlite"))
        .await
        .unwrap();
    let app = router(AppState {
        service,
        base_url: base_url.map(str::to_string),
    });
    (dir, app)
}

fn shorten_request(target: &str, ttl_seconds: Option<i64>) -> Request<Body> {
    let mut payload = json!({ "url": target });
    if let Some(ttl) = ttl_seconds {
        payload["ttl_seconds"] = json!(ttl);
    }
    Request::builder()
        .method("POST")
        .uri("/shorten")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn shorten_then_redirect_round_trip() {
    let (_dir, app) = test_app(Some("https://sho.rt")).await;
    let target = "https://www.youtube.com/playlist?list=PLabc123";

    let response = app
        .clone()
        .oneshot(shorten_request(target, Some(3600)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let code = body["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 7);
    assert_eq!(body["short_url"], format!("https://sho.rt/s/{code}"));
    assert!(body["expires_at"].as_i64().unwrap() > 0);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/s/{code}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], target);
}

#[tokio::test]
async fn raw_text_bodies_are_accepted() {
    let (_dir, app) = test_app(Some("https://sho.rt")).await;

    let request = Request::builder()
        .method("POST")
        .uri("/shorten")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("https://example.com/page"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["code"].as_str().unwrap().len(), 7);
}

#[tokio::test]
async fn shortening_the_same_target_reuses_the_code() {
    let (_dir, app) = test_app(Some("https://sho.rt")).await;
    let target = "https://www.youtube.com/playlist?list=PLxyz789";

    let first = json_body(
        app.clone()
            .oneshot(shorten_request(target, None))
            .await
            .unwrap(),
    )
    .await;
    let second = json_body(
        app.clone()
            .oneshot(shorten_request(target, None))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(first["code"], second["code"]);
    assert_eq!(first["short_url"], second["short_url"]);
}

#[tokio::test]
async fn invalid_targets_are_rejected() {
    let (_dir, app) = test_app(Some("https://sho.rt")).await;

    for target in [
        "",
        "not a url",
        "ftp://example.com/file",
        "javascript:alert(1)",
    ] {
        let response = app
            .clone()
            .oneshot(shorten_request(target, None))
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "accepted {target:?}"
        );
    }

    let oversized = format!("https://example.com/{}", "a".repeat(4000));
    let response = app.oneshot(shorten_request(&oversized, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_and_malformed_codes_are_not_found() {
    let (_dir, app) = test_app(Some("https://sho.rt")).await;

    // well-formed but absent
    for path in ["/s/abc1234", "/s/abc123", "/s/abc12345"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "for {path}");
    }

    // malformed: wrong length or characters outside [A-Za-z0-9]
    for path in ["/s/abc", "/s/abcdefghi", "/s/abc-12", "/s/abc%2012"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "for {path}");
    }
}

#[tokio::test]
async fn expired_links_stop_resolving() {
    let (_dir, app) = test_app(Some("https://sho.rt")).await;

    let response = app
        .clone()
        .oneshot(shorten_request("https://example.com/ephemeral", Some(1)))
        .await
        .unwrap();
    let code = json_body(response).await["code"]
        .as_str()
        .unwrap()
        .to_string();

    tokio::time::sleep(Duration::from_secs(2)).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/s/{code}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn base_url_is_derived_from_the_request_when_not_configured() {
    let (_dir, app) = test_app(None).await;

    let request = Request::builder()
        .method("POST")
        .uri("/shorten")
        .header(header::HOST, "short.example")
        .header("x-forwarded-proto", "https")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "url": "https://example.com/page" }).to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let code = body["code"].as_str().unwrap();
    assert_eq!(body["short_url"], format!("https://short.example/s/{code}"));
}
