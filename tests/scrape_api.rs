use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use url::Url;

use wishlist_scraper::api::routes::create_router;
use wishlist_scraper::config::Config;
use wishlist_scraper::error::{AppError, Result};
use wishlist_scraper::fetch::PageFetcher;
use wishlist_scraper::AppState;

/// Serves canned HTML and counts how often it was asked to.
struct SpyFetcher {
    html: Option<&'static str>,
    calls: AtomicUsize,
}

impl SpyFetcher {
    fn serving(html: &'static str) -> Arc<Self> {
        Arc::new(SpyFetcher { html: Some(html), calls: AtomicUsize::new(0) })
    }

    fn failing() -> Arc<Self> {
        Arc::new(SpyFetcher { html: None, calls: AtomicUsize::new(0) })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for SpyFetcher {
    async fn fetch(&self, _url: &Url) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.html
            .map(str::to_string)
            .ok_or_else(|| AppError::FetchError("connection refused".into()))
    }
}

fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "SCRAPE_ALLOW_PRIVATE_HOSTS" => Some("true".into()),
        "SCRAPE_TIMEOUT_SECS" => Some("2".into()),
        _ => None,
    })
    .unwrap()
}

fn app(fetcher: Arc<SpyFetcher>) -> Router {
    create_router(AppState::with_fetcher(test_config(), fetcher))
}

async fn post_raw(app: Router, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/scrape-url")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post(app: Router, body: Value) -> (StatusCode, Value) {
    post_raw(app, &body.to_string()).await
}

const PRODUCT_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Acme Store - Trail Backpack</title>
  <meta property="og:title" content="Trail Backpack 30L">
  <meta name="description" content="A light daypack.">
</head>
<body>
  <img src="/thumb.jpg" width="50" height="50">
  <img src="/hero.jpg" width="80" height="80">
  <span itemprop="price" content="49.99">$49.99</span>
</body>
</html>"#;

#[tokio::test]
async fn returns_extracted_fields() {
    let fetcher = SpyFetcher::serving(PRODUCT_PAGE);
    let (status, body) = post(app(fetcher.clone()), json!({ "url": "https://shop.example.com/backpack" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "name": "Trail Backpack 30L",
            "imageUrl": "/hero.jpg",
            "description": "A light daypack.",
            "price": "49.99",
        })
    );
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn page_without_metadata_is_all_empty_strings() {
    let fetcher = SpyFetcher::serving("<html><body><p>nothing here</p></body></html>");
    let (status, body) = post(app(fetcher), json!({ "url": "https://example.com/" })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "name": "", "imageUrl": "", "description": "", "price": "" }));
}

#[tokio::test]
async fn missing_url_is_rejected_without_fetching() {
    for body in [json!({}), json!({ "url": "" }), json!({ "url": null })] {
        let fetcher = SpyFetcher::serving(PRODUCT_PAGE);
        let (status, response) = post(app(fetcher.clone()), body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response, json!({ "error": "No URL provided" }));
        assert_eq!(fetcher.calls(), 0);
    }
}

#[tokio::test]
async fn unreadable_body_counts_as_missing_url() {
    let fetcher = SpyFetcher::serving(PRODUCT_PAGE);
    let (status, response) = post_raw(app(fetcher.clone()), "{not json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response, json!({ "error": "No URL provided" }));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn fetch_failure_is_a_generic_500() {
    let fetcher = SpyFetcher::failing();
    let (status, body) = post(app(fetcher.clone()), json!({ "url": "https://unreachable.example/" })).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Failed to scrape" }));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn malformed_url_fails_before_fetching() {
    for url in [json!("not a url"), json!("/relative/path"), json!(123)] {
        let fetcher = SpyFetcher::serving(PRODUCT_PAGE);
        let (status, body) = post(app(fetcher.clone()), json!({ "url": url })).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Failed to scrape" }));
        assert_eq!(fetcher.calls(), 0);
    }
}

#[tokio::test]
async fn unreachable_host_through_real_fetcher_is_500() {
    let state = AppState::new(test_config()).unwrap();
    // Port 1 on loopback has nothing listening.
    let (status, body) = post(create_router(state), json!({ "url": "http://127.0.0.1:1/" })).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Failed to scrape" }));
}

#[tokio::test]
async fn health_reports_ok() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app(SpyFetcher::failing()).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(serde_json::from_slice::<Value>(&bytes).unwrap(), json!({ "status": "ok" }));
}
