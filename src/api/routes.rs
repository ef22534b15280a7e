use axum::{
    routing::{get, post},
    Router,
    extract::{rejection::JsonRejection, Json, State},
    response::IntoResponse,
};
use serde_json::json;
use tower_http::cors::{CorsLayer, Any};
use tracing::{debug, error, info, warn};

use crate::error::{AppError, Result};
use crate::api::models::{ScrapeRequest, ScrapeResult};
use crate::api::response;
use crate::fetch::scrape;
use crate::AppState;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/scrape-url", post(scrape_url_handler))
        .route("/health", get(health))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn health() -> impl IntoResponse {
    response::success(json!({ "status": "ok" }))
}

async fn scrape_url_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ScrapeRequest>, JsonRejection>,
) -> impl IntoResponse {
    let start_time = std::time::Instant::now();

    let result = match payload {
        Ok(Json(req)) => process_scrape_request(&state, req).await,
        Err(rejection) => {
            warn!(error = %rejection, "Unreadable scrape request body");
            Err(AppError::MissingInput)
        }
    };

    match result {
        Ok(summary) => {
            info!(elapsed = ?start_time.elapsed(), "Scrape succeeded");
            response::success(summary).into_response()
        }
        Err(err) => {
            match &err {
                AppError::MissingInput => debug!("Scrape request without a URL"),
                _ => error!(error = %err, elapsed = ?start_time.elapsed(), "Scrape failed"),
            }
            err.into_response()
        }
    }
}

async fn process_scrape_request(state: &AppState, req: ScrapeRequest) -> Result<ScrapeResult> {
    let url = req.url.ok_or(AppError::MissingInput)?;
    info!(url = %url, "Processing scrape request");

    scrape(state.fetcher.as_ref(), &url, state.config.fetch.timeout).await
}
