use std::time::Duration;

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};

use crate::api::response;

pub const MISSING_INPUT_MESSAGE: &str = "No URL provided";
pub const SCRAPE_FAILED_MESSAGE: &str = "Failed to scrape";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No URL provided")]
    MissingInput,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Destination not allowed: {0}")]
    DestinationBlocked(String),

    #[error("Failed to fetch page: {0}")]
    FetchError(String),

    #[error("Response is not HTML: {0}")]
    NotHtml(String),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingInput => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message sent to the caller. Causes other than a missing URL are
    /// collapsed into one generic message.
    pub fn public_message(&self) -> &'static str {
        match self {
            AppError::MissingInput => MISSING_INPUT_MESSAGE,
            _ => SCRAPE_FAILED_MESSAGE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        response::error(self.status(), self.public_message()).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::FetchError(err.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::InvalidUrl(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
