pub mod api;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod policy;

use std::sync::Arc;
use config::Config;
use error::Result;
use fetch::{HttpFetcher, PageFetcher};

/// Application state that will be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub fetcher: Arc<dyn PageFetcher>,
}

impl AppState {
    /// Builds state backed by the real HTTP fetcher.
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config)?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    pub fn with_fetcher(config: Config, fetcher: Arc<dyn PageFetcher>) -> Self {
        AppState {
            config: Arc::new(config),
            fetcher,
        }
    }
}
