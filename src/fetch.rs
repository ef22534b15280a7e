use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{header, redirect, Client, ClientBuilder, Response};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::extract::{extract, ScrapeResult};
use crate::policy::{DestinationPolicy, PublicResolver};

/// Retrieves the raw HTML of a page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String>;
}

/// [`PageFetcher`] backed by a shared reqwest client.
pub struct HttpFetcher {
    client: Client,
    policy: DestinationPolicy,
    max_body_bytes: usize,
}

impl HttpFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let fetch = &config.fetch;
        let policy = DestinationPolicy::new(fetch.allow_private_hosts);
        let max_redirects = fetch.max_redirects;

        let redirects = redirect::Policy::custom(move |attempt| {
            let verdict = check_redirect(&policy, max_redirects, attempt.previous().len(), attempt.url());
            match verdict {
                Ok(()) => attempt.follow(),
                Err(e) => attempt.error(e),
            }
        });

        let mut builder = ClientBuilder::new()
            .user_agent(fetch.user_agent.clone())
            .timeout(fetch.timeout)
            .connect_timeout(fetch.connect_timeout)
            .pool_max_idle_per_host(10)
            .redirect(redirects);
        if !fetch.allow_private_hosts {
            builder = builder.dns_resolver(Arc::new(PublicResolver));
        }
        let client = builder
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpFetcher {
            client,
            policy,
            max_body_bytes: fetch.max_body_bytes,
        })
    }
}

/// Decides whether to follow a redirect to `next` after `hops` requests.
/// Name resolution for the hop still goes through the client's resolver.
fn check_redirect(policy: &DestinationPolicy, max_redirects: usize, hops: usize, next: &Url) -> Result<()> {
    if hops > max_redirects {
        return Err(AppError::FetchError(format!("more than {} redirects", max_redirects)));
    }
    policy.check(next)
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<String> {
        self.policy.ensure_allowed(url).await?;

        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::FetchError(format!("{} returned {}", url, status)));
        }
        ensure_html(&response)?;

        let body = read_capped(response, self.max_body_bytes).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

/// Missing `Content-Type` is accepted; anything declared must be HTML.
fn ensure_html(response: &Response) -> Result<()> {
    let Some(value) = response.headers().get(header::CONTENT_TYPE) else {
        return Ok(());
    };
    let content_type = value.to_str().unwrap_or("").to_ascii_lowercase();
    let mime = content_type.split(';').next().unwrap_or("").trim();
    if mime == "text/html" || mime == "application/xhtml+xml" {
        Ok(())
    } else {
        Err(AppError::NotHtml(content_type))
    }
}

/// Reads at most `limit` bytes of the body, dropping the remainder.
/// Stops as soon as the cap is reached without waiting on the rest.
async fn read_capped(mut response: Response, limit: usize) -> Result<Vec<u8>> {
    let declared = response.content_length();
    let mut body = Vec::with_capacity(declared.map_or(8 * 1024, |n| (n as usize).min(limit)));

    while let Some(chunk) = response.chunk().await? {
        let room = limit - body.len();
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            if chunk.len() > room || declared.is_some_and(|n| n > limit as u64) {
                warn!(url = %response.url(), limit, "response body truncated");
            }
            break;
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}

/// Parses `raw_url`, fetches it within `deadline` and extracts the summary.
pub async fn scrape(fetcher: &dyn PageFetcher, raw_url: &str, deadline: Duration) -> Result<ScrapeResult> {
    let url = Url::parse(raw_url)?;

    info!(url = %url, "Fetching page");
    let fetch_start = Instant::now();
    let html = tokio::time::timeout(deadline, fetcher.fetch(&url))
        .await
        .map_err(|_| AppError::Timeout(deadline))??;
    debug!(url = %url, bytes = html.len(), elapsed = ?fetch_start.elapsed(), "Page fetched");

    Ok(extract(&html))
}
