use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use crate::error::{AppError, Result};

const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: SocketAddr,
    pub fetch: FetchConfig,
}

/// Limits applied to every outbound page fetch.
#[derive(Clone, Debug)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_body_bytes: usize,
    pub max_redirects: usize,
    pub user_agent: String,
    pub allow_private_hosts: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_redirects: 5,
            user_agent: concat!("wishlist-scraper/", env!("CARGO_PKG_VERSION")).to_string(),
            allow_private_hosts: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup, falling back to
    /// defaults for anything unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = lookup("PORT").unwrap_or_else(|| "3000".to_string());
        let port = port.parse::<u16>().map_err(|e| AppError::ConfigError(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host).map_err(|e| AppError::ConfigError(format!("Invalid host address: {}", e)))?;

        let defaults = FetchConfig::default();
        let fetch = FetchConfig {
            timeout: secs(&lookup, "SCRAPE_TIMEOUT_SECS", defaults.timeout)?,
            connect_timeout: secs(&lookup, "SCRAPE_CONNECT_TIMEOUT_SECS", defaults.connect_timeout)?,
            max_body_bytes: number(&lookup, "SCRAPE_MAX_BODY_BYTES", defaults.max_body_bytes)?,
            max_redirects: number(&lookup, "SCRAPE_MAX_REDIRECTS", defaults.max_redirects)?,
            user_agent: lookup("SCRAPE_USER_AGENT").unwrap_or(defaults.user_agent),
            allow_private_hosts: flag(&lookup, "SCRAPE_ALLOW_PRIVATE_HOSTS", defaults.allow_private_hosts)?,
        };

        if fetch.max_body_bytes == 0 {
            return Err(AppError::ConfigError("SCRAPE_MAX_BODY_BYTES must be positive".to_string()));
        }

        Ok(Config {
            server_addr: SocketAddr::new(ip, port),
            fetch,
        })
    }
}

fn number<F>(lookup: &F, key: &str, default: usize) -> Result<usize>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|e| AppError::ConfigError(format!("Invalid {}: {}", key, e))),
        None => Ok(default),
    }
}

fn secs<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = number(lookup, key, default.as_secs() as usize)?;
    if secs == 0 {
        return Err(AppError::ConfigError(format!("{} must be at least 1 second", key)));
    }
    Ok(Duration::from_secs(secs as u64))
}

fn flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(AppError::ConfigError(format!("Invalid {}: {:?}", key, other))),
    }
}
