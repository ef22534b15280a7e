//! Destination checks applied before any outbound fetch.
//!
//! The scraper fetches whatever URL a caller hands it, so requests aimed at
//! loopback, private or link-local networks are refused unless the policy
//! was built with `allow_private` (local development and tests).
//!
//! [`DestinationPolicy::check`] looks at the URL text only. Names are covered
//! by [`PublicResolver`], which the HTTP client uses for every connection, so
//! a redirect to a name that resolves inward finds no usable address.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use url::{Host, Url};

use crate::error::{AppError, Result};

#[derive(Clone, Copy, Debug, Default)]
pub struct DestinationPolicy {
    allow_private: bool,
}

impl DestinationPolicy {
    pub fn new(allow_private: bool) -> Self {
        DestinationPolicy { allow_private }
    }

    /// Synchronous check on the URL itself: scheme, host name and IP literals.
    /// Also used for every redirect hop.
    pub fn check(&self, url: &Url) -> Result<()> {
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(AppError::DestinationBlocked(format!(
                "unsupported scheme {:?}",
                url.scheme()
            )));
        }

        let host = url
            .host()
            .ok_or_else(|| AppError::DestinationBlocked("URL has no host".to_string()))?;

        if self.allow_private {
            return Ok(());
        }

        match host {
            Host::Ipv4(v4) => check_ip(IpAddr::V4(v4)),
            Host::Ipv6(v6) => check_ip(IpAddr::V6(v6)),
            Host::Domain(name) => {
                let lower = name.trim_end_matches('.').to_ascii_lowercase();
                if lower == "localhost"
                    || lower.ends_with(".localhost")
                    || lower.ends_with(".local")
                    || lower.ends_with(".internal")
                {
                    return Err(AppError::DestinationBlocked(format!("internal host {}", name)));
                }
                Ok(())
            }
        }
    }

    /// Full check before the initial request: runs [`check`](Self::check) and
    /// then resolves domain hosts, refusing if any address is internal.
    pub async fn ensure_allowed(&self, url: &Url) -> Result<()> {
        self.check(url)?;
        if self.allow_private {
            return Ok(());
        }

        let Some(Host::Domain(name)) = url.host() else {
            return Ok(());
        };
        let port = url.port_or_known_default().unwrap_or(80);

        let addrs = tokio::net::lookup_host((name, port))
            .await
            .map_err(|e| AppError::FetchError(format!("failed to resolve {}: {}", name, e)))?;
        for addr in addrs {
            check_ip(addr.ip())?;
        }
        Ok(())
    }
}

/// DNS resolver for the HTTP client that never hands out internal addresses.
#[derive(Clone, Copy, Debug, Default)]
pub struct PublicResolver;

impl Resolve for PublicResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let host = name.as_str().to_string();
        Box::pin(async move {
            let addrs = resolve_public(&host).await?;
            Ok::<Addrs, Box<dyn std::error::Error + Send + Sync>>(Box::new(addrs.into_iter()))
        })
    }
}

/// Resolves `host` and keeps only public addresses. Fails when nothing is left.
pub async fn resolve_public(host: &str) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|e| AppError::FetchError(format!("failed to resolve {}: {}", host, e)))?
        .filter(|addr| !is_internal_ip(addr.ip()))
        .collect();

    if addrs.is_empty() {
        return Err(AppError::DestinationBlocked(format!("{} resolves only to internal addresses", host)));
    }
    Ok(addrs)
}

fn check_ip(ip: IpAddr) -> Result<()> {
    if is_internal_ip(ip) {
        return Err(AppError::DestinationBlocked(format!("internal address {}", ip)));
    }
    Ok(())
}

pub fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_internal_v4(v4),
        IpAddr::V6(v6) => is_internal_v6(v6),
    }
}

fn is_internal_v4(v4: Ipv4Addr) -> bool {
    let [a, b, ..] = v4.octets();
    v4.is_loopback()
        || v4.is_unspecified()
        || v4.is_private()
        || v4.is_link_local()
        || v4.is_broadcast()
        || a == 0
        // carrier-grade NAT
        || (a == 100 && (64..=127).contains(&b))
}

fn is_internal_v6(v6: Ipv6Addr) -> bool {
    if let Some(mapped) = v6.to_ipv4_mapped() {
        return is_internal_v4(mapped);
    }
    let first = v6.segments()[0];
    v6.is_loopback()
        || v6.is_unspecified()
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80
}
