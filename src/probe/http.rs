//! URL-test probe
//!
//! Measures the round-trip time of an HTTP request to a well-known test URL
//! issued *through* the candidate node, using the node as an HTTP or SOCKS
//! proxy. Protocol families that need a tunnel data-plane cannot be
//! measured this way; the [`ProberRegistry`](crate::probe::ProberRegistry)
//! reports those as capability gaps before this prober is ever invoked.

use crate::{
    error::{AppError, ProbeFailure, Result},
    models::{Config, ProfileRecord, ProtocolKind},
    probe::Prober,
};
use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Timed HTTP GET through the node to the configured test URL
pub struct UrlTestProber {
    test_url: String,
    probe_timeout: Duration,
}

impl UrlTestProber {
    /// Create a prober from the application config
    pub fn new(config: &Config) -> Result<Self> {
        // Validate once up front; probe() builds a per-profile client
        url::Url::parse(&config.test_url)
            .map_err(|e| AppError::config(format!("Invalid test URL '{}': {}", config.test_url, e)))?;

        Ok(Self {
            test_url: config.test_url.clone(),
            probe_timeout: config.probe_timeout(),
        })
    }

    /// Proxy URL for the profile, by protocol scheme
    fn proxy_url(profile: &ProfileRecord) -> std::result::Result<String, ProbeFailure> {
        let scheme = match &profile.protocol {
            ProtocolKind::Http => "http",
            ProtocolKind::Socks => "socks5",
            other => {
                return Err(ProbeFailure::CapabilityUnavailable(format!(
                    "URL test requires a tunnel data-plane for {}",
                    other.name()
                )))
            }
        };
        Ok(format!("{}://{}:{}", scheme, profile.server_address, profile.server_port))
    }

    fn classify_reqwest(error: &reqwest::Error) -> ProbeFailure {
        if error.is_timeout() {
            ProbeFailure::Timeout
        } else if error.is_connect() {
            // reqwest folds refused/unreachable into one connect category;
            // recover the crisp variants from the source chain text
            let detail = format!("{:?}", error);
            if detail.contains("ConnectionRefused") || detail.contains("ECONNREFUSED") {
                ProbeFailure::ConnectionRefused
            } else if detail.contains("NetworkUnreachable") || detail.contains("ENETUNREACH") {
                ProbeFailure::NetworkUnreachable
            } else if detail.contains("dns error") || detail.contains("failed to lookup") {
                ProbeFailure::DomainNotFound
            } else {
                ProbeFailure::Unclassified(error.to_string())
            }
        } else {
            ProbeFailure::Unclassified(error.to_string())
        }
    }
}

#[async_trait]
impl Prober for UrlTestProber {
    async fn probe(&self, profile: &ProfileRecord) -> std::result::Result<u32, ProbeFailure> {
        let proxy_url = Self::proxy_url(profile)?;

        let proxy = reqwest::Proxy::all(&proxy_url)
            .map_err(|e| ProbeFailure::Unclassified(format!("Invalid proxy endpoint: {}", e)))?;

        let client = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(self.probe_timeout)
            .user_agent(concat!("proxy-node-selector/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProbeFailure::Unclassified(format!("Failed to create HTTP client: {}", e)))?;

        let start = Instant::now();
        let response = client
            .get(&self.test_url)
            .send()
            .await
            .map_err(|e| Self::classify_reqwest(&e))?;

        // Any response at all proves the path works; 204 is the usual
        // generate_204 answer but captive portals may return other codes
        drop(response);
        let elapsed = start.elapsed().as_millis();
        Ok((elapsed as u32).max(1))
    }
}
