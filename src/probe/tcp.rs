//! TCP connect probe
//!
//! Measures the time to establish a TCP connection to the profile's server
//! endpoint. Hostnames are resolved first; a resolution failure classifies
//! as `DomainNotFound` without attempting a connection.

use crate::{error::ProbeFailure, models::ProfileRecord, probe::Prober};
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Timed TCP connect against `server_address:server_port`
pub struct TcpProber {
    connect_timeout: Duration,
    resolver: TokioAsyncResolver,
}

impl TcpProber {
    /// Create a prober with the given per-probe connect timeout
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        }
    }

    /// Resolve a hostname to its first address.
    ///
    /// Any resolution failure (NXDOMAIN, servfail, no resolver reachable)
    /// counts as the domain not being usable for this probe.
    async fn resolve(&self, host: &str) -> Result<IpAddr, ProbeFailure> {
        let lookup = self
            .resolver
            .lookup_ip(host)
            .await
            .map_err(|_| ProbeFailure::DomainNotFound)?;
        lookup.iter().next().ok_or(ProbeFailure::DomainNotFound)
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, profile: &ProfileRecord) -> Result<u32, ProbeFailure> {
        let addr: IpAddr = match profile.server_address.parse() {
            Ok(ip) => ip,
            Err(_) => self.resolve(&profile.server_address).await?,
        };

        let start = Instant::now();
        match timeout(
            self.connect_timeout,
            TcpStream::connect((addr, profile.server_port)),
        )
        .await
        {
            Err(_) => Err(ProbeFailure::Timeout),
            Ok(Err(e)) => Err(ProbeFailure::from_io(&e)),
            Ok(Ok(_stream)) => {
                let elapsed = start.elapsed().as_millis();
                // Sub-millisecond connects still count as 1ms so Available
                // records are distinguishable from the unmeasured sentinel
                Ok((elapsed as u32).max(1))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProtocolKind;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    fn profile(address: &str, port: u16) -> ProfileRecord {
        ProfileRecord::new(1, 1, "probe-target", address, port, ProtocolKind::Shadowsocks)
    }

    #[tokio::test]
    async fn test_connect_to_listener_measures_latency() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();

        // Keep accepting so the connect completes
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let prober = TcpProber::new(Duration::from_secs(3));
        let latency = prober.probe(&profile("127.0.0.1", addr.port())).await.unwrap();
        assert!(latency >= 1);
        assert!(latency < 3_000);
    }

    #[tokio::test]
    async fn test_closed_port_is_connection_refused() {
        // Bind-then-drop guarantees the port is closed
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let prober = TcpProber::new(Duration::from_secs(3));
        let err = prober.probe(&profile("127.0.0.1", port)).await.unwrap_err();
        assert_eq!(err, ProbeFailure::ConnectionRefused);
    }

    #[tokio::test]
    async fn test_unroutable_address_times_out() {
        // 192.0.2.0/24 (TEST-NET-1) is reserved and unroutable; the connect
        // either times out or reports unreachable depending on the host
        let prober = TcpProber::new(Duration::from_millis(200));
        let err = prober.probe(&profile("192.0.2.1", 9)).await.unwrap_err();
        assert!(matches!(
            err,
            ProbeFailure::Timeout | ProbeFailure::NetworkUnreachable
        ));
    }
}
