//! Probe primitives and prober selection
//!
//! A [`Prober`] performs exactly one latency/reachability measurement for
//! one profile and owns its own timeout; this subsystem never wraps an
//! additional outer timeout around it. Different proxy protocol families
//! need different probe implementations, selected by the profile's stored
//! protocol tag through the [`ProberRegistry`].

pub mod http;
pub mod mock;
pub mod tcp;

pub use http::UrlTestProber;
pub use mock::ScriptedProber;
pub use tcp::TcpProber;

use crate::{
    error::{ProbeFailure, Result},
    models::{Config, ProfileRecord, ProtocolKind},
};
use async_trait::async_trait;
use std::sync::Arc;

/// One latency measurement for one profile.
///
/// Contract: bounded execution time (the implementation owns its timeout);
/// returns measured latency in milliseconds, or exactly one classified
/// failure. Probers are shared across workers and must be safe to call
/// concurrently.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, profile: &ProfileRecord) -> std::result::Result<u32, ProbeFailure>;
}

/// How a test round measures profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMethod {
    /// Timed TCP connect against the server endpoint
    TcpPing,
    /// Timed HTTP request through the node to a well-known test URL
    UrlTest,
}

impl ProbeMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TcpPing => "tcp-ping",
            Self::UrlTest => "url-test",
        }
    }
}

/// Selects the prober implementation for a profile's protocol family.
///
/// Selection can itself fail per-profile: a family whose probe transport is
/// not available in this build reports `CapabilityUnavailable`, which the
/// worker classifies like any other probe failure.
pub struct ProberRegistry {
    method: ProbeMethod,
    dispatch: Dispatch,
}

enum Dispatch {
    /// Built-in probers, selected per protocol family
    Standard {
        tcp: Arc<TcpProber>,
        url_test: Arc<UrlTestProber>,
    },
    /// A single caller-supplied probe primitive for every profile
    Custom(Arc<dyn Prober>),
}

impl ProberRegistry {
    /// Build a registry for the given method and configuration
    pub fn new(method: ProbeMethod, config: &Config) -> Result<Self> {
        Ok(Self {
            method,
            dispatch: Dispatch::Standard {
                tcp: Arc::new(TcpProber::new(config.probe_timeout())),
                url_test: Arc::new(UrlTestProber::new(config)?),
            },
        })
    }

    /// Build a registry that dispatches every profile to a caller-supplied
    /// prober. The probe primitive is an external capability; embedders
    /// with their own measurement plumbing plug it in here.
    pub fn with_prober(method: ProbeMethod, prober: Arc<dyn Prober>) -> Self {
        Self {
            method,
            dispatch: Dispatch::Custom(prober),
        }
    }

    /// The method this registry dispatches for
    pub fn method(&self) -> ProbeMethod {
        self.method
    }

    /// Whether a profile can be enrolled in a round under this method.
    ///
    /// TCP ping only makes sense for families whose stored endpoint is a
    /// plain TCP listener; ineligible profiles are left out of the session
    /// entirely rather than enrolled and failed.
    pub fn can_enroll(&self, profile: &ProfileRecord) -> bool {
        match self.method {
            ProbeMethod::TcpPing => profile.protocol.supports_tcp_ping(),
            ProbeMethod::UrlTest => true,
        }
    }

    /// Resolve the prober for a profile.
    ///
    /// `Err` carries a per-profile `CapabilityUnavailable`, not a session
    /// fault.
    pub fn prober_for(
        &self,
        profile: &ProfileRecord,
    ) -> std::result::Result<Arc<dyn Prober>, ProbeFailure> {
        match &self.dispatch {
            Dispatch::Custom(prober) => Ok(prober.clone()),
            Dispatch::Standard { tcp, url_test } => match self.method {
                ProbeMethod::TcpPing => Ok(tcp.clone()),
                ProbeMethod::UrlTest => match &profile.protocol {
                    // reqwest speaks these proxy schemes natively
                    ProtocolKind::Http | ProtocolKind::Socks => Ok(url_test.clone()),
                    ProtocolKind::Plugin(name) => Err(ProbeFailure::CapabilityUnavailable(
                        format!("Plugin not found: {}", name),
                    )),
                    other => Err(ProbeFailure::CapabilityUnavailable(format!(
                        "URL test requires a tunnel data-plane for {}",
                        other.name()
                    ))),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProfileRecord;

    fn profile(protocol: ProtocolKind) -> ProfileRecord {
        ProfileRecord::new(1, 1, "n", "198.51.100.3", 1080, protocol)
    }

    #[test]
    fn test_tcp_ping_enrollment_filter() {
        let registry = ProberRegistry::new(ProbeMethod::TcpPing, &Config::default()).unwrap();
        assert!(registry.can_enroll(&profile(ProtocolKind::Vmess)));
        assert!(!registry.can_enroll(&profile(ProtocolKind::Plugin("naive".into()))));
    }

    #[test]
    fn test_url_test_enrolls_everything() {
        let registry = ProberRegistry::new(ProbeMethod::UrlTest, &Config::default()).unwrap();
        assert!(registry.can_enroll(&profile(ProtocolKind::Plugin("naive".into()))));
        assert!(registry.can_enroll(&profile(ProtocolKind::Trojan)));
    }

    #[test]
    fn test_url_test_capability_gaps() {
        let registry = ProberRegistry::new(ProbeMethod::UrlTest, &Config::default()).unwrap();

        assert!(registry.prober_for(&profile(ProtocolKind::Socks)).is_ok());
        assert!(registry.prober_for(&profile(ProtocolKind::Http)).is_ok());

        let err = registry
            .prober_for(&profile(ProtocolKind::Plugin("hysteria2".into())))
            .err()
            .unwrap();
        assert_eq!(
            err,
            ProbeFailure::CapabilityUnavailable("Plugin not found: hysteria2".to_string())
        );

        assert!(matches!(
            registry.prober_for(&profile(ProtocolKind::Vmess)),
            Err(ProbeFailure::CapabilityUnavailable(_))
        ));
    }

    #[test]
    fn test_tcp_ping_always_resolves() {
        let registry = ProberRegistry::new(ProbeMethod::TcpPing, &Config::default()).unwrap();
        assert!(registry.prober_for(&profile(ProtocolKind::Shadowsocks)).is_ok());
    }

    #[test]
    fn test_custom_prober_dispatches_every_family() {
        let registry =
            ProberRegistry::with_prober(ProbeMethod::UrlTest, Arc::new(ScriptedProber::new()));
        assert!(registry.prober_for(&profile(ProtocolKind::Vmess)).is_ok());
        assert!(registry
            .prober_for(&profile(ProtocolKind::Plugin("naive".into())))
            .is_ok());
    }
}
