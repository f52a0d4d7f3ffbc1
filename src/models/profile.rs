//! Profile record data model
//!
//! A `ProfileRecord` is the unit of work and result storage for latency
//! testing: one candidate proxy server, its connection attributes, and the
//! outcome of the most recent probe against it.

use serde::{Deserialize, Serialize};

/// Sentinel latency for records without a usable measurement.
///
/// Used as the sort key for anything that is not `Available` so unmeasured
/// records always order after measured ones.
pub const LATENCY_UNMEASURED: u32 = u32::MAX;

/// Probe outcome state of a single profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    /// Never probed in the current round
    Untested,
    /// Currently owned by a worker, probe in flight
    Testing,
    /// Probe succeeded, `latency_ms` is valid
    Available,
    /// Probe failed with a well-known network category
    Unreachable,
    /// Probe failed for a reason outside the known categories
    Error,
}

impl Default for ProfileStatus {
    fn default() -> Self {
        Self::Untested
    }
}

impl ProfileStatus {
    /// Rank used for display sorting: Available first, then Testing,
    /// everything else after.
    pub fn display_rank(&self) -> u8 {
        match self {
            Self::Available => 0,
            Self::Testing => 1,
            Self::Untested | Self::Unreachable | Self::Error => 2,
        }
    }

    /// Whether this status carries a failure detail
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Unreachable | Self::Error)
    }
}

/// Proxy protocol family tag stored on each profile.
///
/// The tag selects which prober implementation can measure the profile;
/// plugin-backed families additionally require the named plugin capability
/// to be present at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolKind {
    Shadowsocks,
    Vmess,
    Trojan,
    Socks,
    Http,
    /// Protocol family implemented by an external plugin
    Plugin(String),
}

impl ProtocolKind {
    /// Human-readable protocol name for display
    pub fn name(&self) -> String {
        match self {
            Self::Shadowsocks => "Shadowsocks".to_string(),
            Self::Vmess => "VMess".to_string(),
            Self::Trojan => "Trojan".to_string(),
            Self::Socks => "SOCKS".to_string(),
            Self::Http => "HTTP".to_string(),
            Self::Plugin(name) => format!("Plugin ({})", name),
        }
    }

    /// Whether a plain TCP connect against the server endpoint is a
    /// meaningful reachability signal for this family.
    ///
    /// Plugin transports may front the server with something that is not a
    /// TCP listener at the stored address, so they are excluded.
    pub fn supports_tcp_ping(&self) -> bool {
        !matches!(self, Self::Plugin(_))
    }
}

/// A single candidate proxy server profile.
///
/// Identity and connection attributes are owned by the datastore and
/// read-only here; `status`, `latency_ms` and `error_detail` are written by
/// the worker that owns the record during a test round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Stable unique identifier, assigned by the datastore
    pub id: i64,
    /// Owning profile group
    pub group_id: i64,
    /// Display name
    pub display_name: String,
    /// Server hostname or IP address
    pub server_address: String,
    /// Server port
    pub server_port: u16,
    /// Protocol family tag, selects the prober
    pub protocol: ProtocolKind,
    /// Externally managed manual ordering, never mutated by this subsystem
    #[serde(default)]
    pub user_order: u32,
    /// Probe outcome state
    #[serde(default)]
    pub status: ProfileStatus,
    /// Measured latency in milliseconds; valid only when Available
    #[serde(default = "unmeasured")]
    pub latency_ms: u32,
    /// Failure detail, set when status is Unreachable or Error
    #[serde(default)]
    pub error_detail: Option<String>,
}

fn unmeasured() -> u32 {
    LATENCY_UNMEASURED
}

impl ProfileRecord {
    /// Create a new untested record
    pub fn new(
        id: i64,
        group_id: i64,
        display_name: impl Into<String>,
        server_address: impl Into<String>,
        server_port: u16,
        protocol: ProtocolKind,
    ) -> Self {
        Self {
            id,
            group_id,
            display_name: display_name.into(),
            server_address: server_address.into(),
            server_port,
            protocol,
            user_order: 0,
            status: ProfileStatus::Untested,
            latency_ms: LATENCY_UNMEASURED,
            error_detail: None,
        }
    }

    /// Latency key used for sorting: the measured value for Available
    /// records, the sentinel for everything else.
    pub fn sort_latency(&self) -> u32 {
        if self.status == ProfileStatus::Available {
            self.latency_ms
        } else {
            LATENCY_UNMEASURED
        }
    }

    /// Reset probe state for a new test round
    pub fn reset_for_round(&mut self) {
        self.status = ProfileStatus::Untested;
        self.latency_ms = LATENCY_UNMEASURED;
        self.error_detail = None;
    }

    /// Record a successful probe
    pub fn mark_available(&mut self, latency_ms: u32) {
        self.status = ProfileStatus::Available;
        self.latency_ms = latency_ms;
        self.error_detail = None;
    }

    /// Record a classified failure
    pub fn mark_failed(&mut self, status: ProfileStatus, detail: impl Into<String>) {
        debug_assert!(status.is_failure());
        self.status = status;
        self.latency_ms = LATENCY_UNMEASURED;
        self.error_detail = Some(detail.into());
    }

    /// Server endpoint as `host:port`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.server_address, self.server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64) -> ProfileRecord {
        ProfileRecord::new(id, 1, format!("node-{}", id), "203.0.113.1", 443, ProtocolKind::Trojan)
    }

    #[test]
    fn test_new_record_is_untested() {
        let p = record(7);
        assert_eq!(p.status, ProfileStatus::Untested);
        assert_eq!(p.latency_ms, LATENCY_UNMEASURED);
        assert!(p.error_detail.is_none());
    }

    #[test]
    fn test_sort_latency_uses_sentinel_for_non_available() {
        let mut p = record(1);
        p.mark_available(42);
        assert_eq!(p.sort_latency(), 42);

        p.mark_failed(ProfileStatus::Unreachable, "timed out");
        assert_eq!(p.sort_latency(), LATENCY_UNMEASURED);
        assert_eq!(p.error_detail.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_reset_for_round_clears_probe_state() {
        let mut p = record(1);
        p.mark_available(12);
        p.reset_for_round();
        assert_eq!(p.status, ProfileStatus::Untested);
        assert_eq!(p.latency_ms, LATENCY_UNMEASURED);
        assert!(p.error_detail.is_none());
    }

    #[test]
    fn test_display_rank_ordering() {
        assert!(ProfileStatus::Available.display_rank() < ProfileStatus::Testing.display_rank());
        assert!(ProfileStatus::Testing.display_rank() < ProfileStatus::Unreachable.display_rank());
        assert_eq!(
            ProfileStatus::Unreachable.display_rank(),
            ProfileStatus::Error.display_rank()
        );
    }

    #[test]
    fn test_plugin_protocol_excluded_from_tcp_ping() {
        assert!(ProtocolKind::Vmess.supports_tcp_ping());
        assert!(!ProtocolKind::Plugin("naive".to_string()).supports_tcp_ping());
    }

    #[test]
    fn test_serde_round_trip_with_defaults() {
        let json = r#"{
            "id": 3,
            "group_id": 1,
            "display_name": "hk-01",
            "server_address": "hk.example.com",
            "server_port": 8388,
            "protocol": "shadowsocks"
        }"#;
        let p: ProfileRecord = serde_json::from_str(json).unwrap();
        assert_eq!(p.status, ProfileStatus::Untested);
        assert_eq!(p.latency_ms, LATENCY_UNMEASURED);
        assert_eq!(p.protocol, ProtocolKind::Shadowsocks);
    }
}
