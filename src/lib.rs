//! Proxy Node Selector
//!
//! Client-side node selection for multi-server proxy applications:
//! concurrently measure reachability and latency for a pool of candidate
//! server profiles, classify the outcomes, and derive the best profile to
//! route through, automatically or under user override.

pub mod app;
pub mod cli;
pub mod config;
pub mod continuous;
pub mod error;
pub mod logging;
pub mod models;
pub mod output;
pub mod probe;
pub mod selection;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use error::{AppError, ProbeFailure, Result};
pub use models::{Config, ProfileRecord, ProfileStatus, ProtocolKind, LATENCY_UNMEASURED};
pub use probe::{ProbeMethod, Prober, ProberRegistry, ScriptedProber};
pub use selection::{sort_for_display, SelectionController, SelectionMode, SelectionPolicy};
pub use session::{
    CountingSink, GroupGuards, NullSink, ProgressSink, SessionControl, SessionCoordinator,
    SessionHandle, SessionState, TestQueue,
};
pub use store::{GroupChange, GroupOrdering, MemoryStore, ProfileStore};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// Concurrent test workers per session
    pub const DEFAULT_CONCURRENCY: usize = 5;
    /// Per-probe timeout (owned by the prober)
    pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(3_000);
    /// URL fetched by url-test probing
    pub const DEFAULT_TEST_URL: &str = "http://cp.cloudflare.com/generate_204";
    /// Delay between continuous background rounds
    pub const DEFAULT_TEST_INTERVAL: Duration = Duration::from_secs(30);
    pub const DEFAULT_ENABLE_COLOR: bool = true;
}
