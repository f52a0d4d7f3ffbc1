//! Command-line interface

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Probe method selection on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    /// Timed TCP connect against each node's endpoint
    Tcp,
    /// Timed HTTP request through each node to the test URL
    Url,
}

impl std::fmt::Display for MethodArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Url => write!(f, "url"),
        }
    }
}

/// Concurrent latency testing and best-node selection for proxy profiles
#[derive(Parser, Debug, Clone)]
#[command(name = "pns")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Profile list JSON file (array of profile records)
    #[arg(short, long)]
    pub profiles: PathBuf,

    /// Profile group to test
    #[arg(short, long, default_value_t = 1)]
    pub group: i64,

    /// Concurrent test workers
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Per-probe timeout in milliseconds
    #[arg(short = 't', long)]
    pub timeout_ms: Option<u64>,

    /// Probe method
    #[arg(short, long, value_enum, default_value_t = MethodArg::Tcp)]
    pub method: MethodArg,

    /// URL fetched by the url-test method
    #[arg(long)]
    pub test_url: Option<String>,

    /// Pin selection to this profile id (disables auto selection)
    #[arg(long)]
    pub select: Option<i64>,

    /// Keep re-testing on an interval until interrupted
    #[arg(short, long)]
    pub watch: bool,

    /// Seconds between rounds in watch mode
    #[arg(long)]
    pub interval: Option<u64>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output (structured JSON logs)
    #[arg(long)]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_invocation() {
        let cli = Cli::parse_from(["pns", "--profiles", "nodes.json"]);
        assert_eq!(cli.profiles, PathBuf::from("nodes.json"));
        assert_eq!(cli.group, 1);
        assert_eq!(cli.method, MethodArg::Tcp);
        assert!(!cli.watch);
        assert!(cli.concurrency.is_none());
    }

    #[test]
    fn test_full_invocation() {
        let cli = Cli::parse_from([
            "pns",
            "--profiles",
            "nodes.json",
            "--group",
            "3",
            "--concurrency",
            "8",
            "--timeout-ms",
            "1500",
            "--method",
            "url",
            "--watch",
            "--interval",
            "10",
            "--no-color",
        ]);
        assert_eq!(cli.group, 3);
        assert_eq!(cli.concurrency, Some(8));
        assert_eq!(cli.timeout_ms, Some(1500));
        assert_eq!(cli.method, MethodArg::Url);
        assert!(cli.watch);
        assert_eq!(cli.interval, Some(10));
        assert!(cli.no_color);
    }

    #[test]
    fn test_profiles_is_required() {
        assert!(Cli::try_parse_from(["pns"]).is_err());
    }
}
