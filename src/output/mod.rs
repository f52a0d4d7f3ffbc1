//! Terminal output formatting
//!
//! Incremental per-result lines while a session runs, and the final
//! snapshot table. Status coloring follows the usual convention: green for
//! available nodes with their latency, red for failures, dim for anything
//! still pending.

use crate::{
    models::{ProfileRecord, ProfileStatus},
    selection::sort_for_display,
    session::{ProgressSink, SessionState},
};
use colored::Colorize;

/// Render a profile's status cell
pub fn format_status(profile: &ProfileRecord, enable_color: bool) -> String {
    let text = match profile.status {
        ProfileStatus::Available => format!("Available ({}ms)", profile.latency_ms),
        ProfileStatus::Testing => "Testing...".to_string(),
        ProfileStatus::Untested => "Untested".to_string(),
        ProfileStatus::Unreachable | ProfileStatus::Error => profile
            .error_detail
            .clone()
            .unwrap_or_else(|| "Unavailable".to_string()),
    };

    if !enable_color {
        return text;
    }

    match profile.status {
        ProfileStatus::Available => text.green().to_string(),
        ProfileStatus::Unreachable | ProfileStatus::Error => text.red().to_string(),
        ProfileStatus::Testing | ProfileStatus::Untested => text.dimmed().to_string(),
    }
}

/// Render the final snapshot as a table, best nodes first
pub fn render_snapshot_table(snapshot: &[ProfileRecord], enable_color: bool) -> String {
    let mut rows = snapshot.to_vec();
    sort_for_display(&mut rows);

    let name_width = rows
        .iter()
        .map(|p| p.display_name.len())
        .chain(std::iter::once("Node".len()))
        .max()
        .unwrap_or(4);
    let type_width = rows
        .iter()
        .map(|p| p.protocol.name().len())
        .chain(std::iter::once("Type".len()))
        .max()
        .unwrap_or(4);

    let mut out = String::new();
    out.push_str(&format!(
        "{:<name_width$}  {:<type_width$}  {}\n",
        "Node", "Type", "Status"
    ));
    out.push_str(&format!(
        "{}  {}  {}\n",
        "-".repeat(name_width),
        "-".repeat(type_width),
        "------"
    ));

    for profile in &rows {
        out.push_str(&format!(
            "{:<name_width$}  {:<type_width$}  {}\n",
            profile.display_name,
            profile.protocol.name(),
            format_status(profile, enable_color)
        ));
    }

    out
}

/// Progress sink that streams results to the terminal
pub struct ConsoleSink {
    enable_color: bool,
}

impl ConsoleSink {
    pub fn new(enable_color: bool) -> Self {
        Self { enable_color }
    }
}

impl ProgressSink for ConsoleSink {
    fn on_result(&self, profile: &ProfileRecord, completed: usize, total: usize) {
        println!(
            "[{}/{}] {}  {}",
            completed,
            total,
            profile.display_name,
            format_status(profile, self.enable_color)
        );
    }

    fn on_progress(&self, completed: usize, total: usize) {
        println!("[{}/{}]", completed, total);
    }

    fn on_terminal(&self, state: SessionState, _snapshot: &[ProfileRecord]) {
        let label = match state {
            SessionState::Completed => "Test round complete",
            SessionState::Cancelled => "Test round cancelled",
            _ => return,
        };
        if self.enable_color {
            println!("{}", label.bold());
        } else {
            println!("{}", label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProtocolKind;

    fn available(id: i64, latency: u32) -> ProfileRecord {
        let mut p = ProfileRecord::new(id, 1, format!("node-{}", id), "h", 1, ProtocolKind::Vmess);
        p.mark_available(latency);
        p
    }

    #[test]
    fn test_status_text_variants() {
        let p = available(1, 42);
        assert_eq!(format_status(&p, false), "Available (42ms)");

        let mut failed = available(2, 0);
        failed.mark_failed(ProfileStatus::Unreachable, "Connection refused");
        assert_eq!(format_status(&failed, false), "Connection refused");
    }

    #[test]
    fn test_snapshot_table_sorted_by_latency() {
        let table = render_snapshot_table(&[available(1, 90), available(2, 15)], false);
        let first = table.find("node-1").unwrap();
        let second = table.find("node-2").unwrap();
        assert!(second < first, "lower latency should render first");
        assert!(table.contains("Available (15ms)"));
    }
}
