//! Output formatting utilities for the CLI.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use crate::domain::models::JudgmentCache;
use crate::services::{CheckReport, HealthReport, SummaryReport, SyncReport};

/// A command result that renders as a table or as JSON.
pub trait CommandOutput: Serialize {
    /// Human-readable rendering.
    fn to_human(&self) -> String;

    /// JSON rendering; the serde form by default.
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Print `result` in the selected format.
pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to a maximum number of characters, appending "..." if truncated.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header(names: &[&str]) -> Vec<Cell> {
    names
        .iter()
        .map(|name| Cell::new(name).add_attribute(Attribute::Bold))
        .collect()
}

/// Cached judgments as a table.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct JudgmentList(pub Vec<JudgmentCache>);

impl CommandOutput for JudgmentList {
    fn to_human(&self) -> String {
        if self.0.is_empty() {
            return "No cached judgments.".to_string();
        }
        let mut table = base_table();
        table.set_header(header(&["Channel", "Scope", "Respond", "Confidence", "Next check", "Reason"]));
        for row in &self.0 {
            let respond = if row.should_respond {
                Cell::new("yes").fg(Color::Green)
            } else {
                Cell::new("no").fg(Color::DarkGrey)
            };
            table.add_row(vec![
                Cell::new(&row.channel_id),
                Cell::new(row.scope().key()),
                respond,
                Cell::new(format!("{:.2}", row.confidence)),
                Cell::new(row.next_check_at.format("%Y-%m-%d %H:%M:%S").to_string()),
                Cell::new(truncate(&row.reason, 60)),
            ]);
        }
        format!("{table}\n\nShowing {} judgment(s)", self.0.len())
    }
}

/// Result of `cache purge`.
#[derive(Debug, Serialize)]
pub struct PurgeResult {
    /// Rows removed.
    pub deleted: u64,
}

impl CommandOutput for PurgeResult {
    fn to_human(&self) -> String {
        format!("Deleted {} expired judgment(s)", self.deleted)
    }
}

impl CommandOutput for CheckReport {
    fn to_human(&self) -> String {
        let mut table = base_table();
        table.set_header(header(&["Scopes", "Cache hits", "Judgments", "Responses", "Failures", "Swept"]));
        table.add_row(vec![
            self.scopes_checked.to_string(),
            self.cache_hits.to_string(),
            self.judgments.to_string(),
            self.responses.to_string(),
            self.failures.to_string(),
            self.expired_swept.to_string(),
        ]);
        table.to_string()
    }
}

impl CommandOutput for SummaryReport {
    fn to_human(&self) -> String {
        format!(
            "Checked {} channel(s), wrote {} summar{}, {} failure(s)",
            self.channels_checked,
            self.summaries_written,
            if self.summaries_written == 1 { "y" } else { "ies" },
            self.failures
        )
    }
}

impl CommandOutput for SyncReport {
    fn to_human(&self) -> String {
        format!(
            "Synced {} channel(s), deactivated {}",
            self.channels_seen, self.deactivated
        )
    }
}

impl CommandOutput for HealthReport {
    fn to_human(&self) -> String {
        let mut table = base_table();
        table.set_header(header(&["Loop", "Running"]));
        for (name, running) in [
            ("event loop", self.event_loop_running),
            ("event scheduler", self.scheduler_running),
            ("periodic checker", self.checker_running),
            ("memory generator", self.memory_generator_running),
        ] {
            table.add_row(vec![name.to_string(), running.to_string()]);
        }
        format!("{table}\nqueue depth: {}", self.queue_depth)
    }
}
