//! Grouping and counting of fetched events.
//!
//! A [`Summary`] holds one [`SummaryEntry`] per distinct key, sorted by key,
//! and the total number of events seen. Sorting makes the rendered table
//! stable between runs so identical windows produce identical messages.

use std::collections::BTreeMap;

use comfy_table::{Cell, CellAlignment, Table, presets};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{EnvGroup, LogEvent, SummaryEntry};

/// Tag suffix marking the environment an event came from.
pub const ENVIRONMENT_TAG_SUFFIX: &str = "-syslog";

/// Returns the environment named by the first `-syslog` tag, or `""`.
///
/// `production-syslog` yields `production`. Events without such a tag all
/// share the empty environment.
#[must_use]
pub fn environment_from_tags(tags: &[String]) -> &str {
    tags.iter()
        .find_map(|tag| tag.strip_suffix(ENVIRONMENT_TAG_SUFFIX))
        .unwrap_or("")
}

/// Grouped counts of a set of events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// One entry per distinct key, in lexicographic key order.
    pub entries: Vec<SummaryEntry>,
    /// Number of events summarized.
    pub total: usize,
}

impl Summary {
    /// Renders the entries as a borderless two-column table.
    #[must_use]
    pub fn render(&self) -> String {
        render_table(&self.entries)
    }

    /// Returns true if no events were summarized.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Counts events by message.
#[must_use]
pub fn summarize(events: &[LogEvent]) -> Summary {
    Summary {
        entries: count_keys(events.iter().map(|e| e.message.clone())),
        total: events.len(),
    }
}

/// Counts events by `environment.message`.
#[must_use]
pub fn summarize_keyed_by_environment(events: &[LogEvent]) -> Summary {
    let keys = events
        .iter()
        .map(|e| format!("{}.{}", e.environment(), e.message));

    Summary {
        entries: count_keys(keys),
        total: events.len(),
    }
}

/// Splits events by environment and summarizes each environment separately.
///
/// Groups are ordered by environment name. The returned total is the number
/// of events fetched, across all groups.
#[must_use]
pub fn summarize_by_environment(events: &[LogEvent]) -> (Vec<EnvGroup>, usize) {
    let mut by_env: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for event in events {
        by_env
            .entry(event.environment())
            .or_default()
            .push(event.message.clone());
    }

    let groups = by_env
        .into_iter()
        .map(|(environment, messages)| {
            let total = messages.len();
            let entries = count_keys(messages.into_iter());
            EnvGroup {
                environment: environment.to_string(),
                rendered_table: render_table(&entries),
                total,
            }
        })
        .collect();

    (groups, events.len())
}

fn count_keys(keys: impl Iterator<Item = String>) -> Vec<SummaryEntry> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();

    for key in keys {
        let count = counts.entry(key).or_insert(0);
        *count += 1;
    }

    if let Some(empty) = counts.get("").filter(|c| **c > 1) {
        // Producers that log without a message show up here.
        debug!(count = *empty, "events with empty message");
    }

    counts
        .into_iter()
        .map(|(key, count)| SummaryEntry { key, count })
        .collect()
}

/// Renders entries as `key count` rows with aligned columns.
///
/// Keys are left-aligned, counts right-aligned, rows joined by `\n` with no
/// trailing newline. Line breaks inside keys are flattened to spaces so each
/// entry stays on one row.
#[must_use]
pub fn render_table(entries: &[SummaryEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.load_preset(presets::NOTHING);
    for entry in entries {
        table.add_row(vec![
            Cell::new(entry.key.replace(['\r', '\n'], " ")),
            Cell::new(entry.count).set_alignment(CellAlignment::Right),
        ]);
    }

    // One space between the columns, none at the edges.
    if let Some(keys) = table.column_mut(0) {
        keys.set_padding((0, 1));
    }
    if let Some(counts) = table.column_mut(1) {
        counts.set_padding((0, 0));
    }

    table
        .lines()
        .map(|line| line.trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
