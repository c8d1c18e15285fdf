//! Splitting summaries into transport-sized notification payloads.
//!
//! The messaging backend limits how many lines a single attachment may hold,
//! so a long summary is cut into contiguous blocks of lines. Every payload
//! repeats the title, the color and a deep link back to the search.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::types::{NotificationPayload, TimeWindow};

/// Maximum lines per attachment accepted by the messaging backend.
pub const DEFAULT_LINES_PER_MESSAGE: usize = 26;

/// Color used for every digest attachment.
pub const DEFAULT_COLOR: &str = "#ff0000";

/// Characters escaped in deep-link values.
const LINK_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Builds [`NotificationPayload`]s for one run.
#[derive(Debug, Clone)]
pub struct NotificationFormatter {
    search_url: String,
    lines_per_message: usize,
    color: String,
}

impl NotificationFormatter {
    /// Creates a formatter linking to the given backend account's search page.
    pub fn new(account: impl AsRef<str>) -> Self {
        Self {
            search_url: format!("https://{}.loggly.com/search", account.as_ref()),
            lines_per_message: DEFAULT_LINES_PER_MESSAGE,
            color: DEFAULT_COLOR.to_string(),
        }
    }

    /// Sets the maximum lines per payload. Zero is treated as one.
    #[must_use]
    pub fn with_lines_per_message(mut self, lines: usize) -> Self {
        self.lines_per_message = lines.max(1);
        self
    }

    /// Sets the attachment color.
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Returns the maximum lines per payload.
    #[must_use]
    pub const fn lines_per_message(&self) -> usize {
        self.lines_per_message
    }

    /// Builds the deep link for a query over a window.
    #[must_use]
    pub fn deep_link(&self, query: &str, window: &TimeWindow) -> String {
        format!(
            "{}#terms={}&from={}&until={}",
            self.search_url,
            utf8_percent_encode(query, LINK_VALUE),
            utf8_percent_encode(&window.start_rfc3339(), LINK_VALUE),
            utf8_percent_encode(&window.end_rfc3339(), LINK_VALUE),
        )
    }

    /// Splits `body` into payloads.
    ///
    /// Always returns at least one payload, even for an empty body.
    #[must_use]
    pub fn format(
        &self,
        body: &str,
        query: &str,
        window: &TimeWindow,
        title: &str,
        channel: &str,
    ) -> Vec<NotificationPayload> {
        let deep_link = self.deep_link(query, window);

        chunk_lines(body, self.lines_per_message)
            .into_iter()
            .map(|text| NotificationPayload {
                title: title.to_string(),
                body: format!("```\n{text}```"),
                text,
                color: self.color.clone(),
                deep_link: deep_link.clone(),
                channel: channel.to_string(),
            })
            .collect()
    }
}

/// Number of payloads needed for `lines` lines: `round(lines / max)`, at least 1.
///
/// Halves round up.
#[must_use]
pub const fn messages_needed(lines: usize, max: usize) -> usize {
    let max = if max == 0 { 1 } else { max };
    let rounded = (2 * lines + max) / (2 * max);
    if rounded == 0 { 1 } else { rounded }
}

/// Splits `body` by line into [`messages_needed`] contiguous blocks.
///
/// Blocks hold `max` lines each; the last block takes every remaining line,
/// so joining the blocks with `\n` gives back `body`.
#[must_use]
pub fn chunk_lines(body: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let lines: Vec<&str> = body.split('\n').collect();
    let count = messages_needed(lines.len(), max);

    (0..count)
        .map(|i| {
            let start = i * max;
            let end = if i + 1 == count {
                lines.len()
            } else {
                (i + 1) * max
            };
            lines[start..end].join("\n")
        })
        .collect()
}
