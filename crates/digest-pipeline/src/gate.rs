//! Threshold gate deciding whether a summary is worth a notification.

/// Body sent when a search notifies with zero events.
pub const NO_RESULTS: &str = "No results";

/// Returns true when `total` reaches `threshold`.
///
/// A threshold of zero always notifies, including for an empty window.
#[must_use]
pub const fn should_notify(total: usize, threshold: usize) -> bool {
    total >= threshold
}

/// Returns the body to send, substituting [`NO_RESULTS`] for an empty window.
#[must_use]
pub fn notification_body(rendered: String, total: usize) -> String {
    if total == 0 {
        NO_RESULTS.to_string()
    } else {
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case(3, 2, true ; "above threshold")]
    #[test_case(2, 2, true ; "at threshold")]
    #[test_case(1, 2, false ; "below threshold")]
    #[test_case(0, 0, true ; "zero threshold with no events")]
    #[test_case(0, 1, false ; "no events")]
    fn gate_decision(total: usize, threshold: usize, expected: bool) {
        assert_eq!(should_notify(total, threshold), expected);
    }

    #[test]
    fn empty_window_gets_placeholder() {
        assert_eq!(notification_body(String::new(), 0), "No results");
    }

    #[test]
    fn rendered_body_kept() {
        assert_eq!(notification_body("a 2\nb 1".to_string(), 3), "a 2\nb 1");
    }

    proptest! {
        #[test]
        fn notify_iff_total_reaches_threshold(total in 0usize..10_000, threshold in 0usize..10_000) {
            prop_assert_eq!(should_notify(total, threshold), total >= threshold);
        }
    }
}
