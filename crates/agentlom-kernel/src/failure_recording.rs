//! Failure recording and Tanha (craving) loop detection.

use std::collections::HashMap;
use std::sync::OnceLock;

use agentlom_core::memory_model::{FailureEntry, KarmaEntry, KarmaType, Severity};
use regex::Regex;

static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

fn whitespace_regex() -> &'static Regex {
    WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("static regex is valid"))
}

/// Collapses runs of whitespace in a raw tool error so proverbs stay on one
/// line regardless of how the tool formatted its message.
fn normalize_error(error: &str) -> String {
    whitespace_regex().replace_all(error.trim(), " ").into_owned()
}

/// Composes the proverb/condition pair for a failed tool call.
pub fn compose_failure(tool_name: &str, error: &str, reasoning: &str) -> (String, String) {
    let proverb = format!(
        "Avoid using `{tool_name}` with these parameters when `{}`",
        normalize_error(error)
    );
    let condition = reasoning.to_string();
    (proverb, condition)
}

pub fn build_failure_entry(id: String, proverb: String, condition: String, source: String) -> FailureEntry {
    FailureEntry {
        id,
        proverb,
        condition,
        severity: Severity::Medium,
        source,
        embedding: None,
    }
}

/// `occurrences` is the count *after* this failure (i.e. including it).
/// Severity escalates to HIGH after three repeats; transfer weight follows
/// `min(1.0, 0.3 + 0.1 * occurrences)`.
pub fn build_karma_entry(
    failure: FailureEntry,
    occurrences: u32,
    causal_chain: Vec<String>,
) -> KarmaEntry {
    let severity = if occurrences >= 3 { Severity::High } else { failure.severity };
    let transfer_weight = (0.3 + 0.1 * occurrences as f64).min(1.0);
    let mut entry = KarmaEntry::from_failure(
        FailureEntry { severity, ..failure },
        causal_chain,
        transfer_weight,
        KarmaType::Unskillful,
    );
    entry.occurrences = occurrences;
    entry
}

/// Per-run Tanha loop detector, keyed on `"tool:error"`.
#[derive(Default)]
pub struct TanhaDetector {
    counters: HashMap<String, u32>,
    threshold: u32,
    detected: bool,
}

pub struct TanhaOutcome {
    pub pattern: String,
    pub count: u32,
    pub newly_detected: bool,
}

impl TanhaDetector {
    pub fn new(threshold: usize) -> Self {
        Self {
            counters: HashMap::new(),
            threshold: threshold as u32,
            detected: false,
        }
    }

    pub fn is_detected(&self) -> bool {
        self.detected
    }

    /// Records a `tool:error` occurrence and reports whether the threshold
    /// was just crossed. Once set, `detected` stays sticky for the run —
    /// clearing it is out of scope, so it is never unset.
    pub fn record(&mut self, tool_name: &str, error: &str) -> TanhaOutcome {
        let key = format!("{tool_name}:{error}");
        let count = self.counters.entry(key.clone()).or_insert(0);
        *count += 1;
        let count = *count;
        let newly_detected = !self.detected && count >= self.threshold;
        if newly_detected {
            self.detected = true;
        }
        TanhaOutcome { pattern: key, count, newly_detected }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_proverb_per_literal_template() {
        let (proverb, _) = compose_failure("failing_tool", "connection_refused", "network unreachable");
        assert_eq!(
            proverb,
            "Avoid using `failing_tool` with these parameters when `connection_refused`"
        );
    }

    #[test]
    fn karma_severity_escalates_to_high_after_three_repeats() {
        let failure = build_failure_entry("f1".into(), "p".into(), "c".into(), "s".into());
        let entry = build_karma_entry(failure, 3, vec![]);
        assert_eq!(entry.severity, Severity::High);
    }

    #[test]
    fn karma_transfer_weight_follows_formula() {
        let failure = build_failure_entry("f1".into(), "p".into(), "c".into(), "s".into());
        let entry = build_karma_entry(failure.clone(), 1, vec![]);
        assert!((entry.transfer_weight - 0.4).abs() < 1e-9);
        let entry = build_karma_entry(failure, 10, vec![]);
        assert_eq!(entry.transfer_weight, 1.0);
    }

    #[test]
    fn tanha_loop_fires_at_threshold_three() {
        let mut detector = TanhaDetector::new(3);
        detector.record("failing_tool", "connection_refused");
        detector.record("failing_tool", "connection_refused");
        let outcome = detector.record("failing_tool", "connection_refused");
        assert!(outcome.newly_detected);
        assert_eq!(outcome.count, 3);
        assert_eq!(outcome.pattern, "failing_tool:connection_refused");
        assert!(detector.is_detected());
    }

    #[test]
    fn tanha_flag_is_sticky_after_detection() {
        let mut detector = TanhaDetector::new(3);
        for _ in 0..3 {
            detector.record("failing_tool", "connection_refused");
        }
        detector.record("other_tool", "timeout");
        assert!(detector.is_detected());
    }
}
