//! Cheap post-hoc check that a synthesized answer does not quote figures the
//! evidence never mentioned.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroundingPolicy {
    Off,
    #[default]
    Warn,
    /// Replace an answer containing ungrounded figures with the fallback text.
    Reject,
}

impl GroundingPolicy {
    pub fn apply(self, answer: String, evidence: &str, fallback: &str) -> String {
        if self == GroundingPolicy::Off {
            return answer;
        }

        let ungrounded = ungrounded_figures(&answer, evidence);
        if ungrounded.is_empty() {
            return answer;
        }

        tracing::warn!(?ungrounded, policy = ?self, "answer cites figures absent from evidence");
        match self {
            GroundingPolicy::Reject => fallback.to_string(),
            _ => answer,
        }
    }
}

fn figure_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+(?:[.,]\d+)*%?").expect("valid figure pattern"))
}

fn normalize(figure: &str) -> String {
    figure.replace(',', "").trim_end_matches('%').to_string()
}

/// Figures in `answer` that do not occur anywhere in `evidence`.
///
/// Single-digit integers are ignored; they show up as list numbering and
/// counts over the evidence itself far more often than as quoted data.
pub fn ungrounded_figures(answer: &str, evidence: &str) -> Vec<String> {
    let known: HashSet<String> = figure_pattern()
        .find_iter(evidence)
        .map(|m| normalize(m.as_str()))
        .collect();

    let mut seen = HashSet::new();
    figure_pattern()
        .find_iter(answer)
        .map(|m| normalize(m.as_str()))
        .filter(|figure| figure.len() > 1 || figure.contains('.'))
        .filter(|figure| !known.contains(figure))
        .filter(|figure| seen.insert(figure.clone()))
        .collect()
}
