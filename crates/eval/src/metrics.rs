//! Scoring rules and per-condition aggregation.
//!
//! A turn is scored against the dataset's executed answer for its index.
//! Correctness is tolerance-based; hallucination and scale errors are
//! diagnostic flags; a turn whose review flagged the original expression
//! counts as a recovery attempt, and as a successful recovery when it ended
//! up correct.

use finqa_core::TurnResult;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Differences below this are always equal.
pub const ABSOLUTE_TOLERANCE: f64 = 0.05;

/// Relative tolerance for the direct and ×100 comparisons.
pub const RELATIVE_TOLERANCE: f64 = 0.02;

/// Names an expression may contain without counting as hallucinated.
pub const ALLOWED_TERMS: [&str; 6] = ["ans", "abs", "round", "min", "max", "sum"];

static WORD: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new("[a-zA-Z]+").ok());

// ── Scoring rules ─────────────────────────────────────────────────────────

/// Whether `actual` matches `expected` within the study's tolerance.
///
/// True when the absolute difference is under [`ABSOLUTE_TOLERANCE`], when
/// the two are relatively close, or when one of them scaled by 100 is
/// relatively close to the other (a percentage reported as a ratio or the
/// other way around).
pub fn is_nearly_equal(actual: f64, expected: f64) -> bool {
    if (actual - expected).abs() < ABSOLUTE_TOLERANCE {
        return true;
    }
    is_close(actual, expected)
        || is_close(actual * 100.0, expected)
        || is_close(actual, expected * 100.0)
}

fn is_close(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    (a - b).abs() <= RELATIVE_TOLERANCE * a.abs().max(b.abs())
}

/// Whether the expression names something other than `ans_N` variables and
/// the safe functions, e.g. `revenue_2009 - costs`.
pub fn detect_symbolic_hallucination(expression: &str) -> bool {
    WORD.as_ref().is_some_and(|re| {
        re.find_iter(expression).any(|word| {
            let word = word.as_str().to_ascii_lowercase();
            !ALLOWED_TERMS.contains(&word.as_str())
        })
    })
}

/// Whether `actual` is off from `expected` by a unit-sized factor.
///
/// Flagged when the ratio is below 0.5 or at least 1.5. An expected value
/// of zero is never a scale error.
pub fn is_scale_error(actual: f64, expected: f64) -> bool {
    if expected == 0.0 {
        return false;
    }
    let ratio = (actual / expected).abs();
    ratio < 0.5 || ratio >= 1.5
}

// ── Per-turn scores ───────────────────────────────────────────────────────

/// The scored view of one turn, as written to the result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnScore {
    pub record_id: String,
    pub turn_index: usize,
    pub expression: String,
    pub agent_output: f64,
    /// `None` when the dataset answer is not numeric.
    pub ground_truth: Option<f64>,
    pub is_correct: bool,
    pub is_hallucinated: bool,
    pub is_scale_error: bool,
    /// The review stage rejected the original expression.
    pub review_flagged: bool,
    /// Flagged by review and correct in the end.
    pub was_recovered: bool,
}

impl TurnScore {
    pub fn score(record_id: &str, turn: &TurnResult, expected: Option<f64>) -> Self {
        let actual = turn.raw_output;
        let is_correct = expected.is_some_and(|e| is_nearly_equal(actual, e));
        let is_scale_error = !is_correct && expected.is_some_and(|e| is_scale_error(actual, e));
        let review_flagged = turn.review_flagged();

        Self {
            record_id: record_id.to_string(),
            turn_index: turn.turn_index,
            expression: turn.final_expression.clone(),
            agent_output: actual,
            ground_truth: expected,
            is_correct,
            is_hallucinated: detect_symbolic_hallucination(&turn.final_expression),
            is_scale_error,
            review_flagged,
            was_recovered: review_flagged && is_correct,
        }
    }
}

// ── Aggregation ───────────────────────────────────────────────────────────

/// Correct/total counts for one turn index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnStats {
    pub correct: u64,
    pub total: u64,
}

impl TurnStats {
    /// Accuracy in percent; 0 when empty.
    pub fn accuracy(&self) -> f64 {
        percent(self.correct, self.total)
    }
}

/// Aggregate counts for one condition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionMetrics {
    pub total_turns: u64,
    pub correct: u64,
    pub hallucinations: u64,
    pub scale_errors: u64,
    pub recovery_attempts: u64,
    pub successful_recoveries: u64,
    /// Breakdown by turn index.
    #[serde(skip)]
    pub per_turn: BTreeMap<usize, TurnStats>,
}

impl ConditionMetrics {
    pub fn record(&mut self, score: &TurnScore) {
        self.total_turns += 1;
        if score.is_correct {
            self.correct += 1;
        }
        if score.is_hallucinated {
            self.hallucinations += 1;
        }
        if score.is_scale_error {
            self.scale_errors += 1;
        }
        if score.review_flagged {
            self.recovery_attempts += 1;
            if score.is_correct {
                self.successful_recoveries += 1;
            }
        }

        let stats = self.per_turn.entry(score.turn_index).or_default();
        stats.total += 1;
        if score.is_correct {
            stats.correct += 1;
        }
    }

    /// Accuracy in percent; 0 when no turns were scored.
    pub fn accuracy(&self) -> f64 {
        percent(self.correct, self.total_turns)
    }

    /// Successful recoveries over attempts, in percent; 0 with no attempts.
    pub fn recovery_rate(&self) -> f64 {
        percent(self.successful_recoveries, self.recovery_attempts)
    }
}

impl<'a> FromIterator<&'a TurnScore> for ConditionMetrics {
    fn from_iter<I: IntoIterator<Item = &'a TurnScore>>(iter: I) -> Self {
        let mut metrics = Self::default();
        for score in iter {
            metrics.record(score);
        }
        metrics
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
