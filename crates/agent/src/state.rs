//! Per-record conversation state.
//!
//! Owned by exactly one record's processing. Turns are appended in order
//! and never edited; the variable namespace and transcript are derived
//! views rebuilt on every call.

use finqa_core::{FinancialContext, StudyCondition, TurnResult};
use finqa_tools::Variables;

/// Transcript text before the first turn completes.
pub const NO_HISTORY: &str = "No previous interaction history.";

/// Separator between transcript blocks.
const TURN_SEPARATOR: &str = "\n---\n";

#[derive(Debug, Clone)]
pub struct ConversationState {
    context: FinancialContext,
    condition: StudyCondition,
    history: Vec<TurnResult>,
    trace_id: Option<String>,
}

impl ConversationState {
    pub fn new(context: FinancialContext, condition: StudyCondition) -> Self {
        Self {
            context,
            condition,
            history: Vec::new(),
            trace_id: None,
        }
    }

    /// Attach the telemetry trace the record's gateway calls are recorded in.
    pub fn with_trace(mut self, trace_id: Option<String>) -> Self {
        self.trace_id = trace_id;
        self
    }

    pub fn context(&self) -> &FinancialContext {
        &self.context
    }

    pub fn condition(&self) -> StudyCondition {
        self.condition
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Completed turns, in order.
    pub fn history(&self) -> &[TurnResult] {
        &self.history
    }

    /// Index the next turn will get.
    pub fn next_turn_index(&self) -> usize {
        self.history.len()
    }

    /// Append a completed turn.
    pub fn register(&mut self, turn: TurnResult) {
        self.history.push(turn);
    }

    /// `ans_0 .. ans_(n-1)` mapped to each completed turn's numeric output.
    pub fn variable_namespace(&self) -> Variables {
        self.history
            .iter()
            .enumerate()
            .map(|(i, turn)| (format!("ans_{i}"), turn.raw_output))
            .collect()
    }

    /// Prior questions and answers, as shown to the model.
    pub fn transcript(&self) -> String {
        if self.history.is_empty() {
            return NO_HISTORY.to_string();
        }
        self.history
            .iter()
            .map(|turn| {
                format!(
                    "Question: {}\nAnswer: {} (Numeric: {:?})",
                    turn.question, turn.response, turn.raw_output
                )
            })
            .collect::<Vec<_>>()
            .join(TURN_SEPARATOR)
    }

    pub fn into_history(self) -> Vec<TurnResult> {
        self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finqa_core::AnalyticStep;
    use serde_json::json;

    fn state() -> ConversationState {
        let context = FinancialContext {
            record_id: "rec-1".into(),
            pre_text: String::new(),
            post_text: String::new(),
            text_table: String::new(),
            raw_table: json!({}),
        };
        ConversationState::new(context, StudyCondition::ModularMini)
    }

    fn turn(index: usize, question: &str, raw: f64, response: &str) -> TurnResult {
        TurnResult {
            turn_index: index,
            question: question.into(),
            plan: None,
            analyst_output: AnalyticStep::sentinel(),
            review: None,
            corrected: false,
            final_expression: raw.to_string(),
            raw_output: raw,
            response: response.into(),
        }
    }

    #[test]
    fn empty_state() {
        let state = state();
        assert_eq!(state.transcript(), NO_HISTORY);
        assert!(state.variable_namespace().is_empty());
        assert_eq!(state.next_turn_index(), 0);
        assert!(state.trace_id().is_none());
    }

    #[test]
    fn namespace_tracks_completed_turns() {
        let mut state = state();
        state.register(turn(0, "q0", 103102.0, "103,102"));
        state.register(turn(1, "q1", -1579.0, "-1,579"));

        let vars = state.variable_namespace();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars["ans_0"], 103102.0);
        assert_eq!(vars["ans_1"], -1579.0);
        assert!(!vars.contains_key("ans_2"));
        assert_eq!(state.next_turn_index(), 2);
    }

    #[test]
    fn transcript_blocks() {
        let mut state = state();
        state.register(turn(0, "what was revenue?", 1200.0, "1,200"));
        state.register(turn(1, "and the change?", 0.25, "25.0%"));

        assert_eq!(
            state.transcript(),
            "Question: what was revenue?\nAnswer: 1,200 (Numeric: 1200.0)\n---\n\
             Question: and the change?\nAnswer: 25.0% (Numeric: 0.25)"
        );
    }

    #[test]
    fn history_is_ordered() {
        let mut state = state();
        for i in 0..3 {
            state.register(turn(i, &format!("q{i}"), i as f64, ""));
        }
        let indices: Vec<usize> = state.history().iter().map(|t| t.turn_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(state.into_history().len(), 3);
    }
}
