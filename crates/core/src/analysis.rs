//! Artifacts that flow through the turn pipeline.
//!
//! Everything here is immutable once produced. A correction does not edit an
//! [`AnalyticStep`]; it produces a new one that replaces the turn's reference.

use crate::schema::{StructuredOutput, strict_object};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A normalized record, ready to be rendered into payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialContext {
    pub record_id: String,
    pub pre_text: String,
    pub post_text: String,
    /// Markdown-style rendering of `raw_table`.
    pub text_table: String,
    /// The source table as it appeared in the record.
    pub raw_table: serde_json::Value,
}

/// One numeric input a plan depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Variable name, e.g. `rev_2004`.
    pub label: String,
    /// `table`, `text`, or `history`.
    pub source: String,
    /// Row/column key or `ans_N` index.
    pub coordinate: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPlan {
    pub intent: String,
    #[serde(default)]
    pub data_points: Vec<DataPoint>,
    #[serde(default)]
    pub execution_steps: Vec<String>,
    #[serde(default)]
    pub is_percentage_required: bool,
}

impl AnalysisPlan {
    /// Placeholder used when the planning call yields nothing.
    pub fn sentinel() -> Self {
        Self {
            intent: "Error".into(),
            data_points: Vec::new(),
            execution_steps: Vec::new(),
            is_percentage_required: false,
        }
    }
}

impl StructuredOutput for AnalysisPlan {
    const NAME: &'static str = "analysis_plan";

    fn json_schema() -> serde_json::Value {
        strict_object(json!({
            "intent": {"type": "string", "description": "Summary of the user's information need"},
            "data_points": {
                "type": "array",
                "description": "Required numeric inputs",
                "items": strict_object(json!({
                    "label": {"type": "string", "description": "Variable name, e.g. rev_2004"},
                    "source": {"type": "string", "description": "'table', 'text' or 'history'"},
                    "coordinate": {"type": "string", "description": "Row/column key or ans_N index"},
                    "value": {"type": "number"}
                }))
            },
            "execution_steps": {
                "type": "array",
                "description": "Logical sequence of operations",
                "items": {"type": "string"}
            },
            "is_percentage_required": {"type": "boolean"}
        }))
    }
}

/// A candidate arithmetic expression answering the current question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticStep {
    #[serde(default)]
    pub thought: Option<String>,
    #[serde(default)]
    pub mapping_verification: Option<String>,
    #[serde(alias = "python_expression")]
    pub expression: String,
    #[serde(default)]
    pub is_percentage: bool,
    #[serde(default)]
    pub unit_context: Option<String>,
}

impl AnalyticStep {
    /// Placeholder used when the generation call yields nothing.
    pub fn sentinel() -> Self {
        Self {
            thought: Some("API Failure".into()),
            mapping_verification: None,
            expression: "0".into(),
            is_percentage: false,
            unit_context: None,
        }
    }
}

impl StructuredOutput for AnalyticStep {
    const NAME: &'static str = "analytic_step";

    fn json_schema() -> serde_json::Value {
        strict_object(json!({
            "thought": {"type": ["string", "null"], "description": "Reasoning trace"},
            "mapping_verification": {"type": ["string", "null"], "description": "Plan-to-expression alignment check"},
            "expression": {
                "type": "string",
                "description": "Single-line arithmetic expression using numeric literals, ans_N variables, + - * / and abs/round/min/max/sum"
            },
            "is_percentage": {"type": "boolean"},
            "unit_context": {"type": ["string", "null"]}
        }))
    }
}

/// Verdict over a proposed expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub is_valid: bool,
    #[serde(default)]
    pub identified_errors: Vec<String>,
    #[serde(alias = "audit_commentary")]
    pub commentary: String,
    #[serde(default)]
    pub fixed_expression: Option<String>,
}

impl StructuredOutput for ReviewResult {
    const NAME: &'static str = "review_result";

    fn json_schema() -> serde_json::Value {
        strict_object(json!({
            "is_valid": {"type": "boolean", "description": "Logical correctness check"},
            "identified_errors": {"type": "array", "items": {"type": "string"}},
            "commentary": {"type": "string"},
            "fixed_expression": {"type": ["string", "null"]}
        }))
    }
}

/// The durable record of one completed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub turn_index: usize,
    pub question: String,

    pub plan: Option<AnalysisPlan>,
    /// The last accepted step: the correction if one replaced the original.
    pub analyst_output: AnalyticStep,
    pub review: Option<ReviewResult>,
    /// Whether a correction replaced the originally generated step.
    #[serde(default)]
    pub corrected: bool,

    pub final_expression: String,
    pub raw_output: f64,
    pub response: String,
}

impl TurnResult {
    /// Whether the review stage judged the original expression invalid.
    pub fn review_flagged(&self) -> bool {
        self.review.as_ref().is_some_and(|r| !r.is_valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        let plan = AnalysisPlan::sentinel();
        assert_eq!(plan.intent, "Error");
        assert!(plan.data_points.is_empty() && plan.execution_steps.is_empty());
        assert!(!plan.is_percentage_required);

        let step = AnalyticStep::sentinel();
        assert_eq!(step.expression, "0");
        assert!(!step.is_percentage);
        assert_eq!(step.thought.as_deref(), Some("API Failure"));
    }

    #[test]
    fn step_accepts_legacy_field_name() {
        let step: AnalyticStep =
            serde_json::from_str(r#"{"python_expression": "ans_0 / 2", "is_percentage": true}"#)
                .unwrap();
        assert_eq!(step.expression, "ans_0 / 2");
        assert!(step.is_percentage);
        assert!(step.thought.is_none());
    }

    #[test]
    fn review_requires_verdict() {
        assert!(serde_json::from_str::<ReviewResult>(r#"{"commentary": "ok"}"#).is_err());
        let review: ReviewResult =
            serde_json::from_str(r#"{"is_valid": false, "audit_commentary": "wrong year"}"#)
                .unwrap();
        assert!(!review.is_valid);
        assert_eq!(review.commentary, "wrong year");
    }

    #[test]
    fn schemas_are_strict_objects() {
        for schema in [
            AnalysisPlan::json_schema(),
            AnalyticStep::json_schema(),
            ReviewResult::json_schema(),
        ] {
            assert_eq!(schema["type"], "object");
            assert_eq!(schema["additionalProperties"], false);
            let props = schema["properties"].as_object().unwrap();
            assert_eq!(schema["required"].as_array().unwrap().len(), props.len());
        }
    }

    #[test]
    fn review_flag_requires_invalid_review() {
        let mut turn = TurnResult {
            turn_index: 0,
            question: "q".into(),
            plan: None,
            analyst_output: AnalyticStep::sentinel(),
            review: None,
            corrected: false,
            final_expression: "0".into(),
            raw_output: 0.0,
            response: "0".into(),
        };
        assert!(!turn.review_flagged());

        turn.review = Some(ReviewResult {
            is_valid: false,
            identified_errors: vec![],
            commentary: String::new(),
            fixed_expression: None,
        });
        assert!(turn.review_flagged());
    }
}
