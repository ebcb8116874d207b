//! Raw dataset records.
//!
//! Records come from a large third-party JSON file and are not trusted to be
//! well-formed. Every section deserializes leniently: a section of the wrong
//! shape becomes its default instead of failing the whole record.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// One multi-turn record: a financial document plus a scripted dialogue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default = "unknown_id", deserialize_with = "lenient_id")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient")]
    pub doc: RawDocument,

    #[serde(default, deserialize_with = "lenient")]
    pub dialogue: Dialogue,
}

/// The document a dialogue is grounded in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDocument {
    #[serde(default)]
    pub pre_text: Option<String>,

    #[serde(default)]
    pub post_text: Option<String>,

    /// Nested mapping: column label → row label → cell value.
    #[serde(default)]
    pub table: serde_json::Value,
}

/// The scripted questions and their ground-truth answers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dialogue {
    #[serde(default)]
    pub conv_questions: Vec<String>,

    /// Executed ground-truth answers; usually numbers, occasionally strings.
    #[serde(default)]
    pub executed_answers: Vec<serde_json::Value>,
}

impl RawRecord {
    /// Build a record from an arbitrary JSON value. Never fails.
    pub fn from_value(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Record is not an object, using an empty record");
            Self {
                id: unknown_id(),
                ..Self::default()
            }
        })
    }

    /// The scripted questions, in order.
    pub fn questions(&self) -> &[String] {
        &self.dialogue.conv_questions
    }
}

impl Dialogue {
    /// Numeric ground truth for turn `index`.
    ///
    /// Numbers and numeric strings are accepted; anything else (including a
    /// missing entry) is `None`.
    pub fn expected_answer(&self, index: usize) -> Option<f64> {
        match self.executed_answers.get(index)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().replace(',', "").parse().ok(),
            _ => None,
        }
    }
}

fn unknown_id() -> String {
    "unknown".into()
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => unknown_id(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_record_parses() {
        let record = RawRecord::from_value(json!({
            "id": "Single_JKHY/2009/page_28.pdf-3",
            "doc": {
                "pre_text": "26 | 2009 annual report",
                "post_text": "",
                "table": {"2009": {"net income": 103102.0}}
            },
            "dialogue": {
                "conv_questions": ["what was net income in 2009?"],
                "executed_answers": [103102.0]
            }
        }));
        assert_eq!(record.id, "Single_JKHY/2009/page_28.pdf-3");
        assert_eq!(record.questions().len(), 1);
        assert_eq!(record.dialogue.expected_answer(0), Some(103102.0));
        assert!(record.doc.table.is_object());
    }

    #[test]
    fn missing_doc_degrades_to_defaults() {
        let record = RawRecord::from_value(json!({"dialogue": {"conv_questions": ["q"]}}));
        assert_eq!(record.id, "unknown");
        assert!(record.doc.pre_text.is_none());
        assert!(record.doc.table.is_null());
        assert_eq!(record.questions(), ["q".to_string()]);
    }

    #[test]
    fn wrong_shaped_sections_degrade() {
        let record = RawRecord::from_value(json!({
            "id": 42,
            "doc": "not an object",
            "dialogue": ["also", "wrong"]
        }));
        assert_eq!(record.id, "42");
        assert!(record.doc.post_text.is_none());
        assert!(record.questions().is_empty());
    }

    #[test]
    fn non_object_record_is_empty() {
        let record = RawRecord::from_value(json!([1, 2, 3]));
        assert_eq!(record.id, "unknown");
        assert!(record.questions().is_empty());
    }

    #[test]
    fn expected_answers_accept_numeric_strings() {
        let dialogue = Dialogue {
            conv_questions: vec![],
            executed_answers: vec![json!("1,234.5"), json!("yes"), json!(null), json!(7)],
        };
        assert_eq!(dialogue.expected_answer(0), Some(1234.5));
        assert_eq!(dialogue.expected_answer(1), None);
        assert_eq!(dialogue.expected_answer(2), None);
        assert_eq!(dialogue.expected_answer(3), Some(7.0));
        assert_eq!(dialogue.expected_answer(9), None);
    }
}
