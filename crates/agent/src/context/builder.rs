//! Normalizes a raw record into a [`FinancialContext`].
//!
//! Building never fails: absent or malformed sections degrade to empty
//! strings and an empty table.

use finqa_core::{FinancialContext, RawRecord};
use finqa_tools::render_table;
use serde_json::Value;

/// Build the context every turn of `record` is answered against.
pub fn build_context(record: &RawRecord) -> FinancialContext {
    let raw_table = match &record.doc.table {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };

    FinancialContext {
        record_id: record.id.clone(),
        pre_text: normalize_text(record.doc.pre_text.as_deref()),
        post_text: normalize_text(record.doc.post_text.as_deref()),
        text_table: render_table(&raw_table),
        raw_table,
    }
}

/// Collapse whitespace runs to a single space and trim. `None` becomes `""`.
pub fn normalize_text(text: Option<&str>) -> String {
    text.map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
}
