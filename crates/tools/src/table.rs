//! Markdown rendering of nested financial tables.
//!
//! Dataset tables are keyed by column label, then by row label. Rendering
//! transposes them into a row-major Markdown table that keeps the source's
//! column order and the first-seen order of row labels.

use crate::format::{format_decimal, group_thousands};
use serde_json::Value;

/// Cell text for a (column, row) pair missing from the source.
pub const MISSING_CELL: &str = "n/a";

/// Render `table` as a Markdown table. Empty or non-object input renders as "".
pub fn render(table: &Value) -> String {
    let Some(columns) = table.as_object() else {
        return String::new();
    };

    let mut row_labels: Vec<&str> = Vec::new();
    for column in columns.values() {
        if let Some(rows) = column.as_object() {
            for label in rows.keys() {
                if !row_labels.contains(&label.as_str()) {
                    row_labels.push(label);
                }
            }
        }
    }
    if row_labels.is_empty() {
        return String::new();
    }

    let header_cells: Vec<&str> = columns.keys().map(String::as_str).collect();
    let mut lines = Vec::with_capacity(row_labels.len() + 2);
    lines.push(format!("| Item | {} |", header_cells.join(" | ")));
    lines.push(format!(
        "| :--- | {} |",
        vec![":---:"; header_cells.len()].join(" | ")
    ));

    for label in row_labels {
        let mut cells = vec![format!("**{label}**")];
        for column in columns.values() {
            let cell = column.get(label).map_or_else(|| MISSING_CELL.to_string(), render_cell);
            cells.push(cell);
        }
        lines.push(format!("| {} |", cells.join(" | ")));
    }

    lines.join("\n")
}

/// A present `null` cell renders like an absent one; booleans keep JSON spelling.
fn render_cell(value: &Value) -> String {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                group_thousands(&i.to_string())
            } else if let Some(u) = n.as_u64() {
                group_thousands(&u.to_string())
            } else {
                n.as_f64().map_or_else(|| n.to_string(), format_decimal)
            }
        }
        Value::String(s) => s.clone(),
        Value::Null => MISSING_CELL.to_string(),
        other => other.to_string(),
    }
}
