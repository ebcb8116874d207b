//! Payload assembly.
//!
//! The base payload carries the record metadata, the narrative text, the
//! table in the condition's format, the conversation transcript, and the
//! current question. Later stages extend it with one tagged section each.

use finqa_core::{FinancialContext, TableFormat};

/// Assemble the base payload for one turn.
pub fn base_payload(
    context: &FinancialContext,
    format: TableFormat,
    transcript: &str,
    question: &str,
) -> String {
    format!(
        "<context>\n\
         <metadata>ID: {id}</metadata>\n\
         <pre_text>{pre}</pre_text>\n\
         <table_data>\n{table}\n</table_data>\n\
         <post_text>{post}</post_text>\n\
         <history>{transcript}</history>\n\
         </context>\n\
         <current_question>{question}</current_question>",
        id = context.record_id,
        pre = context.pre_text,
        table = table_block(context, format),
        post = context.post_text,
    )
}

/// The table as a condition sees it: serialized source JSON for
/// [`TableFormat::Structured`], the Markdown rendering otherwise.
pub fn table_block(context: &FinancialContext, format: TableFormat) -> String {
    match format {
        TableFormat::Structured => context.raw_table.to_string(),
        TableFormat::Text => context.text_table.clone(),
    }
}

/// Append `<tag>body</tag>` on a new line.
pub fn with_section(payload: &str, tag: &str, body: &str) -> String {
    format!("{payload}\n<{tag}>{body}</{tag}>")
}
