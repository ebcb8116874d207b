//! Context building and payload assembly.
//!
//! A raw dataset record is normalized once into a [`FinancialContext`]
//! ([`builder`]); every gateway call of a turn then sees the same base
//! payload, optionally extended with tagged sections ([`payload`]).
//!
//! [`FinancialContext`]: finqa_core::FinancialContext

pub mod builder;
pub mod payload;

pub use builder::{build_context, normalize_text};
pub use payload::{base_payload, table_block, with_section};
