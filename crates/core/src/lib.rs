//! # FinQA Core
//!
//! Domain types, traits, and error definitions for the FinQA ablation
//! harness. This crate has **no runtime dependencies** beyond serde and
//! thiserror: it defines the model that every other crate builds on.
//!
//! ## Layout
//!
//! - [`condition`]: the experimental matrix and each condition's fixed profile
//! - [`record`]: the raw dataset record shape, tolerant of missing fields
//! - [`analysis`]: artifacts produced and consumed by the turn pipeline
//! - [`schema`]: the structured-output contract for gateway targets
//! - [`provider`]: the LLM backend trait

pub mod analysis;
pub mod condition;
pub mod error;
pub mod message;
pub mod provider;
pub mod record;
pub mod schema;

// Re-export key types at crate root for ergonomics
pub use analysis::{
    AnalysisPlan, AnalyticStep, DataPoint, FinancialContext, ReviewResult, TurnResult,
};
pub use condition::{ConditionProfile, ModelTier, Strategy, StudyCondition, TableFormat};
pub use error::{Error, EvalError, ProviderError, Result};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ReasoningEffort, ResponseFormat};
pub use record::{Dialogue, RawDocument, RawRecord};
pub use schema::StructuredOutput;
