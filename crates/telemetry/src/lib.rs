//! Gateway tracing and cost tracking for FinQA study runs.
//!
//! Every processed record gets a trace; every gateway call made for it gets
//! a span tagged with its pipeline stage, model, token usage and estimated
//! cost. Summaries roll traces up per condition for the result files.

pub mod engine;
pub mod model;
pub mod pricing;

pub use engine::TelemetryEngine;
pub use model::{CostSummary, ModelCost, Span, SpanKind, StageCount, Trace, UsageSnapshot};
pub use pricing::{ModelPricing, PricingTable};

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("unknown trace id: {0}")]
    UnknownTrace(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
