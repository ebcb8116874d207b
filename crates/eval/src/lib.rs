//! Study execution and scoring for FinQA.
//!
//! - [`dataset`]: loading a split and drawing a deterministic sample
//! - [`metrics`]: per-turn scoring rules and per-condition aggregation
//! - [`runner`]: runs a sample through each condition's pipeline
//! - [`report`]: persisted result files and the comparison table

pub mod dataset;
pub mod metrics;
pub mod report;
pub mod runner;

pub use dataset::Dataset;
pub use metrics::{
    ConditionMetrics, TurnScore, TurnStats, detect_symbolic_hallucination, is_nearly_equal,
    is_scale_error,
};
pub use report::{ConditionReport, ReportMetadata, render_comparison, result_path};
pub use runner::{ConditionRun, Study, run_condition};

use finqa_core::ProviderError;

/// Errors raised while running a study.
#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    #[error("Failed to read dataset {path}: {source}")]
    DatasetRead {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse dataset {path}: {source}")]
    DatasetParse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Dataset has no '{0}' split")]
    MissingSplit(String),

    #[error("Record '{0}' not found")]
    RecordNotFound(String),

    #[error("Failed to read report {path}: {source}")]
    ReportRead {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write report {path}: {source}")]
    ReportWrite {
        path: String,
        source: std::io::Error,
    },

    #[error("Condition {condition} aborted: {source}")]
    Aborted {
        condition: String,
        source: ProviderError,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
