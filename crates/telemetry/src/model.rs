//! Data model for gateway traces, spans, and cost summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Span ──────────────────────────────────────────────────────────────────

/// The pipeline stage a gateway call belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// Planning call producing an analysis plan.
    Plan,
    /// Expression generation.
    Generate,
    /// Review of a proposed expression.
    Review,
    /// Single correction retry after a failed review.
    Correct,
}

impl std::fmt::Display for SpanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plan => write!(f, "plan"),
            Self::Generate => write!(f, "generate"),
            Self::Review => write!(f, "review"),
            Self::Correct => write!(f, "correct"),
        }
    }
}

/// One gateway call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    /// Unique identifier.
    pub id: String,
    /// Which stage issued the call.
    pub kind: SpanKind,
    /// Model name.
    pub label: String,
    /// Turn the call was made for.
    pub turn_index: Option<usize>,
    /// When the span started.
    pub started_at: DateTime<Utc>,
    /// When the span ended (None if still running).
    pub ended_at: Option<DateTime<Utc>>,
    /// Duration in milliseconds (computed on end).
    pub duration_ms: Option<u64>,
    /// Input tokens consumed.
    pub input_tokens: Option<u32>,
    /// Output tokens produced.
    pub output_tokens: Option<u32>,
    /// Estimated cost in USD.
    pub cost_usd: Option<f64>,
    /// Whether the call produced a usable structured result.
    pub success: Option<bool>,
}

impl Span {
    /// Create a new span with the given kind and label.
    pub fn new(kind: SpanKind, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            label: label.into(),
            turn_index: None,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            input_tokens: None,
            output_tokens: None,
            cost_usd: None,
            success: None,
        }
    }

    /// Tag the span with the turn it served.
    pub fn with_turn(mut self, turn_index: usize) -> Self {
        self.turn_index = Some(turn_index);
        self
    }

    /// Mark the span as ended with the given success status.
    pub fn end(&mut self, success: bool) {
        let now = Utc::now();
        self.ended_at = Some(now);
        self.duration_ms = Some(
            now.signed_duration_since(self.started_at)
                .num_milliseconds()
                .max(0) as u64,
        );
        self.success = Some(success);
    }

    /// Record token usage and computed cost.
    pub fn record_tokens(&mut self, input: u32, output: u32, cost: f64) {
        self.input_tokens = Some(input);
        self.output_tokens = Some(output);
        self.cost_usd = Some(cost);
    }

    /// Total tokens (input + output), or 0 if not recorded.
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.unwrap_or(0) + self.output_tokens.unwrap_or(0)
    }
}

// ── Trace ─────────────────────────────────────────────────────────────────

/// All gateway calls made while processing one record under one condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    /// Unique trace id.
    pub id: String,
    /// Dataset record this trace belongs to.
    pub record_id: String,
    /// Condition name the record was processed under.
    pub condition: String,
    /// All spans in this trace.
    pub spans: Vec<Span>,
    /// When the trace started.
    pub started_at: DateTime<Utc>,
    /// When the trace ended.
    pub ended_at: Option<DateTime<Utc>>,
}

impl Trace {
    pub fn new(record_id: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            record_id: record_id.into(),
            condition: condition.into(),
            spans: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Add a span to this trace.
    pub fn add_span(&mut self, span: Span) {
        self.spans.push(span);
    }

    /// Mark the trace as complete.
    pub fn end(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    /// Total cost across all spans in USD.
    pub fn total_cost(&self) -> f64 {
        self.spans.iter().filter_map(|s| s.cost_usd).sum()
    }

    /// Total tokens across all spans.
    pub fn total_tokens(&self) -> u32 {
        self.spans.iter().map(|s| s.total_tokens()).sum()
    }

    /// Total duration in milliseconds.
    pub fn total_duration_ms(&self) -> u64 {
        self.spans.iter().filter_map(|s| s.duration_ms).sum()
    }

    /// Number of calls issued by a given stage.
    pub fn count(&self, kind: SpanKind) -> usize {
        self.spans.iter().filter(|s| s.kind == kind).count()
    }
}

// ── Aggregated views ──────────────────────────────────────────────────────

/// Aggregated cost summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostSummary {
    /// Total cost in USD.
    pub total_cost_usd: f64,
    /// Total input tokens.
    pub total_input_tokens: u64,
    /// Total output tokens.
    pub total_output_tokens: u64,
    /// Total number of gateway calls.
    pub gateway_calls: u64,
    /// Calls that produced no usable result.
    pub empty_results: u64,
    /// Total number of traces.
    pub trace_count: u64,
    /// Cost breakdown by model.
    pub by_model: Vec<ModelCost>,
    /// Call counts by stage.
    pub by_stage: Vec<StageCount>,
}

/// Cost breakdown for a single model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCost {
    /// Model name.
    pub model: String,
    /// Total cost for this model.
    pub cost_usd: f64,
    /// Total input tokens.
    pub input_tokens: u64,
    /// Total output tokens.
    pub output_tokens: u64,
    /// Number of calls.
    pub calls: u64,
}

/// Gateway calls issued by one stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageCount {
    pub stage: SpanKind,
    pub calls: u64,
    pub cost_usd: f64,
}

/// A point-in-time usage snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Total cost so far.
    pub total_cost_usd: f64,
    /// Total tokens so far.
    pub total_tokens: u64,
    /// Gateway calls so far.
    pub gateway_calls: u64,
    /// Number of traces recorded.
    pub trace_count: u64,
}
