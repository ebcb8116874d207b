//! Thread-safe telemetry engine: collects gateway spans per record,
//! tracks costs, and serves per-condition summaries.

use crate::TelemetryError;
use crate::model::*;
use crate::pricing::PricingTable;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The core telemetry engine.
///
/// Thread-safe via `RwLock`; records processed concurrently share one engine.
pub struct TelemetryEngine {
    /// Pricing table for cost computation.
    pricing: PricingTable,
    /// All recorded traces (most recent last).
    traces: RwLock<Vec<Trace>>,
    /// Running totals.
    totals: RwLock<RunningTotals>,
}

#[derive(Debug, Default)]
struct RunningTotals {
    total_cost: f64,
    total_input_tokens: u64,
    total_output_tokens: u64,
    gateway_calls: u64,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl TelemetryEngine {
    /// Create a new telemetry engine with default pricing.
    pub fn new() -> Self {
        Self::with_pricing(PricingTable::with_defaults())
    }

    /// Create a telemetry engine with custom pricing.
    pub fn with_pricing(pricing: PricingTable) -> Self {
        Self {
            pricing,
            traces: RwLock::new(Vec::new()),
            totals: RwLock::new(RunningTotals::default()),
        }
    }

    /// Get a reference to the pricing table.
    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    // ── Trace management ──────────────────────────────────────────────

    /// Start a new trace for one record under one condition.
    pub fn start_trace(&self, record_id: impl Into<String>, condition: impl Into<String>) -> String {
        let trace = Trace::new(record_id, condition);
        let id = trace.id.clone();
        write(&self.traces).push(trace);
        id
    }

    /// End a trace.
    pub fn end_trace(&self, trace_id: &str) {
        if let Some(trace) = write(&self.traces).iter_mut().find(|t| t.id == trace_id) {
            trace.end();
        }
    }

    /// Record a completed span in a trace and update running totals.
    pub fn record_span(&self, trace_id: &str, span: Span) -> Result<(), TelemetryError> {
        let mut traces = write(&self.traces);
        let trace = traces
            .iter_mut()
            .find(|t| t.id == trace_id)
            .ok_or_else(|| TelemetryError::UnknownTrace(trace_id.to_string()))?;

        {
            let mut totals = write(&self.totals);
            totals.total_cost += span.cost_usd.unwrap_or(0.0);
            totals.total_input_tokens += span.input_tokens.unwrap_or(0) as u64;
            totals.total_output_tokens += span.output_tokens.unwrap_or(0) as u64;
            totals.gateway_calls += 1;
        }

        tracing::debug!(
            trace_id,
            stage = %span.kind,
            model = %span.label,
            tokens = span.total_tokens(),
            "Recorded gateway span"
        );
        trace.add_span(span);
        Ok(())
    }

    /// Compute cost for a gateway call using the pricing table.
    pub fn compute_cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        self.pricing
            .compute_cost(model, input_tokens, output_tokens)
    }

    // ── Queries ───────────────────────────────────────────────────────

    /// Get a specific trace by ID.
    pub fn get_trace(&self, trace_id: &str) -> Option<Trace> {
        read(&self.traces).iter().find(|t| t.id == trace_id).cloned()
    }

    /// Traces recorded for a dataset record, across conditions.
    pub fn traces_for_record(&self, record_id: &str) -> Vec<Trace> {
        read(&self.traces)
            .iter()
            .filter(|t| t.record_id == record_id)
            .cloned()
            .collect()
    }

    /// Total number of traces recorded.
    pub fn trace_count(&self) -> usize {
        read(&self.traces).len()
    }

    /// Get a real-time usage snapshot.
    pub fn usage_snapshot(&self) -> UsageSnapshot {
        // Traces before totals, matching the order `record_span` locks in.
        let trace_count = self.trace_count() as u64;
        let totals = read(&self.totals);
        UsageSnapshot {
            total_cost_usd: totals.total_cost,
            total_tokens: totals.total_input_tokens + totals.total_output_tokens,
            gateway_calls: totals.gateway_calls,
            trace_count,
        }
    }

    /// Cost summary over every trace recorded under `condition`.
    pub fn cost_summary_for(&self, condition: &str) -> CostSummary {
        let traces = read(&self.traces);
        summarize(traces.iter().filter(|t| t.condition == condition))
    }

    /// Cost summary over every trace.
    pub fn cost_summary(&self) -> CostSummary {
        let traces = read(&self.traces);
        summarize(traces.iter())
    }

    /// All traces as pretty-printed JSON.
    pub fn export_json(&self) -> Result<String, TelemetryError> {
        let traces = read(&self.traces);
        Ok(serde_json::to_string_pretty(&*traces)?)
    }
}

impl Default for TelemetryEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn summarize<'a>(traces: impl Iterator<Item = &'a Trace>) -> CostSummary {
    let mut summary = CostSummary::default();
    let mut by_model: BTreeMap<String, ModelCost> = BTreeMap::new();
    let mut by_stage: BTreeMap<SpanKind, StageCount> = BTreeMap::new();

    for trace in traces {
        summary.trace_count += 1;

        for span in &trace.spans {
            let cost = span.cost_usd.unwrap_or(0.0);
            let input = span.input_tokens.unwrap_or(0) as u64;
            let output = span.output_tokens.unwrap_or(0) as u64;

            summary.total_cost_usd += cost;
            summary.total_input_tokens += input;
            summary.total_output_tokens += output;
            summary.gateway_calls += 1;
            if span.success == Some(false) {
                summary.empty_results += 1;
            }

            let model = by_model
                .entry(span.label.clone())
                .or_insert_with(|| ModelCost {
                    model: span.label.clone(),
                    cost_usd: 0.0,
                    input_tokens: 0,
                    output_tokens: 0,
                    calls: 0,
                });
            model.cost_usd += cost;
            model.input_tokens += input;
            model.output_tokens += output;
            model.calls += 1;

            let stage = by_stage.entry(span.kind).or_insert(StageCount {
                stage: span.kind,
                calls: 0,
                cost_usd: 0.0,
            });
            stage.calls += 1;
            stage.cost_usd += cost;
        }
    }

    let mut models: Vec<ModelCost> = by_model.into_values().collect();
    models.sort_by(|a, b| b.cost_usd.total_cmp(&a.cost_usd));
    summary.by_model = models;
    summary.by_stage = by_stage.into_values().collect();
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(kind: SpanKind, model: &str, input: u32, output: u32, cost: f64) -> Span {
        let mut span = Span::new(kind, model);
        span.record_tokens(input, output, cost);
        span.end(true);
        span
    }

    #[test]
    fn start_and_end_trace() {
        let engine = TelemetryEngine::new();
        let trace_id = engine.start_trace("rec-1", "baseline");
        assert_eq!(engine.trace_count(), 1);

        engine.end_trace(&trace_id);
        let trace = engine.get_trace(&trace_id).unwrap();
        assert!(trace.ended_at.is_some());
        assert_eq!(trace.record_id, "rec-1");
    }

    #[test]
    fn record_span_updates_totals() {
        let engine = TelemetryEngine::new();
        let trace_id = engine.start_trace("rec-1", "md_baseline_mini");

        engine
            .record_span(&trace_id, finished(SpanKind::Generate, "gpt-5-mini", 1000, 500, 0.00125))
            .unwrap();

        let snapshot = engine.usage_snapshot();
        assert!((snapshot.total_cost_usd - 0.00125).abs() < 1e-10);
        assert_eq!(snapshot.total_tokens, 1500);
        assert_eq!(snapshot.gateway_calls, 1);
    }

    #[test]
    fn unknown_trace_is_an_error() {
        let engine = TelemetryEngine::new();
        let err = engine
            .record_span("missing", Span::new(SpanKind::Plan, "m"))
            .unwrap_err();
        assert!(matches!(err, TelemetryError::UnknownTrace(_)));
        assert_eq!(engine.usage_snapshot().gateway_calls, 0);
    }

    #[test]
    fn compute_cost_from_pricing() {
        let engine = TelemetryEngine::new();
        let cost = engine.compute_cost("gpt-5-mini", 1000, 500);
        assert!((cost - 0.00125).abs() < 1e-12);
    }

    #[test]
    fn summary_per_condition() {
        let engine = TelemetryEngine::new();

        let a = engine.start_trace("rec-1", "reflect_med");
        engine.record_span(&a, finished(SpanKind::Plan, "gpt-5.2", 100, 50, 0.01)).unwrap();
        engine.record_span(&a, finished(SpanKind::Generate, "gpt-5.2", 100, 50, 0.02)).unwrap();
        let mut review = Span::new(SpanKind::Review, "gpt-5.2");
        review.end(false);
        engine.record_span(&a, review).unwrap();

        let b = engine.start_trace("rec-1", "md_baseline_mini");
        engine.record_span(&b, finished(SpanKind::Generate, "gpt-5-mini", 10, 5, 0.001)).unwrap();

        let summary = engine.cost_summary_for("reflect_med");
        assert_eq!(summary.trace_count, 1);
        assert_eq!(summary.gateway_calls, 3);
        assert_eq!(summary.empty_results, 1);
        assert!((summary.total_cost_usd - 0.03).abs() < 1e-10);
        assert_eq!(summary.by_model.len(), 1);
        assert_eq!(summary.by_model[0].calls, 3);
        let stages: Vec<SpanKind> = summary.by_stage.iter().map(|s| s.stage).collect();
        assert_eq!(stages, vec![SpanKind::Plan, SpanKind::Generate, SpanKind::Review]);

        let all = engine.cost_summary();
        assert_eq!(all.trace_count, 2);
        assert_eq!(all.gateway_calls, 4);
        assert_eq!(engine.traces_for_record("rec-1").len(), 2);
    }

    #[test]
    fn models_sorted_by_cost() {
        let engine = TelemetryEngine::new();
        let t = engine.start_trace("rec-1", "c");
        engine.record_span(&t, finished(SpanKind::Generate, "cheap", 1, 1, 0.001)).unwrap();
        engine.record_span(&t, finished(SpanKind::Generate, "pricey", 1, 1, 0.5)).unwrap();

        let summary = engine.cost_summary();
        assert_eq!(summary.by_model[0].model, "pricey");
        assert_eq!(summary.by_model[1].model, "cheap");
    }

    #[test]
    fn export_json_lists_traces() {
        let engine = TelemetryEngine::new();
        engine.start_trace("rec-9", "modular_high");
        let json = engine.export_json().unwrap();
        assert!(json.contains("rec-9"));
        assert!(json.contains("modular_high"));
    }

    #[test]
    fn default_engine() {
        let engine = TelemetryEngine::default();
        assert_eq!(engine.trace_count(), 0);
        assert!(!engine.pricing().is_empty());
    }
}
