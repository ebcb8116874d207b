//! Persisted result files and the cross-condition comparison table.

use crate::StudyError;
use crate::metrics::{ConditionMetrics, TurnScore, TurnStats};
use chrono::{DateTime, Utc};
use finqa_core::{ReasoningEffort, Strategy, StudyCondition, TableFormat};
use finqa_telemetry::CostSummary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// What was run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub id: u8,
    pub name: String,
    pub condition: StudyCondition,
    pub model: String,
    pub reasoning_effort: ReasoningEffort,
    pub strategy: Strategy,
    pub table_format: TableFormat,
    pub sample_size: usize,
    pub seed: u64,
    /// Records dropped after a processing failure.
    pub failed_records: usize,
    pub generated_at: DateTime<Utc>,
}

/// Aggregate counts as written to the result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricCounts {
    pub total_turns: u64,
    pub correct: u64,
    pub hallucinations: u64,
    pub scale_errors: u64,
    pub recovery_attempts: u64,
    pub successful_recoveries: u64,
}

/// Accuracy at one turn index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnBreakdown {
    pub correct: u64,
    pub total: u64,
    pub accuracy: f64,
}

/// One condition's result file: `eval_results_cond_<id>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionReport {
    pub metadata: ReportMetadata,
    /// Percent, rounded to two decimals.
    pub accuracy: f64,
    pub metrics: MetricCounts,
    pub per_turn: BTreeMap<usize, TurnBreakdown>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<CostSummary>,
    pub detailed_results: Vec<TurnScore>,
}

impl ConditionReport {
    pub fn new(
        metadata: ReportMetadata,
        metrics: &ConditionMetrics,
        usage: Option<CostSummary>,
        detailed_results: Vec<TurnScore>,
    ) -> Self {
        Self {
            metadata,
            accuracy: round2(metrics.accuracy()),
            metrics: MetricCounts {
                total_turns: metrics.total_turns,
                correct: metrics.correct,
                hallucinations: metrics.hallucinations,
                scale_errors: metrics.scale_errors,
                recovery_attempts: metrics.recovery_attempts,
                successful_recoveries: metrics.successful_recoveries,
            },
            per_turn: metrics
                .per_turn
                .iter()
                .map(|(&index, stats)| (index, breakdown(stats)))
                .collect(),
            usage,
            detailed_results,
        }
    }

    /// Successful recoveries over attempts, in percent.
    pub fn recovery_rate(&self) -> f64 {
        if self.metrics.recovery_attempts == 0 {
            0.0
        } else {
            self.metrics.successful_recoveries as f64 / self.metrics.recovery_attempts as f64
                * 100.0
        }
    }

    /// Write the report into `dir`, creating it if needed.
    pub fn write(&self, dir: &Path) -> Result<PathBuf, StudyError> {
        let path = result_path(dir, self.metadata.condition);
        let write_err = |source: std::io::Error| StudyError::ReportWrite {
            path: path.display().to_string(),
            source,
        };

        std::fs::create_dir_all(dir).map_err(write_err)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(write_err)?;

        info!(
            condition = %self.metadata.condition,
            path = %path.display(),
            "Wrote result file"
        );
        Ok(path)
    }

    pub fn read(path: &Path) -> Result<Self, StudyError> {
        let content = std::fs::read_to_string(path).map_err(|source| StudyError::ReportRead {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// `<dir>/eval_results_cond_<id>.json`
pub fn result_path(dir: &Path, condition: StudyCondition) -> PathBuf {
    dir.join(format!("eval_results_cond_{}.json", condition.id()))
}

/// Side-by-side comparison of condition reports.
pub fn render_comparison(reports: &[ConditionReport]) -> String {
    let mut lines = vec![
        format!(
            "{:<24} {:>10} {:>15} {:>13} {:>14}",
            "Condition", "Accuracy", "Hallucinations", "Scale Errors", "Recovery Rate"
        ),
        format!(
            "{:<24} {:>10} {:>15} {:>13} {:>14}",
            "─────────", "────────", "──────────────", "────────────", "─────────────"
        ),
    ];

    for report in reports {
        lines.push(format!(
            "{:<24} {:>10} {:>15} {:>13} {:>14}",
            report.metadata.name,
            format!("{}%", report.accuracy),
            report.metrics.hallucinations,
            report.metrics.scale_errors,
            format!("{:.1}%", report.recovery_rate()),
        ));
    }

    lines.join("\n")
}

fn breakdown(stats: &TurnStats) -> TurnBreakdown {
    TurnBreakdown {
        correct: stats.correct,
        total: stats.total,
        accuracy: round2(stats.accuracy()),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
