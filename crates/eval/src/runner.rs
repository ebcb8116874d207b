//! Study runner: drives a record sample through each condition.
//!
//! Records are independent, so up to `concurrency` of them run at once;
//! results are collected in sample order. A record whose processing fails
//! is logged and contributes no turns. Fatal provider errors (bad
//! credentials, unknown model) abort the condition instead, since no later
//! record could succeed.

use crate::StudyError;
use crate::dataset::Dataset;
use crate::metrics::{ConditionMetrics, TurnScore};
use crate::report::{ConditionReport, ReportMetadata};
use chrono::Utc;
use finqa_agent::{ConversationOrchestrator, PromptSet, ReasoningGateway};
use finqa_config::{AppConfig, ModelsConfig, StudyConfig};
use finqa_core::{Provider, RawRecord, StudyCondition};
use finqa_telemetry::TelemetryEngine;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one condition over a sample.
#[derive(Debug, Clone, Default)]
pub struct ConditionRun {
    pub scores: Vec<TurnScore>,
    pub metrics: ConditionMetrics,
    pub processed_records: usize,
    pub failed_records: usize,
}

/// Process `records` under `orchestrator`'s condition and score every turn
/// that has a ground-truth answer.
pub async fn run_condition(
    orchestrator: &ConversationOrchestrator,
    records: &[&RawRecord],
    concurrency: usize,
) -> Result<ConditionRun, StudyError> {
    let condition = orchestrator.condition();
    let mut run = ConditionRun::default();

    let outcomes = stream::iter(records.iter().copied())
        .map(|record| async move { (record, orchestrator.process_record(record).await) })
        .buffered(concurrency.max(1));
    let mut outcomes = std::pin::pin!(outcomes);

    while let Some((record, outcome)) = outcomes.next().await {
        let state = match outcome {
            Ok(state) => state,
            Err(e) if e.is_fatal() => {
                return Err(StudyError::Aborted {
                    condition: condition.to_string(),
                    source: e,
                });
            }
            Err(e) => {
                warn!(record = %record.id, condition = %condition, error = %e, "Record failed, skipping");
                run.failed_records += 1;
                continue;
            }
        };

        run.processed_records += 1;
        let answered = record.dialogue.executed_answers.len();
        for turn in state.history().iter().take(answered) {
            let expected = record.dialogue.expected_answer(turn.turn_index);
            let score = TurnScore::score(&record.id, turn, expected);
            run.metrics.record(&score);
            run.scores.push(score);
        }
        debug!(record = %record.id, turns = state.history().len(), "Record scored");
    }

    Ok(run)
}

/// A configured study: one provider, one sample, many conditions.
pub struct Study {
    provider: Arc<dyn Provider>,
    models: ModelsConfig,
    settings: StudyConfig,
    max_tokens: Option<u32>,
    prompts: Arc<PromptSet>,
    telemetry: Option<Arc<TelemetryEngine>>,
}

impl Study {
    pub fn new(provider: Arc<dyn Provider>, config: &AppConfig, prompts: Arc<PromptSet>) -> Self {
        Self {
            provider,
            models: config.models.clone(),
            settings: config.study.clone(),
            max_tokens: config.max_tokens,
            prompts,
            telemetry: None,
        }
    }

    /// Record gateway usage and attach a cost summary to every report.
    pub fn with_telemetry(mut self, telemetry: Arc<TelemetryEngine>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn settings(&self) -> &StudyConfig {
        &self.settings
    }

    /// A pipeline for `condition`, sharing this study's provider and telemetry.
    pub fn orchestrator(&self, condition: StudyCondition) -> ConversationOrchestrator {
        let mut gateway =
            ReasoningGateway::new(self.provider.clone()).with_max_tokens(self.max_tokens);
        if let Some(telemetry) = &self.telemetry {
            gateway = gateway.with_telemetry(telemetry.clone());
        }
        ConversationOrchestrator::new(gateway, condition, &self.models, self.prompts.clone())
    }

    /// Run one condition over the study's sample of `dataset`.
    pub async fn evaluate(
        &self,
        dataset: &Dataset,
        condition: StudyCondition,
    ) -> Result<ConditionReport, StudyError> {
        let sample = dataset.sample(self.settings.sample_size, self.settings.seed);
        let orchestrator = self.orchestrator(condition);
        info!(
            condition = %condition,
            model = orchestrator.model(),
            records = sample.len(),
            "Running condition"
        );

        let run = run_condition(&orchestrator, &sample, self.settings.concurrency).await?;

        let profile = condition.profile();
        let metadata = ReportMetadata {
            id: condition.id(),
            name: condition.label().to_string(),
            condition,
            model: orchestrator.model().to_string(),
            reasoning_effort: profile.effort,
            strategy: profile.strategy,
            table_format: profile.format,
            sample_size: sample.len(),
            seed: self.settings.seed,
            failed_records: run.failed_records,
            generated_at: Utc::now(),
        };
        let usage = self
            .telemetry
            .as_ref()
            .map(|t| t.cost_summary_for(condition.name()));

        let report = ConditionReport::new(metadata, &run.metrics, usage, run.scores);
        info!(
            condition = %condition,
            accuracy = report.accuracy,
            turns = report.metrics.total_turns,
            failed_records = run.failed_records,
            "Condition complete"
        );
        Ok(report)
    }

    /// Run every condition in order, writing each result file to the
    /// configured output directory as soon as it completes.
    pub async fn run(
        &self,
        dataset: &Dataset,
        conditions: &[StudyCondition],
    ) -> Result<Vec<ConditionReport>, StudyError> {
        let mut reports = Vec::with_capacity(conditions.len());
        for &condition in conditions {
            let report = self.evaluate(dataset, condition).await?;
            report.write(&self.settings.output_dir)?;
            reports.push(report);
        }
        Ok(reports)
    }
}
