//! Turn pipeline: drives one question through the condition's stages.
//!
//! Stage sequence per strategy (each is a prefix of the next):
//!
//! 1. **Baseline**: generate with the baseline instructions.
//! 2. **Modular**: plan, then generate from the base payload plus `<plan>`.
//! 3. **Reflect**: as Modular, then review the proposed expression; a failed
//!    review buys exactly one correction retry with the reviewer's
//!    commentary as `<feedback>`.
//!
//! Every turn ends by evaluating the final expression against the
//! conversation's variable namespace. An empty gateway result falls back to
//! a sentinel, and an evaluation failure yields `0.0`; neither escapes the
//! turn. Only transport failures ([`ProviderError`]) propagate.

use crate::context::{base_payload, build_context, with_section};
use crate::gateway::{GatewayCall, ReasoningGateway};
use crate::prompts::PromptSet;
use crate::state::ConversationState;
use finqa_config::ModelsConfig;
use finqa_core::{
    AnalysisPlan, AnalyticStep, ConditionProfile, ProviderError, RawRecord, ReviewResult,
    StructuredOutput, StudyCondition, TurnResult,
};
use finqa_telemetry::SpanKind;
use finqa_tools::{evaluate, format_response};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What the reasoning stages settled on, before execution.
struct Draft {
    plan: Option<AnalysisPlan>,
    step: AnalyticStep,
    review: Option<ReviewResult>,
    corrected: bool,
}

/// Runs records and turns under one study condition.
///
/// Holds only shared, read-only configuration, so one orchestrator can serve
/// many records concurrently.
pub struct ConversationOrchestrator {
    gateway: ReasoningGateway,
    condition: StudyCondition,
    profile: ConditionProfile,
    model: String,
    prompts: Arc<PromptSet>,
}

impl ConversationOrchestrator {
    /// The model is picked from `models` by the condition's tier.
    pub fn new(
        gateway: ReasoningGateway,
        condition: StudyCondition,
        models: &ModelsConfig,
        prompts: Arc<PromptSet>,
    ) -> Self {
        let profile = condition.profile();
        Self {
            gateway,
            condition,
            profile,
            model: models.for_tier(profile.tier).to_string(),
            prompts,
        }
    }

    pub fn condition(&self) -> StudyCondition {
        self.condition
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn gateway(&self) -> &ReasoningGateway {
        &self.gateway
    }

    // ── Record lifecycle ──────────────────────────────────────────────

    /// Fresh state for `record`, with a telemetry trace opened for it.
    pub fn start(&self, record: &RawRecord) -> ConversationState {
        let context = build_context(record);
        let trace_id = self
            .gateway
            .start_trace(&context.record_id, self.condition.name());
        ConversationState::new(context, self.condition).with_trace(trace_id)
    }

    /// Close the record's telemetry trace.
    pub fn finish(&self, state: &ConversationState) {
        self.gateway.end_trace(state.trace_id());
    }

    /// Answer every scripted question of `record`, in order.
    ///
    /// Produces one turn per question. A transport failure aborts the record.
    pub async fn process_record(
        &self,
        record: &RawRecord,
    ) -> Result<ConversationState, ProviderError> {
        let mut state = self.start(record);

        for question in record.questions() {
            if let Err(e) = self.process_turn(&mut state, question).await {
                self.finish(&state);
                return Err(e);
            }
        }

        self.finish(&state);
        Ok(state)
    }

    // ── Turns ─────────────────────────────────────────────────────────

    /// Run one question through the pipeline and register the result.
    pub async fn process_turn(
        &self,
        state: &mut ConversationState,
        question: &str,
    ) -> Result<TurnResult, ProviderError> {
        let turn_index = state.next_turn_index();
        info!(
            record = %state.context().record_id,
            turn = turn_index,
            condition = %self.condition,
            "Processing turn"
        );

        let payload = base_payload(
            state.context(),
            self.profile.format,
            &state.transcript(),
            question,
        );
        debug!(turn = turn_index, payload_chars = payload.len(), "Assembled payload");

        let draft = self.reason(&payload, turn_index, state.trace_id()).await?;
        let final_expression = draft.step.expression.clone();

        let namespace = state.variable_namespace();
        let (raw_output, response) = match evaluate(&final_expression, &namespace) {
            Ok(value) => (value, format_response(value, draft.step.is_percentage)),
            Err(e) => {
                error!(
                    record = %state.context().record_id,
                    turn = turn_index,
                    error = %e,
                    "Expression evaluation failed"
                );
                (0.0, format!("Execution Error: {e}"))
            }
        };

        let turn = TurnResult {
            turn_index,
            question: question.to_string(),
            plan: draft.plan,
            analyst_output: draft.step,
            review: draft.review,
            corrected: draft.corrected,
            final_expression,
            raw_output,
            response,
        };
        state.register(turn.clone());
        Ok(turn)
    }

    async fn reason(
        &self,
        payload: &str,
        turn: usize,
        trace_id: Option<&str>,
    ) -> Result<Draft, ProviderError> {
        let strategy = self.profile.strategy;

        if !strategy.plans() {
            let step = self
                .ask::<AnalyticStep>(
                    SpanKind::Generate,
                    &self.prompts.baseline,
                    payload,
                    turn,
                    trace_id,
                )
                .await?
                .unwrap_or_else(AnalyticStep::sentinel);
            return Ok(Draft {
                plan: None,
                step,
                review: None,
                corrected: false,
            });
        }

        let plan = self
            .ask::<AnalysisPlan>(
                SpanKind::Plan,
                &self.prompts.planner,
                payload,
                turn,
                trace_id,
            )
            .await?
            .unwrap_or_else(AnalysisPlan::sentinel);

        let plan_json = serde_json::to_string(&plan).unwrap_or_default();
        let analyst_payload = with_section(payload, "plan", &plan_json);
        let mut step = self
            .ask::<AnalyticStep>(
                SpanKind::Generate,
                &self.prompts.analyst,
                &analyst_payload,
                turn,
                trace_id,
            )
            .await?
            .unwrap_or_else(AnalyticStep::sentinel);

        if !strategy.reviews() {
            return Ok(Draft {
                plan: Some(plan),
                step,
                review: None,
                corrected: false,
            });
        }

        let review_payload = with_section(payload, "proposed_expression", &step.expression);
        let review = self
            .ask::<ReviewResult>(
                SpanKind::Review,
                &self.prompts.reviewer,
                &review_payload,
                turn,
                trace_id,
            )
            .await?;

        let mut corrected = false;
        if let Some(verdict) = review.as_ref().filter(|r| !r.is_valid) {
            info!(
                turn,
                errors = verdict.identified_errors.len(),
                "Review flagged expression, retrying once"
            );
            let retry_payload = with_section(&analyst_payload, "feedback", &verdict.commentary);
            match self
                .ask::<AnalyticStep>(
                    SpanKind::Correct,
                    &self.prompts.analyst,
                    &retry_payload,
                    turn,
                    trace_id,
                )
                .await?
            {
                Some(replacement) => {
                    step = replacement;
                    corrected = true;
                }
                None => warn!(turn, "Correction produced nothing, keeping original expression"),
            }
        }

        Ok(Draft {
            plan: Some(plan),
            step,
            review,
            corrected,
        })
    }

    async fn ask<T: StructuredOutput>(
        &self,
        stage: SpanKind,
        instructions: &str,
        input: &str,
        turn_index: usize,
        trace_id: Option<&str>,
    ) -> Result<Option<T>, ProviderError> {
        self.gateway
            .request(GatewayCall {
                stage,
                instructions,
                input,
                model: &self.model,
                effort: self.profile.effort,
                trace_id,
                turn_index,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::NO_HISTORY;
    use crate::test_helpers::*;
    use finqa_core::ReasoningEffort;
    use finqa_telemetry::TelemetryEngine;
    use serde_json::json;

    fn record(questions: &[&str]) -> RawRecord {
        RawRecord::from_value(json!({
            "id": "Single_JKHY/2009/page_28.pdf-3",
            "doc": {
                "pre_text": "jack henry   and associates",
                "post_text": "amounts in thousands",
                "table": {"2009": {"net income": 103102}, "2008": {"net income": 104222}}
            },
            "dialogue": {"conv_questions": questions, "executed_answers": []}
        }))
    }

    fn orchestrator(
        provider: Arc<ScriptedProvider>,
        condition: StudyCondition,
    ) -> ConversationOrchestrator {
        ConversationOrchestrator::new(
            ReasoningGateway::new(provider),
            condition,
            &ModelsConfig::default(),
            Arc::new(PromptSet::builtin()),
        )
    }

    #[tokio::test]
    async fn baseline_single_call_per_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            step_json("103102", false),
            step_json("ans_0 - 104222", false),
        ]));
        let orch = orchestrator(provider.clone(), StudyCondition::MdBaselineMini);

        let state = orch
            .process_record(&record(&["net income 2009?", "change from 2008?"]))
            .await
            .unwrap();

        assert_eq!(provider.call_count(), 2);
        let turns = state.history();
        assert_eq!(turns.len(), 2);
        assert!(turns[0].plan.is_none() && turns[0].review.is_none());
        assert_eq!(turns[0].response, "103,102");
        assert_eq!(turns[1].raw_output, -1120.0);
        assert_eq!(turns[1].response, "-1,120");

        let req = &provider.requests()[0];
        assert_eq!(req.model, "gpt-5-mini");
        assert_eq!(req.reasoning_effort, ReasoningEffort::None);
        assert_eq!(provider.instructions(0), PromptSet::builtin().baseline);
    }

    #[tokio::test]
    async fn payload_carries_history_and_table_format() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            step_json("103102", false),
            step_json("ans_0", false),
        ]));
        let orch = orchestrator(provider.clone(), StudyCondition::JsonBaselineMed);

        orch.process_record(&record(&["first?", "second?"])).await.unwrap();

        let first = provider.payload(0);
        assert!(first.contains("<metadata>ID: Single_JKHY/2009/page_28.pdf-3</metadata>"));
        assert!(first.contains("<pre_text>jack henry and associates</pre_text>"));
        assert!(first.contains(r#"{"2009":{"net income":103102}"#));
        assert!(first.contains(&format!("<history>{NO_HISTORY}</history>")));
        assert!(first.ends_with("<current_question>first?</current_question>"));

        let second = provider.payload(1);
        assert!(second.contains("Question: first?\nAnswer: 103,102 (Numeric: 103102.0)"));
        assert_eq!(provider.requests()[0].model, "gpt-5.2");
        assert_eq!(provider.requests()[0].reasoning_effort, ReasoningEffort::Medium);
    }

    #[tokio::test]
    async fn modular_plans_then_generates() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            plan_json("net income in 2009"),
            step_json("103102", false),
        ]));
        let orch = orchestrator(provider.clone(), StudyCondition::ModularMed);

        let state = orch.process_record(&record(&["net income 2009?"])).await.unwrap();

        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.instructions(0), PromptSet::builtin().planner);
        assert_eq!(provider.instructions(1), PromptSet::builtin().analyst);
        assert!(!provider.payload(0).contains("<plan>"));
        assert!(provider.payload(1).contains("\n<plan>{\"intent\":\"net income in 2009\""));

        let turn = &state.history()[0];
        assert_eq!(turn.plan.as_ref().unwrap().intent, "net income in 2009");
        assert!(turn.review.is_none());
        assert_eq!(turn.raw_output, 103102.0);
    }

    #[tokio::test]
    async fn empty_plan_falls_back_to_sentinel() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            "not a plan".to_string(),
            step_json("1", false),
        ]));
        let orch = orchestrator(provider.clone(), StudyCondition::ModularMini);

        let state = orch.process_record(&record(&["q?"])).await.unwrap();
        let turn = &state.history()[0];
        assert_eq!(turn.plan.as_ref().unwrap().intent, "Error");
        assert!(provider.payload(1).contains("\"intent\":\"Error\""));
        assert_eq!(turn.raw_output, 1.0);
    }

    #[tokio::test]
    async fn empty_generation_falls_back_to_sentinel() {
        let provider = Arc::new(ScriptedProvider::new(vec!["{}"]));
        let orch = orchestrator(provider, StudyCondition::MdBaselineMini);

        let state = orch.process_record(&record(&["q?"])).await.unwrap();
        let turn = &state.history()[0];
        assert_eq!(turn.final_expression, "0");
        assert_eq!(turn.analyst_output.thought.as_deref(), Some("API Failure"));
        assert_eq!(turn.raw_output, 0.0);
        assert_eq!(turn.response, "0");
    }

    #[tokio::test]
    async fn valid_review_skips_correction() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            plan_json("p"),
            step_json("103102", false),
            review_json(true, "looks right"),
        ]));
        let orch = orchestrator(provider.clone(), StudyCondition::ReflectMed);

        let state = orch.process_record(&record(&["q?"])).await.unwrap();
        assert_eq!(provider.call_count(), 3);

        let review_payload = provider.payload(2);
        assert!(review_payload.ends_with("\n<proposed_expression>103102</proposed_expression>"));
        assert!(!review_payload.contains("<plan>"));
        assert_eq!(provider.instructions(2), PromptSet::builtin().reviewer);

        let turn = &state.history()[0];
        assert!(turn.review.as_ref().unwrap().is_valid);
        assert!(!turn.corrected);
        assert!(!turn.review_flagged());
    }

    #[tokio::test]
    async fn flagged_review_replaces_expression() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            plan_json("p"),
            step_json("104222 - 103102", false),
            review_json(false, "subtraction is reversed"),
            step_json("103102 - 104222", false),
        ]));
        let orch = orchestrator(provider.clone(), StudyCondition::ReflectHigh);

        let state = orch.process_record(&record(&["change?"])).await.unwrap();
        assert_eq!(provider.call_count(), 4);

        let retry = provider.payload(3);
        assert!(retry.contains("\n<plan>"));
        assert!(retry.ends_with("\n<feedback>subtraction is reversed</feedback>"));
        assert_eq!(provider.instructions(3), PromptSet::builtin().analyst);

        let turn = &state.history()[0];
        assert!(turn.review_flagged());
        assert!(turn.corrected);
        assert_eq!(turn.final_expression, "103102 - 104222");
        assert_eq!(turn.analyst_output.expression, "103102 - 104222");
        assert_eq!(turn.raw_output, -1120.0);
    }

    #[tokio::test]
    async fn empty_correction_keeps_original() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            plan_json("p"),
            step_json("104222 - 103102", false),
            review_json(false, "reversed"),
            "garbage".to_string(),
        ]));
        let orch = orchestrator(provider.clone(), StudyCondition::ReflectMini);

        let state = orch.process_record(&record(&["change?"])).await.unwrap();
        // One retry only, no second review.
        assert_eq!(provider.call_count(), 4);

        let turn = &state.history()[0];
        assert!(turn.review_flagged());
        assert!(!turn.corrected);
        assert_eq!(turn.final_expression, "104222 - 103102");
        assert_eq!(turn.raw_output, 1120.0);
    }

    #[tokio::test]
    async fn empty_review_means_no_correction() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            plan_json("p"),
            step_json("5", false),
            "nope".to_string(),
        ]));
        let orch = orchestrator(provider.clone(), StudyCondition::ReflectMed);

        let state = orch.process_record(&record(&["q?"])).await.unwrap();
        assert_eq!(provider.call_count(), 3);
        let turn = &state.history()[0];
        assert!(turn.review.is_none());
        assert!(!turn.corrected);
        assert_eq!(turn.raw_output, 5.0);
    }

    #[tokio::test]
    async fn evaluation_failure_stays_in_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            step_json("revenue * 2", false),
            step_json("ans_0 + 7", false),
        ]));
        let orch = orchestrator(provider, StudyCondition::MdBaselineMini);

        let state = orch.process_record(&record(&["q1?", "q2?"])).await.unwrap();
        let turns = state.history();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].raw_output, 0.0);
        assert!(turns[0].response.starts_with("Execution Error: "));
        assert!(turns[0].response.contains("revenue"));
        assert_eq!(turns[1].raw_output, 7.0);
    }

    #[tokio::test]
    async fn percentage_flag_from_final_step() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            step_json("(103102 - 104222) / 104222", true),
        ]));
        let orch = orchestrator(provider, StudyCondition::MdBaselineMini);

        let state = orch.process_record(&record(&["percent change?"])).await.unwrap();
        assert_eq!(state.history()[0].response, "-1.1%");
    }

    #[tokio::test]
    async fn namespace_grows_one_answer_per_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            step_json("10", false),
            step_json("ans_0 * 2", false),
            step_json("ans_2", false),
        ]));
        let orch = orchestrator(provider, StudyCondition::MdBaselineMini);

        let state = orch.process_record(&record(&["a?", "b?", "c?"])).await.unwrap();
        let turns = state.history();
        assert_eq!(turns[1].raw_output, 20.0);
        // Turn 2 only sees ans_0 and ans_1.
        assert!(turns[2].response.starts_with("Execution Error: "));
        assert_eq!(turns[2].raw_output, 0.0);
    }

    #[tokio::test]
    async fn transport_error_aborts_record() {
        let provider = Arc::new(ScriptedProvider::from_results(vec![
            Ok(step_json("1", false)),
            Err(ProviderError::Timeout("slow".into())),
        ]));
        let orch = orchestrator(provider, StudyCondition::MdBaselineMini);

        let err = orch
            .process_record(&record(&["a?", "b?", "c?"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[tokio::test]
    async fn record_without_questions_produces_no_turns() {
        let provider = Arc::new(ScriptedProvider::new(Vec::<String>::new()));
        let orch = orchestrator(provider.clone(), StudyCondition::ReflectHigh);

        let state = orch.process_record(&record(&[])).await.unwrap();
        assert!(state.history().is_empty());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn one_trace_per_record() {
        let telemetry = Arc::new(TelemetryEngine::new());
        let provider = Arc::new(ScriptedProvider::new(vec![
            plan_json("p"),
            step_json("1", false),
            review_json(false, "wrong"),
            step_json("2", false),
            plan_json("p"),
            step_json("ans_0", false),
            review_json(true, "ok"),
        ]));
        let orch = ConversationOrchestrator::new(
            ReasoningGateway::new(provider).with_telemetry(telemetry.clone()),
            StudyCondition::ReflectMini,
            &ModelsConfig::default(),
            Arc::new(PromptSet::builtin()),
        );

        let state = orch.process_record(&record(&["a?", "b?"])).await.unwrap();
        assert_eq!(state.history()[1].raw_output, 2.0);

        let traces = telemetry.traces_for_record("Single_JKHY/2009/page_28.pdf-3");
        assert_eq!(traces.len(), 1);
        let trace = &traces[0];
        assert_eq!(trace.condition, "reflect_mini");
        assert_eq!(trace.spans.len(), 7);
        assert_eq!(trace.count(SpanKind::Plan), 2);
        assert_eq!(trace.count(SpanKind::Correct), 1);
        assert_eq!(trace.spans[6].turn_index, Some(1));
        assert!(trace.ended_at.is_some());
    }

    #[tokio::test]
    async fn interactive_turns_share_state() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            step_json("4", false),
            step_json("ans_0 / 8", true),
        ]));
        let orch = orchestrator(provider, StudyCondition::MdBaselineMini);

        let mut state = orch.start(&record(&[]));
        let first = orch.process_turn(&mut state, "how many?").await.unwrap();
        let second = orch.process_turn(&mut state, "as a share of 8?").await.unwrap();
        orch.finish(&state);

        assert_eq!(first.turn_index, 0);
        assert_eq!(second.turn_index, 1);
        assert_eq!(second.response, "50.0%");
        assert_eq!(state.history().len(), 2);
    }
}
