//! Reasoning gateway: the only path from the pipeline to a model.
//!
//! Every call sends the stage's instructions as the system message and the
//! assembled payload as the user message, constrained to the target type's
//! JSON schema. Transport and authentication failures are errors; a reply
//! that does not parse into the target type is an empty result (`None`).

use finqa_core::provider::Usage;
use finqa_core::{
    Message, Provider, ProviderError, ProviderRequest, ReasoningEffort, ResponseFormat,
    StructuredOutput,
};
use finqa_telemetry::{Span, SpanKind, TelemetryEngine};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

/// One structured request.
#[derive(Debug, Clone, Copy)]
pub struct GatewayCall<'a> {
    pub stage: SpanKind,
    pub instructions: &'a str,
    pub input: &'a str,
    pub model: &'a str,
    pub effort: ReasoningEffort,
    /// Trace the call is recorded in, when telemetry is on.
    pub trace_id: Option<&'a str>,
    pub turn_index: usize,
}

pub struct ReasoningGateway {
    provider: Arc<dyn Provider>,
    telemetry: Option<Arc<TelemetryEngine>>,
    max_tokens: Option<u32>,
}

impl ReasoningGateway {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            telemetry: None,
            max_tokens: None,
        }
    }

    /// Record a span per call in `telemetry`.
    pub fn with_telemetry(mut self, telemetry: Arc<TelemetryEngine>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Cap the completion length of every call.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn telemetry(&self) -> Option<&Arc<TelemetryEngine>> {
        self.telemetry.as_ref()
    }

    /// Open a trace for one record. `None` when telemetry is off.
    pub fn start_trace(&self, record_id: &str, condition: &str) -> Option<String> {
        self.telemetry
            .as_ref()
            .map(|t| t.start_trace(record_id, condition))
    }

    pub fn end_trace(&self, trace_id: Option<&str>) {
        if let (Some(telemetry), Some(id)) = (&self.telemetry, trace_id) {
            telemetry.end_trace(id);
        }
    }

    /// Request a `T` from the model.
    pub async fn request<T: StructuredOutput>(
        &self,
        call: GatewayCall<'_>,
    ) -> Result<Option<T>, ProviderError> {
        let request = ProviderRequest {
            model: call.model.to_string(),
            messages: vec![
                Message::system(call.instructions),
                Message::user(call.input),
            ],
            max_tokens: self.max_tokens,
            reasoning_effort: call.effort,
            response_format: Some(ResponseFormat {
                name: T::NAME.to_string(),
                schema: T::json_schema(),
            }),
        };

        debug!(
            stage = %call.stage,
            model = call.model,
            payload_chars = call.input.len(),
            "Gateway request"
        );

        let mut span = Span::new(call.stage, call.model).with_turn(call.turn_index);

        let response = match self.provider.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                span.end(false);
                self.record(call.trace_id, span);
                return Err(e);
            }
        };

        if let Some(usage) = response.usage {
            let model = if response.model.is_empty() {
                call.model
            } else {
                response.model.as_str()
            };
            self.record_usage(&mut span, model, usage);
        }

        let parsed = parse_structured::<T>(&response.message.content);
        if parsed.is_none() {
            warn!(
                stage = %call.stage,
                turn = call.turn_index,
                target = T::NAME,
                "Gateway returned no usable result"
            );
        }

        span.end(parsed.is_some());
        self.record(call.trace_id, span);
        Ok(parsed)
    }

    fn record_usage(&self, span: &mut Span, model: &str, usage: Usage) {
        let cost = self.telemetry.as_ref().map_or(0.0, |t| {
            t.compute_cost(model, usage.prompt_tokens, usage.completion_tokens)
        });
        span.record_tokens(usage.prompt_tokens, usage.completion_tokens, cost);
    }

    fn record(&self, trace_id: Option<&str>, span: Span) {
        if let (Some(telemetry), Some(id)) = (&self.telemetry, trace_id)
            && let Err(e) = telemetry.record_span(id, span)
        {
            warn!("Failed to record gateway span: {e}");
        }
    }
}

/// Parse a model reply into `T`.
///
/// Surrounding whitespace and a Markdown code fence are tolerated. An empty
/// or malformed reply is `None`.
pub fn parse_structured<T: DeserializeOwned>(content: &str) -> Option<T> {
    let body = strip_code_fence(content.trim());
    if body.is_empty() {
        debug!("Empty gateway reply");
        return None;
    }

    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, reply_chars = body.len(), "Gateway reply did not parse");
            None
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (```json) on the opening line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use finqa_core::{AnalysisPlan, AnalyticStep, ReviewResult, Role};

    fn call<'a>(stage: SpanKind, trace_id: Option<&'a str>) -> GatewayCall<'a> {
        GatewayCall {
            stage,
            instructions: "You are an analyst.",
            input: "<context></context>",
            model: "gpt-5-mini",
            effort: ReasoningEffort::Medium,
            trace_id,
            turn_index: 0,
        }
    }

    #[test]
    fn parses_plain_and_fenced_replies() {
        let plain: Option<AnalyticStep> =
            parse_structured(r#"{"expression": "1 + 2", "is_percentage": false}"#);
        assert_eq!(plain.unwrap().expression, "1 + 2");

        let fenced: Option<AnalyticStep> =
            parse_structured("```json\n{\"expression\": \"ans_0 / 2\"}\n```");
        assert_eq!(fenced.unwrap().expression, "ans_0 / 2");

        let bare_fence: Option<AnalyticStep> =
            parse_structured("```\n{\"expression\": \"3\"}\n```  ");
        assert_eq!(bare_fence.unwrap().expression, "3");
    }

    #[test]
    fn malformed_replies_are_empty() {
        assert!(parse_structured::<AnalyticStep>("").is_none());
        assert!(parse_structured::<AnalyticStep>("   ").is_none());
        assert!(parse_structured::<AnalyticStep>("I cannot help with that").is_none());
        assert!(parse_structured::<AnalyticStep>(r#"{"thought": "no expression"}"#).is_none());
        assert!(parse_structured::<ReviewResult>(r#"{"is_valid": "yes"}"#).is_none());
    }

    #[tokio::test]
    async fn request_sends_schema_and_messages() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"intent": "find revenue", "data_points": [], "execution_steps": [], "is_percentage_required": false}"#,
        ]));
        let gateway = ReasoningGateway::new(provider.clone()).with_max_tokens(Some(2048));

        let plan: Option<AnalysisPlan> =
            gateway.request(call(SpanKind::Plan, None)).await.unwrap();
        assert_eq!(plan.unwrap().intent, "find revenue");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.model, "gpt-5-mini");
        assert_eq!(req.max_tokens, Some(2048));
        assert_eq!(req.reasoning_effort, ReasoningEffort::Medium);
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[0].content, "You are an analyst.");
        assert_eq!(req.messages[1].role, Role::User);
        assert_eq!(req.response_format.as_ref().unwrap().name, "analysis_plan");
    }

    #[tokio::test]
    async fn unparseable_reply_is_none_not_error() {
        let provider = Arc::new(ScriptedProvider::new(vec!["not json"]));
        let gateway = ReasoningGateway::new(provider);
        let step: Option<AnalyticStep> =
            gateway.request(call(SpanKind::Generate, None)).await.unwrap();
        assert!(step.is_none());
    }

    #[tokio::test]
    async fn transport_failure_is_error() {
        let provider = Arc::new(ScriptedProvider::from_results(vec![Err(
            ProviderError::Network("connection refused".into()),
        )]));
        let gateway = ReasoningGateway::new(provider);
        let err = gateway
            .request::<AnalyticStep>(call(SpanKind::Generate, None))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
    }

    #[tokio::test]
    async fn spans_recorded_per_call() {
        let telemetry = Arc::new(TelemetryEngine::new());
        let provider = Arc::new(ScriptedProvider::new(vec![
            r#"{"expression": "5"}"#,
            "garbage",
        ]));
        let gateway = ReasoningGateway::new(provider).with_telemetry(telemetry.clone());

        let trace_id = gateway.start_trace("rec-1", "modular_mini").unwrap();
        let first: Option<AnalyticStep> = gateway
            .request(call(SpanKind::Generate, Some(&trace_id)))
            .await
            .unwrap();
        let second: Option<ReviewResult> = gateway
            .request(call(SpanKind::Review, Some(&trace_id)))
            .await
            .unwrap();
        gateway.end_trace(Some(&trace_id));

        assert!(first.is_some());
        assert!(second.is_none());

        let trace = telemetry.get_trace(&trace_id).unwrap();
        assert_eq!(trace.spans.len(), 2);
        assert_eq!(trace.spans[0].kind, SpanKind::Generate);
        assert_eq!(trace.spans[0].success, Some(true));
        assert_eq!(trace.spans[1].success, Some(false));
        assert_eq!(trace.spans[0].input_tokens, Some(10));
        assert!(trace.total_cost() > 0.0);
        assert!(trace.ended_at.is_some());
    }

    #[test]
    fn no_trace_without_telemetry() {
        let gateway = ReasoningGateway::new(Arc::new(ScriptedProvider::new(Vec::<String>::new())));
        assert!(gateway.start_trace("rec-1", "c").is_none());
        gateway.end_trace(None);
        assert_eq!(gateway.provider_name(), "scripted");
    }
}
