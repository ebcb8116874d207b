//! The turn pipeline: the heart of FinQA.
//!
//! Each question of a conversation goes through a **Plan → Generate →
//! Review → Correct → Execute** cycle, trimmed to the stages the study
//! condition enables:
//!
//! 1. **Build context** from the raw record (once per record)
//! 2. **Assemble payload** from context, table format, and transcript
//! 3. **Reason** through the condition's stages via the gateway
//! 4. **Execute** the final expression in the sandboxed evaluator
//! 5. **Register** the turn so later questions can reference `ans_N`

pub mod context;
pub mod gateway;
pub mod orchestrator;
pub mod prompts;
pub mod state;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{base_payload, build_context, normalize_text};
pub use gateway::{GatewayCall, ReasoningGateway, parse_structured};
pub use orchestrator::ConversationOrchestrator;
pub use prompts::PromptSet;
pub use state::{ConversationState, NO_HISTORY};
