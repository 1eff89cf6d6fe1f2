pub mod chat_completions;
pub mod gateway;
pub mod observability;
pub mod prompts;

pub use chat_completions::{ChatCompletionsConfig, ChatCompletionsGateway};
pub use gateway::{
    CompletionError, CompletionFuture, CompletionGateway, CompletionRequest, CompletionResponse,
    CompletionTokenUsage,
};
pub use observability::{
    CompletionOperation, CompletionTelemetry, complete_with_telemetry, log_telemetry,
};
pub use prompts::{content_policy_prompt, edit_payload, generation_payload};
