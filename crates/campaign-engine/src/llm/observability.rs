use std::time::{Duration, Instant};

use tracing::{info, warn};
use uuid::Uuid;

use super::gateway::{CompletionError, CompletionGateway, CompletionRequest, CompletionResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOperation {
    Generate,
    Edit,
}

impl CompletionOperation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generate => "generate",
            Self::Edit => "edit",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionTelemetry {
    pub operation: &'static str,
    pub requested_count: usize,
    pub outcome: &'static str,
    pub latency_ms: u64,
    pub model: Option<String>,
    pub provider_request_id: Option<String>,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
    pub error_type: Option<&'static str>,
}

pub async fn complete_with_telemetry(
    gateway: &dyn CompletionGateway,
    operation: CompletionOperation,
    request: CompletionRequest,
) -> (
    Result<CompletionResponse, CompletionError>,
    CompletionTelemetry,
) {
    let requested_count = request.count;
    let started_at = Instant::now();
    let result = gateway.complete(request).await;
    let telemetry = telemetry_for_result(
        operation,
        requested_count,
        started_at.elapsed(),
        &result,
    );
    (result, telemetry)
}

pub fn log_telemetry(session_id: Uuid, telemetry: &CompletionTelemetry) {
    match telemetry.error_type {
        None => info!(
            session_id = %session_id,
            operation = telemetry.operation,
            requested_count = telemetry.requested_count,
            outcome = telemetry.outcome,
            latency_ms = telemetry.latency_ms,
            model = telemetry.model.as_deref().unwrap_or("unknown"),
            provider_request_id = telemetry.provider_request_id.as_deref().unwrap_or(""),
            prompt_tokens = telemetry.prompt_tokens,
            completion_tokens = telemetry.completion_tokens,
            total_tokens = telemetry.total_tokens,
            "completion gateway call finished"
        ),
        Some(error_type) => warn!(
            session_id = %session_id,
            operation = telemetry.operation,
            requested_count = telemetry.requested_count,
            outcome = telemetry.outcome,
            latency_ms = telemetry.latency_ms,
            error_type,
            "completion gateway call failed"
        ),
    }
}

fn telemetry_for_result(
    operation: CompletionOperation,
    requested_count: usize,
    latency: Duration,
    result: &Result<CompletionResponse, CompletionError>,
) -> CompletionTelemetry {
    let latency_ms = duration_to_millis(latency);
    match result {
        Ok(response) => {
            let usage = response.usage.as_ref();
            CompletionTelemetry {
                operation: operation.as_str(),
                requested_count,
                outcome: "success",
                latency_ms,
                model: Some(response.model.clone()),
                provider_request_id: response.provider_request_id.clone(),
                prompt_tokens: usage.map(|usage| usage.prompt_tokens),
                completion_tokens: usage.map(|usage| usage.completion_tokens),
                total_tokens: usage.map(|usage| usage.total_tokens),
                error_type: None,
            }
        }
        Err(err) => CompletionTelemetry {
            operation: operation.as_str(),
            requested_count,
            outcome: "error",
            latency_ms,
            model: None,
            provider_request_id: None,
            prompt_tokens: None,
            completion_tokens: None,
            total_tokens: None,
            error_type: Some(err.kind()),
        },
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    duration.as_millis().min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{CompletionOperation, telemetry_for_result};
    use crate::llm::{CompletionError, CompletionResponse, CompletionTokenUsage};

    #[test]
    fn success_telemetry_carries_usage() {
        let result = Ok(CompletionResponse {
            model: "gpt-4o".to_string(),
            provider_request_id: Some("req-1".to_string()),
            completions: vec!["{}".to_string(), "{}".to_string()],
            usage: Some(CompletionTokenUsage {
                prompt_tokens: 120,
                completion_tokens: 80,
                total_tokens: 200,
            }),
        });

        let telemetry = telemetry_for_result(
            CompletionOperation::Generate,
            2,
            Duration::from_millis(42),
            &result,
        );

        assert_eq!(telemetry.operation, "generate");
        assert_eq!(telemetry.outcome, "success");
        assert_eq!(telemetry.latency_ms, 42);
        assert_eq!(telemetry.total_tokens, Some(200));
        assert!(telemetry.error_type.is_none());
    }

    #[test]
    fn failure_telemetry_labels_error_kind() {
        let result = Err(CompletionError::Quota("status=429 code=rate_limit".to_string()));

        let telemetry =
            telemetry_for_result(CompletionOperation::Edit, 1, Duration::from_millis(5), &result);

        assert_eq!(telemetry.operation, "edit");
        assert_eq!(telemetry.outcome, "error");
        assert_eq!(telemetry.error_type, Some("quota"));
        assert!(telemetry.model.is_none());
    }
}
