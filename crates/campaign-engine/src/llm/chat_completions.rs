use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use super::gateway::{
    CompletionError, CompletionFuture, CompletionGateway, CompletionRequest, CompletionResponse,
    CompletionTokenUsage,
};
use crate::config::{
    ConfigError, optional_trimmed_env, parse_f32_env, parse_u32_env, parse_u64_env,
    require_non_empty_env,
};
use crate::session::Turn;

const DEFAULT_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const MAX_TEMPERATURE: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct ChatCompletionsConfig {
    pub chat_completions_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_ms: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ChatCompletionsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = require_non_empty_env("LLM_API_KEY")?;
        let chat_completions_url = optional_trimmed_env("LLM_CHAT_COMPLETIONS_URL")
            .unwrap_or_else(|| DEFAULT_CHAT_COMPLETIONS_URL.to_string());
        validate_endpoint(&chat_completions_url)?;

        let temperature = parse_f32_env("LLM_TEMPERATURE", DEFAULT_TEMPERATURE)?;
        if !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(ConfigError::InvalidConfiguration(format!(
                "LLM_TEMPERATURE must be between 0 and {MAX_TEMPERATURE}"
            )));
        }

        Ok(Self {
            chat_completions_url,
            api_key,
            model: optional_trimmed_env("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout_ms: parse_u64_env("LLM_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
            max_tokens: parse_u32_env("LLM_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
            temperature,
        })
    }
}

fn validate_endpoint(raw: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(raw).map_err(|err| {
        ConfigError::InvalidConfiguration(format!("LLM_CHAT_COMPLETIONS_URL is invalid: {err}"))
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(ConfigError::InvalidConfiguration(
            "LLM_CHAT_COMPLETIONS_URL must start with http:// or https://".to_string(),
        )),
    }
}

/// OpenAI-compatible chat completions client. Sends `n = count` in a single request.
#[derive(Clone)]
pub struct ChatCompletionsGateway {
    client: reqwest::Client,
    config: ChatCompletionsConfig,
}

impl ChatCompletionsGateway {
    pub fn new(config: ChatCompletionsConfig) -> Result<Self, ConfigError> {
        validate_endpoint(&config.chat_completions_url)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn send(&self, request: &CompletionRequest) -> Result<CompletionResponse, CompletionError> {
        if request.count == 0 {
            return Err(CompletionError::MalformedRequest(
                "completion_count_must_be_positive".to_string(),
            ));
        }

        let request_body = json!({
            "model": self.config.model,
            "messages": request.turns.iter().map(ChatMessage::from).collect::<Vec<_>>(),
            "n": request.count,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "response_format": {
                "type": "json_object"
            }
        });

        let response = self
            .client
            .post(&self.config.chat_completions_url)
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    CompletionError::Timeout
                } else {
                    CompletionError::Network("request_unavailable".to_string())
                }
            })?;

        let status = response.status();
        let header_request_id = header_request_id(response.headers());
        let body = response.text().await.map_err(|err| {
            if err.is_timeout() {
                CompletionError::Timeout
            } else {
                CompletionError::InvalidProviderPayload("response_body_read_failed".to_string())
            }
        })?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        let parsed: ChatCompletionsSuccessResponse = serde_json::from_str(&body).map_err(|_| {
            CompletionError::InvalidProviderPayload("response_json_parse_failed".to_string())
        })?;

        if parsed.choices.len() != request.count {
            return Err(CompletionError::InvalidProviderPayload(format!(
                "expected {} choices, received {}",
                request.count,
                parsed.choices.len()
            )));
        }

        let mut choices = parsed.choices;
        choices.sort_by_key(|choice| choice.index.unwrap_or(u32::MAX));

        let completions = choices
            .into_iter()
            .map(|choice| raw_choice_text(choice.message.content))
            .collect::<Vec<_>>();

        Ok(CompletionResponse {
            model: parsed.model.unwrap_or_else(|| self.config.model.clone()),
            provider_request_id: header_request_id.or(parsed.id),
            completions,
            usage: parsed.usage.map(|usage| CompletionTokenUsage {
                prompt_tokens: clamp_u64_to_u32(usage.prompt_tokens.unwrap_or(0)),
                completion_tokens: clamp_u64_to_u32(usage.completion_tokens.unwrap_or(0)),
                total_tokens: clamp_u64_to_u32(usage.total_tokens.unwrap_or(0)),
            }),
        })
    }
}

impl CompletionGateway for ChatCompletionsGateway {
    fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(async move { self.send(&request).await })
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a Turn> for ChatMessage<'a> {
    fn from(turn: &'a Turn) -> Self {
        Self {
            role: turn.role.as_str(),
            content: turn.content.as_str(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsSuccessResponse {
    id: Option<String>,
    model: Option<String>,
    choices: Vec<ChatCompletionsChoice>,
    usage: Option<ChatCompletionsUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsChoice {
    index: Option<u32>,
    message: ChatCompletionsMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsMessage {
    #[serde(default)]
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

fn status_error(status: StatusCode, body: &str) -> CompletionError {
    let reason = format!(
        "status={} code={}",
        status.as_u16(),
        parse_provider_error_code(body)
    );

    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => CompletionError::Timeout,
        StatusCode::PAYMENT_REQUIRED | StatusCode::TOO_MANY_REQUESTS => {
            CompletionError::Quota(reason)
        }
        StatusCode::BAD_REQUEST
        | StatusCode::NOT_FOUND
        | StatusCode::PAYLOAD_TOO_LARGE
        | StatusCode::UNPROCESSABLE_ENTITY => CompletionError::MalformedRequest(reason),
        _ => CompletionError::ProviderFailure(reason),
    }
}

fn header_request_id(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

fn parse_provider_error_code(body: &str) -> String {
    #[derive(Deserialize)]
    struct ProviderErrorEnvelope {
        error: Option<ProviderErrorDetails>,
    }

    #[derive(Deserialize)]
    struct ProviderErrorDetails {
        code: Option<Value>,
        #[serde(rename = "type")]
        kind: Option<String>,
    }

    let Some(details) = serde_json::from_str::<ProviderErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
    else {
        return "unknown".to_string();
    };

    match details.code {
        Some(Value::String(code)) => code,
        Some(Value::Number(code)) => code.to_string(),
        _ => details.kind.unwrap_or_else(|| "unknown".to_string()),
    }
}

/// A refused or empty choice becomes empty text so it fails validation on its
/// own slot instead of failing its siblings.
fn raw_choice_text(content: Value) -> String {
    match content {
        Value::String(raw) => raw,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn clamp_u64_to_u32(value: u64) -> u32 {
    value.min(u32::MAX as u64) as u32
}
