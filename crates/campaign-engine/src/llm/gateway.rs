use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::Turn;

pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CompletionResponse, CompletionError>> + Send + 'a>>;

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub turns: Vec<Turn>,
    pub count: usize,
}

impl CompletionRequest {
    pub fn new(turns: &[Turn], count: usize) -> Self {
        Self {
            turns: turns.to_vec(),
            count,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionTokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub model: String,
    pub provider_request_id: Option<String>,
    /// Raw, unvalidated completion texts in sample order.
    pub completions: Vec<String>,
    pub usage: Option<CompletionTokenUsage>,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion provider request timed out")]
    Timeout,
    #[error("completion provider is unreachable: {0}")]
    Network(String),
    #[error("completion provider quota exhausted: {0}")]
    Quota(String),
    #[error("completion provider rejected the request: {0}")]
    MalformedRequest(String),
    #[error("completion provider request failed: {0}")]
    ProviderFailure(String),
    #[error("completion provider returned an invalid payload: {0}")]
    InvalidProviderPayload(String),
}

impl CompletionError {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Network(_) => "network",
            Self::Quota(_) => "quota",
            Self::MalformedRequest(_) => "malformed_request",
            Self::ProviderFailure(_) => "provider_failure",
            Self::InvalidProviderPayload(_) => "invalid_provider_payload",
        }
    }
}

/// The single external call surface. One invocation is exactly one upstream call;
/// implementations must not retry. `count` completions are sampled independently
/// from the same turn prefix.
pub trait CompletionGateway: Send + Sync {
    fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a>;
}
