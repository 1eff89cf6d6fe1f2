use std::sync::LazyLock;

use jsonschema::JSONSchema;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::candidate::CandidateMessage;
use super::channel::Channel;
use super::contracts::{PlainContentContract, WhatsAppContentContract, output_schema};

const RICH_LAYOUT_FIELDS: [&str; 3] = ["header", "footer", "buttons"];

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("channel output is not valid json: {0}")]
    MalformedOutput(#[from] serde_json::Error),
    #[error("channel output failed the {channel} contract: {errors:?}")]
    SchemaViolation {
        channel: Channel,
        errors: Vec<String>,
    },
    #[error("{channel} output schema failed to compile: {message}")]
    SchemaCompile { channel: Channel, message: String },
}

impl ValidationError {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedOutput(_) => "malformed_output",
            Self::SchemaViolation { .. } => "schema_violation",
            Self::SchemaCompile { .. } => "schema_compile",
        }
    }

    fn violation(channel: Channel, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            channel,
            errors: vec![message.into()],
        }
    }
}

/// Parses raw model text and accepts it only if it satisfies the channel contract.
/// Nothing is repaired or coerced.
pub fn validate_output(channel: Channel, raw_text: &str) -> Result<CandidateMessage, ValidationError> {
    let payload: Value = serde_json::from_str(raw_text)?;
    validate_output_value(channel, &payload)
}

pub fn validate_output_value(
    channel: Channel,
    payload: &Value,
) -> Result<CandidateMessage, ValidationError> {
    let validator = validator_for_channel(channel)?;

    if let Err(validation_errors) = validator.validate(payload) {
        let errors = validation_errors
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(ValidationError::SchemaViolation { channel, errors });
    }

    if !channel.supports_rich_layout() {
        reject_rich_layout_fields(channel, payload)?;
    }

    let candidate = parse_candidate(channel, payload.clone())?;

    if candidate.body.trim().is_empty() {
        return Err(ValidationError::violation(channel, "body must not be blank"));
    }

    let body_chars = candidate.body_chars();
    if body_chars > channel.max_body_chars() {
        return Err(ValidationError::violation(
            channel,
            format!(
                "body has {body_chars} characters; {channel} allows at most {}",
                channel.max_body_chars()
            ),
        ));
    }

    if let Some(soft_limit) = channel.soft_body_chars()
        && body_chars > soft_limit
    {
        debug!(
            channel = channel.as_str(),
            body_chars, soft_limit, "accepted body above channel soft length target"
        );
    }

    Ok(candidate)
}

fn parse_candidate(channel: Channel, payload: Value) -> Result<CandidateMessage, ValidationError> {
    let parsed = match channel {
        Channel::WhatsApp => {
            serde_json::from_value::<WhatsAppContentContract>(payload).map(CandidateMessage::from)
        }
        Channel::Sms | Channel::Viber => {
            serde_json::from_value::<PlainContentContract>(payload).map(CandidateMessage::from)
        }
    };

    parsed.map_err(|err| ValidationError::violation(channel, err.to_string()))
}

fn reject_rich_layout_fields(channel: Channel, payload: &Value) -> Result<(), ValidationError> {
    let errors = RICH_LAYOUT_FIELDS
        .iter()
        .filter(|field| match payload.get(**field) {
            None | Some(Value::Null) => false,
            Some(Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        })
        .map(|field| format!("{field} is not supported on {channel}"))
        .collect::<Vec<_>>();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::SchemaViolation { channel, errors })
    }
}

static WHATSAPP_VALIDATOR: LazyLock<Result<JSONSchema, String>> = LazyLock::new(|| {
    JSONSchema::compile(&output_schema(Channel::WhatsApp)).map_err(|err| err.to_string())
});

static PLAIN_CONTENT_VALIDATOR: LazyLock<Result<JSONSchema, String>> = LazyLock::new(|| {
    JSONSchema::compile(&output_schema(Channel::Sms)).map_err(|err| err.to_string())
});

fn validator_for_channel(channel: Channel) -> Result<&'static JSONSchema, ValidationError> {
    let validator_result = match channel {
        Channel::WhatsApp => &*WHATSAPP_VALIDATOR,
        Channel::Sms | Channel::Viber => &*PLAIN_CONTENT_VALIDATOR,
    };

    validator_result
        .as_ref()
        .map_err(|message| ValidationError::SchemaCompile {
            channel,
            message: message.clone(),
        })
}
