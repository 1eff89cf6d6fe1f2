use schemars::{JsonSchema, schema_for};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

use super::candidate::{ButtonKind, CandidateButton, CandidateMessage};
use super::channel::Channel;

/// WhatsApp business template output.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WhatsAppContentContract {
    #[serde(default)]
    pub header: Option<String>,
    #[schemars(length(min = 1))]
    pub body: String,
    #[serde(default)]
    pub footer: Option<String>,
    #[serde(default)]
    #[schemars(length(max = 3))]
    pub buttons: Vec<ButtonContract>,
    #[serde(default)]
    pub placeholders: Vec<String>,
    #[serde(deserialize_with = "deserialize_length")]
    #[schemars(with = "u32")]
    pub length: u32,
    #[serde(default)]
    pub variant_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ButtonContract {
    #[serde(rename = "type")]
    pub kind: ButtonKind,
    pub text: String,
    #[serde(default)]
    pub placeholder: Option<String>,
}

/// Plain-text output shared by SMS and Viber.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlainContentContract {
    #[schemars(length(min = 1))]
    pub body: String,
    #[serde(default)]
    pub placeholders: Vec<String>,
    #[serde(deserialize_with = "deserialize_length")]
    #[schemars(with = "u32")]
    pub length: u32,
    #[serde(default)]
    pub variant_id: Option<String>,
}

/// Accepts any whole number, so `17.0` reads as `17`.
fn deserialize_length<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Number::deserialize(deserializer)?;
    let whole = match (number.as_u64(), number.as_f64()) {
        (Some(value), _) => Some(value),
        (None, Some(value)) if value >= 0.0 && value.fract() == 0.0 => Some(value as u64),
        _ => None,
    };

    whole
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| D::Error::custom(format!("length must be a whole character count, got {number}")))
}

pub fn output_schema(channel: Channel) -> Value {
    match channel {
        Channel::WhatsApp => serde_json::to_value(schema_for!(WhatsAppContentContract))
            .expect("whatsapp content schema should be serializable"),
        Channel::Sms | Channel::Viber => serde_json::to_value(schema_for!(PlainContentContract))
            .expect("plain content schema should be serializable"),
    }
}

impl From<WhatsAppContentContract> for CandidateMessage {
    fn from(contract: WhatsAppContentContract) -> Self {
        Self {
            header: contract.header,
            body: contract.body,
            footer: contract.footer,
            buttons: contract
                .buttons
                .into_iter()
                .map(|button| CandidateButton {
                    kind: button.kind,
                    text: button.text,
                    placeholder: button.placeholder,
                })
                .collect(),
            placeholders: contract.placeholders,
            length: contract.length,
            variant_id: contract.variant_id,
        }
    }
}

impl From<PlainContentContract> for CandidateMessage {
    fn from(contract: PlainContentContract) -> Self {
        Self {
            header: None,
            body: contract.body,
            footer: None,
            buttons: Vec::new(),
            placeholders: contract.placeholders,
            length: contract.length,
            variant_id: contract.variant_id,
        }
    }
}
