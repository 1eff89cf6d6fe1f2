use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const FALLBACK_BODY: &str =
    "Sorry, I can only provide campaign content for business messaging. Please revise your prompt.";
pub const FALLBACK_LENGTH: u32 = 93;

pub const MAX_WHATSAPP_BUTTONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ButtonKind {
    Url,
    QuickReply,
    Call,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateButton {
    #[serde(rename = "type")]
    pub kind: ButtonKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// One validated message draft. WhatsApp-only fields stay empty for SMS and Viber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<CandidateButton>,
    #[serde(default)]
    pub placeholders: Vec<String>,
    pub length: u32,
    #[serde(default)]
    pub variant_id: Option<String>,
}

impl CandidateMessage {
    /// The fixed safe-refusal content used whenever model output cannot be trusted.
    pub fn fallback() -> Self {
        Self {
            header: None,
            body: FALLBACK_BODY.to_string(),
            footer: None,
            buttons: Vec::new(),
            placeholders: Vec::new(),
            length: FALLBACK_LENGTH,
            variant_id: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }

    pub fn body_chars(&self) -> usize {
        self.body.chars().count()
    }

    /// JSON form recorded as assistant turn content and quoted back in edit payloads.
    pub fn to_turn_content(&self) -> String {
        self.to_value().to_string()
    }

    /// Encoding of a plain-data struct with string keys; serialization cannot fail.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("candidate message should serialize")
    }
}
