use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const WHATSAPP_MAX_BODY_CHARS: usize = 1024;
const SMS_MAX_BODY_CHARS: usize = 1024;
const SMS_SOFT_BODY_CHARS: usize = 160;
const VIBER_MAX_BODY_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    WhatsApp,
    Sms,
    Viber,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::WhatsApp, Channel::Sms, Channel::Viber];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WhatsApp => "whatsapp",
            Self::Sms => "sms",
            Self::Viber => "viber",
        }
    }

    /// Hard ceiling on body characters. Bodies above it are rejected, never truncated.
    pub const fn max_body_chars(self) -> usize {
        match self {
            Self::WhatsApp => WHATSAPP_MAX_BODY_CHARS,
            Self::Sms => SMS_MAX_BODY_CHARS,
            Self::Viber => VIBER_MAX_BODY_CHARS,
        }
    }

    pub const fn soft_body_chars(self) -> Option<usize> {
        match self {
            Self::Sms => Some(SMS_SOFT_BODY_CHARS),
            Self::WhatsApp | Self::Viber => None,
        }
    }

    /// Only WhatsApp templates carry header, footer and buttons.
    pub const fn supports_rich_layout(self) -> bool {
        matches!(self, Self::WhatsApp)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported channel: {0}")]
pub struct UnknownChannel(pub String);

impl FromStr for Channel {
    type Err = UnknownChannel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "whatsapp" => Ok(Self::WhatsApp),
            "sms" => Ok(Self::Sms),
            "viber" => Ok(Self::Viber),
            _ => Err(UnknownChannel(value.to_string())),
        }
    }
}
