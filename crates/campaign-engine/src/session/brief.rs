use serde::{Deserialize, Serialize};

use super::variants::MAX_VARIANTS;
use crate::content::Channel;

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_TONE: &str = "friendly";
pub const DEFAULT_MAX_LENGTH: u32 = 250;
pub const MAX_LENGTH_CEILING: u32 = 1024;

/// A campaign request as collected by the shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignBrief {
    pub prompt: String,
    pub channel: Channel,
    pub language: String,
    pub tone: String,
    pub max_length: u32,
    pub variant_count: usize,
}

impl CampaignBrief {
    pub fn new(prompt: impl Into<String>, channel: Channel) -> Self {
        Self {
            prompt: prompt.into(),
            channel,
            language: DEFAULT_LANGUAGE.to_string(),
            tone: DEFAULT_TONE.to_string(),
            max_length: DEFAULT_MAX_LENGTH,
            variant_count: 1,
        }
    }

    pub fn with_language(mut self, language: impl AsRef<str>) -> Self {
        self.language = non_empty_or(language.as_ref(), DEFAULT_LANGUAGE);
        self
    }

    pub fn with_tone(mut self, tone: impl AsRef<str>) -> Self {
        self.tone = non_empty_or(tone.as_ref(), DEFAULT_TONE);
        self
    }

    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_variant_count(mut self, variant_count: usize) -> Self {
        self.variant_count = variant_count;
        self
    }

    /// Checks the ranges the shell is expected to enforce. Returns a message for the caller.
    pub fn check(&self) -> Result<(), String> {
        if self.prompt.trim().is_empty() {
            return Err("campaign prompt must not be empty".to_string());
        }
        if !(1..=MAX_LENGTH_CEILING).contains(&self.max_length) {
            return Err(format!(
                "maxLength must be between 1 and {MAX_LENGTH_CEILING}"
            ));
        }
        if !(1..=MAX_VARIANTS).contains(&self.variant_count) {
            return Err(format!("variants must be between 1 and {MAX_VARIANTS}"));
        }
        Ok(())
    }
}

fn non_empty_or(value: &str, default: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}
