use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    System,
    User,
    Assistant,
}

impl TurnRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered prompt context for one campaign. Index 0 is always the system turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(system_prompt)],
        }
    }

    /// Drops everything after the system turn.
    pub fn reset(&mut self) {
        self.turns.truncate(1);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::assistant(content));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn system_turn(&self) -> &Turn {
        &self.turns[0]
    }

    /// The campaign's brief turn, present once a campaign has started.
    pub fn brief_turn(&self) -> Option<&Turn> {
        self.turns
            .get(1)
            .filter(|turn| turn.role == TurnRole::User)
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Replaces the trailing assistant turn in place, or appends one when the
    /// conversation does not end with an assistant turn.
    pub fn sync_trailing_assistant(&mut self, content: impl Into<String>) {
        let content = content.into();
        match self.turns.last_mut() {
            Some(turn) if turn.role == TurnRole::Assistant => turn.content = content,
            _ => self.turns.push(Turn::assistant(content)),
        }
    }
}
