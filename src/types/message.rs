use serde::{Deserialize, Serialize};
use std::fmt;

/// The author of a message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Text typed by the user.
    User,

    /// Text produced by the assistant, including the pending placeholder.
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single entry in a session transcript.
///
/// The role never changes. The content only changes while `pending` is set,
/// which marks the placeholder standing in for a reply still being produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote the message.
    pub role: Role,

    /// The message text.
    pub content: String,

    /// Whether this is a placeholder awaiting its final text.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
}

impl Message {
    /// Create a finished message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            pending: false,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a finished assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a pending assistant placeholder with the given text.
    pub fn placeholder(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            pending: true,
        }
    }

    /// True for a pending assistant placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.pending && self.role == Role::Assistant
    }
}
