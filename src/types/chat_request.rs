use serde::{Deserialize, Serialize};

/// Body of a request to the assistant's chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's text, already trimmed.
    pub message: String,
}

impl ChatRequest {
    /// Create a request carrying `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
