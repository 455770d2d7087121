use serde::{Deserialize, Serialize};

/// Successful reply from the assistant's chat endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The reply text shown to the user.
    pub response: String,

    /// Which backend path produced the reply (for example `llm`).
    #[serde(default)]
    pub source: String,
}

impl ChatResponse {
    /// Create a response with the given text and source tag.
    pub fn new(response: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            source: source.into(),
        }
    }
}
