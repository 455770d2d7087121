use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

use crate::types::{Exchange, Message, Role};

/// Name given to every session until its first user message arrives.
pub const DEFAULT_SESSION_NAME: &str = "New Chat";

/// Longest name, in characters, taken verbatim from the first user message.
const MAX_NAME_CHARS: usize = 40;

/// Opaque, time-based identifier of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an existing identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier derived from a millisecond timestamp.
    pub fn from_millis(millis: i64) -> Self {
        Self(millis.to_string())
    }

    /// The identifier's millisecond value, when it has one.
    pub fn millis(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A named, ordered conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique, immutable identifier.
    pub id: SessionId,

    /// Display name.
    pub name: String,

    /// Transcript in the order messages were appended.
    pub messages: Vec<Message>,

    /// Creation time.
    #[serde(with = "crate::utils::time::rfc3339")]
    pub created: OffsetDateTime,

    /// Record of answered exchanges.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exchanges: Vec<Exchange>,
}

impl Session {
    /// Create an empty session named [`DEFAULT_SESSION_NAME`].
    pub fn new(id: SessionId, created: OffsetDateTime) -> Self {
        Self {
            id,
            name: DEFAULT_SESSION_NAME.to_string(),
            messages: Vec::new(),
            created,
            exchanges: Vec::new(),
        }
    }

    /// Number of user messages in the transcript.
    pub fn user_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::User).count()
    }

    /// Index of the pending placeholder, if the session has one.
    pub fn pending_index(&self) -> Option<usize> {
        self.messages.iter().position(Message::is_placeholder)
    }

    /// True when the transcript holds a pending placeholder.
    pub fn has_pending(&self) -> bool {
        self.pending_index().is_some()
    }
}

/// Session name derived from the first user message.
///
/// Text longer than 40 characters is cut to 40 characters followed by `…`.
pub fn session_name_from(text: &str) -> String {
    if text.chars().count() > MAX_NAME_CHARS {
        let mut name: String = text.chars().take(MAX_NAME_CHARS).collect();
        name.push('…');
        name
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn short_names_are_kept() {
        assert_eq!(session_name_from("Forecast Q3 sales"), "Forecast Q3 sales");
        let forty = "a".repeat(40);
        assert_eq!(session_name_from(&forty), forty);
    }

    #[test]
    fn long_names_are_truncated() {
        let text = "x".repeat(60);
        let name = session_name_from(&text);
        assert_eq!(name, format!("{}…", "x".repeat(40)));
        assert_eq!(name.chars().count(), 41);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let text = "é".repeat(45);
        let name = session_name_from(&text);
        assert_eq!(name.chars().count(), 41);
        assert!(name.starts_with(&"é".repeat(40)));
    }

    #[test]
    fn session_round_trips_through_json() {
        let mut session = Session::new(
            SessionId::from_millis(1_714_564_800_000),
            datetime!(2024-05-01 12:00:00.123 UTC),
        );
        session.messages.push(Message::user("hi"));
        session.messages.push(Message::placeholder("🤖 Thinking."));
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains(r#""id":"1714564800000""#));
        assert!(json.contains(r#""created":"2024-05-01T12:00:00.123Z""#));
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
        assert_eq!(back.pending_index(), Some(1));
    }
}
