use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A completed question/answer pair kept alongside a session's transcript.
///
/// Only answered requests produce an exchange; stopped and failed requests
/// leave the transcript as their only trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    /// The text the user sent.
    pub user: String,

    /// The reply text.
    pub assistant: String,

    /// The service's source tag for the reply.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,

    /// When the reply was applied.
    #[serde(with = "crate::utils::time::rfc3339")]
    pub answered: OffsetDateTime,
}
