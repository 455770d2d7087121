//! In-memory session list plus the identifier of the session being viewed.
//!
//! Every mutating operation writes the full list back to the store before it
//! returns. A failed write is logged and otherwise ignored; the in-memory list
//! remains authoritative for the rest of the process.

use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::store::SessionStore;
use crate::types::{Exchange, Message, Role, Session, SessionId, session_name_from};
use crate::utils::unix_millis;

/// Final text for placeholders that a previous process left pending.
pub const INTERRUPTED_MESSAGE: &str = "⚠️ Response interrupted before completion.";

/// Location of a placeholder message inside a session.
///
/// Messages are only ever appended, so an index stays valid for the
/// lifetime of the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Placeholder {
    /// The session that owns the placeholder.
    pub session: SessionId,
    /// Index of the placeholder in the session's messages.
    pub index: usize,
}

/// Ordered sessions, newest first, backed by a [`SessionStore`].
pub struct SessionRegistry<S: SessionStore> {
    store: S,
    sessions: Vec<Session>,
    current: Option<SessionId>,
}

impl<S: SessionStore> SessionRegistry<S> {
    /// Load the registry from `store`.
    ///
    /// An empty store gets one fresh session. Otherwise the newest session is
    /// selected. Placeholders still marked pending belong to requests that
    /// died with an earlier process and are finalized as interrupted.
    pub fn open(store: S) -> Self {
        let sessions = store.load();
        let mut registry = Self {
            store,
            sessions,
            current: None,
        };
        if registry.sessions.is_empty() {
            registry.create_session();
        } else {
            registry.current = registry.sessions.first().map(|s| s.id.clone());
            registry.repair_orphaned_placeholders();
        }
        registry
    }

    fn repair_orphaned_placeholders(&mut self) {
        let mut repaired = 0;
        for session in &mut self.sessions {
            for message in &mut session.messages {
                if message.pending {
                    message.pending = false;
                    message.content = INTERRUPTED_MESSAGE.to_string();
                    repaired += 1;
                }
            }
        }
        if repaired > 0 {
            tracing::info!(repaired, "finalized placeholders left pending by a previous run");
            self.persist();
        }
    }

    /// Insert a new session at the front and make it current.
    pub fn create_session(&mut self) -> SessionId {
        let now = OffsetDateTime::now_utc();
        let id = self.next_id(unix_millis(now));
        self.sessions.insert(0, Session::new(id.clone(), now));
        self.current = Some(id.clone());
        tracing::debug!(session = %id, "created session");
        self.persist();
        id
    }

    fn next_id(&self, now_millis: i64) -> SessionId {
        let newest = self.sessions.iter().filter_map(|s| s.id.millis()).max();
        let millis = match newest {
            Some(newest) if newest >= now_millis => newest + 1,
            _ => now_millis,
        };
        SessionId::from_millis(millis)
    }

    /// Make `id` the current session.
    ///
    /// Returns `false`, leaving the selection untouched, when no session has
    /// that identifier.
    pub fn select_session(&mut self, id: &SessionId) -> bool {
        if self.get(id).is_none() {
            tracing::debug!(session = %id, "ignoring selection of unknown session");
            return false;
        }
        self.current = Some(id.clone());
        true
    }

    /// Append `message` to the session `id` and return its index.
    ///
    /// The first user message of a session also becomes its name.
    pub fn append_message(&mut self, id: &SessionId, message: Message) -> Result<usize> {
        let session = self.get_mut(id)?;
        if message.role == Role::User && session.user_message_count() == 0 {
            session.name = session_name_from(&message.content);
        }
        session.messages.push(message);
        let index = session.messages.len() - 1;
        self.persist();
        Ok(index)
    }

    /// Append a pending assistant placeholder to the session `id`.
    ///
    /// A session holds at most one pending placeholder at a time.
    pub fn append_placeholder(&mut self, id: &SessionId, content: &str) -> Result<Placeholder> {
        if self.get_mut(id)?.has_pending() {
            return Err(Error::validation(
                "session already has a pending reply",
                Some(id.to_string()),
            ));
        }
        let index = self.append_message(id, Message::placeholder(content))?;
        Ok(Placeholder {
            session: id.clone(),
            index,
        })
    }

    /// Replace the text of a still-pending placeholder.
    pub fn update_placeholder(&mut self, placeholder: &Placeholder, content: &str) -> Result<()> {
        let message = self.placeholder_mut(placeholder)?;
        message.content.clear();
        message.content.push_str(content);
        self.persist();
        Ok(())
    }

    /// Write the final text of a placeholder and clear its pending mark.
    pub fn finalize_placeholder(&mut self, placeholder: &Placeholder, content: &str) -> Result<()> {
        let message = self.placeholder_mut(placeholder)?;
        message.content = content.to_string();
        message.pending = false;
        self.persist();
        Ok(())
    }

    /// Append a completed exchange to the session `id`.
    pub fn record_exchange(&mut self, id: &SessionId, exchange: Exchange) -> Result<()> {
        self.get_mut(id)?.exchanges.push(exchange);
        self.persist();
        Ok(())
    }

    /// Sessions, newest first.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Look up a session.
    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    /// Identifier of the current session.
    pub fn current_id(&self) -> Option<&SessionId> {
        self.current.as_ref()
    }

    /// The current session.
    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref().and_then(|id| self.get(id))
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn get_mut(&mut self, id: &SessionId) -> Result<&mut Session> {
        self.sessions
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| Error::session_not_found(id.as_str()))
    }

    fn placeholder_mut(&mut self, placeholder: &Placeholder) -> Result<&mut Message> {
        let session = self.get_mut(&placeholder.session)?;
        match session.messages.get_mut(placeholder.index) {
            Some(message) if message.is_placeholder() => Ok(message),
            _ => Err(Error::validation(
                "no pending placeholder at index",
                Some(placeholder.index.to_string()),
            )),
        }
    }

    fn persist(&self) {
        if let Err(err) = self.store.save(&self.sessions) {
            tracing::warn!(error = %err, "session snapshot not saved; continuing in memory");
        }
    }
}
