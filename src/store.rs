//! Durable storage for the session list.
//!
//! A store holds exactly one record: the full, ordered list of sessions.
//! Loading never fails from the caller's point of view. Saving replaces the
//! whole record and reports failure so the registry can log it and carry on.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::observability::{STORE_LOAD_ERRORS, STORE_SAVE_ERRORS, STORE_SAVES};
use crate::types::Session;

/// Name of the single record, as a file name.
pub const RECORD_NAME: &str = "sessions.json";

/// A durable key-value record holding the session list.
pub trait SessionStore: Send {
    /// Load the stored sessions, newest first.
    ///
    /// Absent or malformed data yields an empty list.
    fn load(&self) -> Vec<Session>;

    /// Overwrite the record with a full snapshot.
    fn save(&self, sessions: &[Session]) -> Result<()>;
}

impl<S: SessionStore + Sync + ?Sized> SessionStore for Arc<S> {
    fn load(&self) -> Vec<Session> {
        (**self).load()
    }

    fn save(&self, sessions: &[Session]) -> Result<()> {
        (**self).save(sessions)
    }
}

impl<S: SessionStore + ?Sized> SessionStore for Box<S> {
    fn load(&self) -> Vec<Session> {
        (**self).load()
    }

    fn save(&self, sessions: &[Session]) -> Result<()> {
        (**self).save(sessions)
    }
}

///////////////////////////////////////////// FileStore ////////////////////////////////////////////

/// A store backed by one JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store for the record at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a store for [`RECORD_NAME`] inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(RECORD_NAME))
    }

    /// Path of the record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| RECORD_NAME.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_snapshot(&self, sessions: &[Session]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|err| Error::io("failed to create store directory", err))?;
        }
        let bytes = serde_json::to_vec(sessions)?;
        let temp = self.temp_path();
        let mut file = fs::File::create(&temp)
            .map_err(|err| Error::io("failed to create temporary record", err))?;
        file.write_all(&bytes)
            .and_then(|()| file.sync_all())
            .map_err(|err| Error::io("failed to write temporary record", err))?;
        fs::rename(&temp, &self.path)
            .map_err(|err| Error::io("failed to replace session record", err))
    }
}

impl SessionStore for FileStore {
    fn load(&self) -> Vec<Session> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                STORE_LOAD_ERRORS.click();
                tracing::warn!(path = %self.path.display(), error = %err, "cannot read session record; starting empty");
                return Vec::new();
            }
        };
        match serde_json::from_slice::<Vec<Session>>(&bytes) {
            Ok(sessions) => sessions,
            Err(err) => {
                STORE_LOAD_ERRORS.click();
                tracing::warn!(path = %self.path.display(), error = %err, "malformed session record; starting empty");
                Vec::new()
            }
        }
    }

    fn save(&self, sessions: &[Session]) -> Result<()> {
        STORE_SAVES.click();
        self.write_snapshot(sessions).map_err(|err| {
            STORE_SAVE_ERRORS.click();
            Error::storage_unavailable(
                format!("cannot save {}", self.path.display()),
                Some(Box::new(err)),
            )
        })
    }
}

//////////////////////////////////////////// MemoryStore ///////////////////////////////////////////

/// An in-process store.
///
/// Holds the serialized record the way a file would, so a save followed by a
/// load goes through the same JSON encoding. It can be told to fail, which
/// stands in for storage that is full or unavailable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    record: Mutex<Option<String>>,
    failing: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose record holds `raw` verbatim.
    pub fn with_record(raw: impl Into<String>) -> Self {
        Self {
            record: Mutex::new(Some(raw.into())),
            failing: AtomicBool::new(false),
        }
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// The raw record, if one has been written.
    pub fn record(&self) -> Option<String> {
        lock(&self.record).clone()
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Vec<Session> {
        let Some(raw) = lock(&self.record).clone() else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(sessions) => sessions,
            Err(err) => {
                STORE_LOAD_ERRORS.click();
                tracing::warn!(error = %err, "malformed in-memory record; starting empty");
                Vec::new()
            }
        }
    }

    fn save(&self, sessions: &[Session]) -> Result<()> {
        STORE_SAVES.click();
        if self.failing.load(Ordering::Relaxed) {
            STORE_SAVE_ERRORS.click();
            return Err(Error::storage_unavailable("memory store is failing", None));
        }
        let raw = serde_json::to_string(sessions)?;
        *lock(&self.record) = Some(raw);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, SessionId};
    use time::macros::datetime;

    fn sample() -> Vec<Session> {
        let mut newer = Session::new(
            SessionId::from_millis(1_714_564_900_000),
            datetime!(2024-05-01 12:01:40 UTC),
        );
        newer.name = "Forecast Q3 sales".to_string();
        newer.messages.push(Message::user("Forecast Q3 sales"));
        newer
            .messages
            .push(Message::assistant("Q3 forecast: 12000 units"));
        let older = Session::new(
            SessionId::from_millis(1_714_564_800_000),
            datetime!(2024-05-01 12:00:00 UTC),
        );
        vec![newer, older]
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path());
        assert!(store.load().is_empty());
    }

    #[test]
    fn file_round_trip_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path().join("nested"));
        let sessions = sample();
        store.save(&sessions).unwrap();
        assert_eq!(store.load(), sessions);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn malformed_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path());
        fs::write(store.path(), b"{not json").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn wrong_shape_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path());
        fs::write(store.path(), br#"{"sessions": []}"#).unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path());
        store.save(&sample()).unwrap();
        let shorter = sample().split_off(1);
        store.save(&shorter).unwrap();
        assert_eq!(store.load(), shorter);
    }

    #[test]
    fn unwritable_location_reports_storage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file, not a directory").unwrap();
        let store = FileStore::in_dir(&blocker);
        let err = store.save(&sample()).unwrap_err();
        assert!(err.is_storage_unavailable());
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load().is_empty());
        store.save(&sample()).unwrap();
        assert_eq!(store.load(), sample());
        let record = store.record().unwrap();
        assert_eq!(MemoryStore::with_record(record).load(), sample());
    }

    #[test]
    fn memory_store_failure_keeps_last_record() {
        let store = MemoryStore::new();
        store.save(&sample()).unwrap();
        store.set_failing(true);
        assert!(store.save(&[]).unwrap_err().is_storage_unavailable());
        assert_eq!(store.load(), sample());
    }

    #[test]
    fn memory_store_malformed_record_loads_empty() {
        let store = MemoryStore::with_record("[{\"id\": 7}]");
        assert!(store.load().is_empty());
    }
}
