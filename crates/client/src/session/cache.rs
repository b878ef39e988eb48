//! Persisted session cache.
//!
//! The bearer token and the user snapshot are stored as one record, so a
//! token without an identity (or the reverse) cannot be written. The only
//! way to remove them is [`SessionCache::clear`], which also runs every
//! hook registered with [`SessionCache::on_clear`].
//!
//! Every read goes back to the storage backend. Nothing is memoized between
//! calls, so another process logging out is observed on the next read.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::models::User;

/// On-disk form of a session.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredSession {
    /// Raw bearer token.
    pub token: String,
    /// User snapshot captured with the token.
    pub user: User,
}

impl std::fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("token", &"[REDACTED]")
            .field("user", &self.user)
            .finish()
    }
}

/// Durable backend for the session record.
///
/// Implementations must make `save` atomic from the reader's point of view:
/// a concurrent `load` sees either the old record or the new one.
pub trait SessionStorage: Send + Sync {
    /// Read the stored record, `Ok(None)` when nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` on I/O failure and `Error::Decode` when the
    /// stored bytes are not a complete record.
    fn load(&self) -> Result<Option<StoredSession>>;

    /// Replace the stored record.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the record cannot be written.
    fn save(&self, session: &StoredSession) -> Result<()>;

    /// Remove the stored record. Removing nothing is not an error.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the record exists but cannot be removed.
    fn clear(&self) -> Result<()>;
}

// =============================================================================
// File storage
// =============================================================================

/// Session stored as a JSON file.
///
/// Writes go to a per-process sibling temp file which is then renamed over
/// the target.
/// On Unix the file is created with mode `0600`.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    /// Store the session at `path`. Parent directories are created on save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the session file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(format!(".{}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> Result<Option<StoredSession>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Storage(format!("{}: {e}", self.path.display()))),
        };

        if raw.trim().is_empty() {
            return Ok(None);
        }

        let session = serde_json::from_str(&raw)?;
        Ok(Some(session))
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("{}: {e}", parent.display())))?;
        }

        let body = serde_json::to_vec_pretty(session)?;
        let temp = self.temp_path();

        write_private(&temp, &body)
            .map_err(|e| Error::Storage(format!("{}: {e}", temp.display())))?;
        fs::rename(&temp, &self.path)
            .map_err(|e| Error::Storage(format!("{}: {e}", self.path.display())))?;

        debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("{}: {e}", self.path.display()))),
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, body: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(body)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(body)?;
    file.sync_all()
}

// =============================================================================
// In-memory storage
// =============================================================================

/// Session kept in process memory. Useful for tests and embedded UIs that
/// persist elsewhere.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    slot: Mutex<Option<StoredSession>>,
}

impl MemorySessionStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> Result<Option<StoredSession>> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| Error::Storage("session lock poisoned".to_string()))?;
        Ok(slot.clone())
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| Error::Storage("session lock poisoned".to_string()))?;
        *slot = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| Error::Storage("session lock poisoned".to_string()))?;
        *slot = None;
        Ok(())
    }
}

// =============================================================================
// SessionCache
// =============================================================================

/// An authenticated session: token plus identity snapshot.
#[derive(Clone)]
pub struct Session {
    /// Bearer token.
    pub token: SecretString,
    /// Identity snapshot.
    pub user: User,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"[REDACTED]")
            .field("user", &self.user)
            .finish()
    }
}

/// Callback run after the session has been cleared.
type ClearHook = Box<dyn Fn() + Send + Sync>;

/// Read-through cache of the current session over a [`SessionStorage`].
pub struct SessionCache {
    storage: Box<dyn SessionStorage>,
    on_clear: Mutex<Vec<ClearHook>>,
}

impl std::fmt::Debug for SessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCache").finish_non_exhaustive()
    }
}

impl SessionCache {
    /// Wrap a storage backend.
    #[must_use]
    pub fn new(storage: impl SessionStorage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
            on_clear: Mutex::new(Vec::new()),
        }
    }

    /// Run `hook` after every [`clear`](Self::clear), whoever triggers it.
    ///
    /// Hooks must not call back into this cache.
    pub fn on_clear(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.on_clear
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(Box::new(hook));
    }

    /// Cache persisted to a JSON file at `path`.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(FileSessionStorage::new(path))
    }

    /// Cache held in memory only.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemorySessionStorage::new())
    }

    /// Current session, read from storage.
    ///
    /// An unreadable or partial record is torn down and reported as absent.
    #[must_use]
    pub fn get(&self) -> Option<Session> {
        match self.storage.load() {
            Ok(Some(stored)) if !stored.token.trim().is_empty() => Some(Session {
                token: SecretString::from(stored.token),
                user: stored.user,
            }),
            Ok(Some(_)) => {
                warn!("Stored session has an empty token, clearing");
                self.clear();
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Stored session unreadable, clearing");
                self.clear();
                None
            }
        }
    }

    /// Current bearer token, if a session is stored.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.get().map(|session| session.token)
    }

    /// Current user snapshot, if a session is stored.
    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.get().map(|session| session.user)
    }

    /// Whether a complete session (token and snapshot) is stored.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.get().is_some()
    }

    /// Store a new session, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the record cannot be persisted.
    pub fn set(&self, token: &SecretString, user: User) -> Result<()> {
        self.storage.save(&StoredSession {
            token: token.expose_secret().to_string(),
            user,
        })
    }

    /// Replace the user snapshot, keeping the token.
    ///
    /// Returns `Ok(false)` without writing when no session is stored, so a
    /// late response cannot resurrect an identity after logout.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the record cannot be persisted.
    pub fn replace_user(&self, user: User) -> Result<bool> {
        let Some(session) = self.get() else {
            return Ok(false);
        };
        self.set(&session.token, user)?;
        Ok(true)
    }

    /// Remove token and snapshot together.
    ///
    /// This is the single teardown path for the session. Failures are logged;
    /// the caller is always left treating the session as gone. Registered
    /// hooks run afterwards.
    pub fn clear(&self) {
        if let Err(e) = self.storage.clear() {
            error!(error = %e, "Failed to clear stored session");
        }
        let hooks = self
            .on_clear
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for hook in hooks.iter() {
            hook();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use agent_market_core::{Email, UserId};

    fn user(name: &str) -> User {
        User {
            id: UserId::new(1),
            name: name.to_string(),
            email: Email::parse("ada@example.com").unwrap(),
            avatar: None,
            is_verified: true,
            role: None,
        }
    }

    #[test]
    fn test_memory_set_get_clear() {
        let cache = SessionCache::in_memory();
        assert!(cache.get().is_none());

        cache.set(&SecretString::from("tok-1"), user("Ada")).unwrap();
        let session = cache.get().unwrap();
        assert_eq!(session.token.expose_secret(), "tok-1");
        assert_eq!(session.user.name, "Ada");
        assert!(cache.is_present());

        cache.clear();
        assert!(cache.token().is_none());
        assert!(cache.user().is_none());
    }

    #[test]
    fn test_replace_user_keeps_token() {
        let cache = SessionCache::in_memory();
        cache.set(&SecretString::from("tok-2"), user("Ada")).unwrap();

        assert!(cache.replace_user(user("Ada Lovelace")).unwrap());
        let session = cache.get().unwrap();
        assert_eq!(session.token.expose_secret(), "tok-2");
        assert_eq!(session.user.name, "Ada Lovelace");
    }

    #[test]
    fn test_replace_user_without_session_is_noop() {
        let cache = SessionCache::in_memory();
        assert!(!cache.replace_user(user("Ghost")).unwrap());
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_file_storage_roundtrip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");
        let cache = SessionCache::file(&path);

        cache.set(&SecretString::from("tok-3"), user("Ada")).unwrap();
        assert!(path.exists());
        let leftovers = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);

        // A second cache over the same file sees the session
        let other = SessionCache::file(&path);
        assert_eq!(other.user().unwrap().name, "Ada");

        other.clear();
        assert!(!path.exists());
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_file_storage_partial_record_is_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"token": "orphan"}"#).unwrap();

        let cache = SessionCache::file(&path);
        assert!(cache.token().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_temp_file_is_per_process() {
        let storage = FileSessionStorage::new("/tmp/agent-market/session.json");
        let temp = storage.temp_path();
        assert_eq!(temp.parent(), storage.path().parent());
        assert_eq!(
            temp.file_name().unwrap().to_string_lossy(),
            format!("session.json.{}.tmp", std::process::id())
        );
    }

    #[test]
    fn test_clear_runs_hooks() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let cache = SessionCache::in_memory();
        let calls = std::sync::Arc::new(AtomicUsize::new(0));
        let seen = std::sync::Arc::clone(&calls);
        cache.on_clear(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        cache.set(&SecretString::from("tok"), user("Ada")).unwrap();
        cache.clear();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_stored_session_debug_redacts_token() {
        let stored = StoredSession {
            token: "super-secret-token".to_string(),
            user: user("Ada"),
        };
        let debug = format!("{stored:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret-token"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_storage_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        SessionCache::file(&path)
            .set(&SecretString::from("tok"), user("Ada"))
            .unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
