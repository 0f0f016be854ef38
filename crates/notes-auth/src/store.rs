//! Client-side token store
//!
//! Persists the access token, refresh token and cached user JSON under fixed
//! keys in a small key/value storage. `FileStorage` keeps a JSON object on
//! disk; every write goes through a temp file + rename so a crash never leaves
//! a half-written session behind. `MemoryStorage` backs ephemeral sessions and
//! tests.
//!
//! All operations are synchronous. Expiry is not tracked here: an expired
//! access token is discovered when a request comes back 401.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use crate::error::{Error, Result};
use crate::token::CredentialPair;
use crate::user::User;

/// Durable string key/value storage (the client's "local storage").
///
/// `set_many` and `remove_many` apply all entries in a single write.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set_many(&self, entries: &[(&str, String)]) -> Result<()>;

    fn remove_many(&self, keys: &[&str]) -> Result<()>;
}

/// In-memory storage. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        let state = self.state.lock().ok()?;
        state.get(key).cloned()
    }

    fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Storage("memory storage lock poisoned".into()))?;
        for (key, value) in entries {
            state.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Storage("memory storage lock poisoned".into()))?;
        for key in keys {
            state.remove(*key);
        }
        Ok(())
    }
}

/// JSON-file storage.
///
/// Reads are served from an in-memory copy of the map. Every mutation first
/// re-reads the file, applies its own keys on top, and rewrites the whole
/// map, so two processes sharing the file only overwrite each other at key
/// granularity. The Mutex serializes writers within one process.
pub struct FileStorage {
    path: PathBuf,
    state: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Open the storage file, creating it as `{}` if it doesn't exist yet.
    pub fn open(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let entries = read_map(&path)?;
            info!(path = %path.display(), keys = entries.len(), "loaded session storage");
            entries
        } else {
            info!(path = %path.display(), "session file not found, starting with empty storage");
            if let Some(dir) = path.parent()
                && !dir.as_os_str().is_empty()
            {
                std::fs::create_dir_all(dir)
                    .map_err(|e| Error::Io(format!("creating session directory: {e}")))?;
            }
            let entries = HashMap::new();
            write_atomic(&path, &entries)?;
            entries
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pick up writes made by other processes since the last load.
    fn reload(&self, state: &mut HashMap<String, String>) {
        if !self.path.exists() {
            return;
        }
        match read_map(&self.path) {
            Ok(entries) => *state = entries,
            Err(e) => warn!(error = %e, "session file unreadable, keeping in-memory copy"),
        }
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        let state = self.state.lock().ok()?;
        state.get(key).cloned()
    }

    fn set_many(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Storage("session storage lock poisoned".into()))?;
        self.reload(&mut state);
        for (key, value) in entries {
            state.insert((*key).to_string(), value.clone());
        }
        write_atomic(&self.path, &state)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Storage("session storage lock poisoned".into()))?;
        self.reload(&mut state);
        let before = state.len();
        for key in keys {
            state.remove(*key);
        }
        if state.len() == before {
            return Ok(());
        }
        write_atomic(&self.path, &state)
    }
}

fn read_map(path: &Path) -> Result<HashMap<String, String>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Io(format!("reading session file: {e}")))?;
    serde_json::from_str(&contents)
        .map_err(|e| Error::CredentialParse(format!("parsing session file: {e}")))
}

/// Write the storage map to a file atomically with 0600 permissions.
fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::CredentialParse(format!("serializing session: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted session");
    Ok(())
}

/// Token store over a key/value storage.
///
/// Cheap to clone; all clones share the same storage. There is no lock
/// around multi-step sequences: the last writer wins, which is fine at the
/// single-key granularity used here.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// Store backed by an in-memory map.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Store backed by a JSON file at `path`.
    pub fn open_file(path: PathBuf) -> Result<Self> {
        Ok(Self::new(Arc::new(FileStorage::open(path)?)))
    }

    /// Persist both tokens in one write.
    pub fn save(&self, credentials: &CredentialPair) -> Result<()> {
        self.storage.set_many(&[
            (ACCESS_TOKEN_KEY, credentials.access.expose().clone()),
            (REFRESH_TOKEN_KEY, credentials.refresh.expose().clone()),
        ])
    }

    /// Load the credential pair. A half-populated pair counts as absent.
    pub fn load(&self) -> Option<CredentialPair> {
        let access = self.storage.get(ACCESS_TOKEN_KEY);
        let refresh = self.storage.get(REFRESH_TOKEN_KEY);
        match (access, refresh) {
            (Some(access), Some(refresh)) => Some(CredentialPair::new(access, refresh)),
            (None, None) => None,
            (access, _) => {
                warn!(
                    has_access = access.is_some(),
                    "stored credentials are half-populated, treating session as absent"
                );
                None
            }
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.storage.get(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.storage.get(REFRESH_TOKEN_KEY)
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token().is_some()
    }

    pub fn save_user(&self, user: &User) -> Result<()> {
        let json = serde_json::to_string(user)
            .map_err(|e| Error::CredentialParse(format!("serializing user: {e}")))?;
        self.storage.set_many(&[(USER_KEY, json)])
    }

    /// Cached user record, if present and parseable.
    pub fn load_user(&self) -> Option<User> {
        let json = self.storage.get(USER_KEY)?;
        match serde_json::from_str(&json) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "cached user record is unreadable, ignoring");
                None
            }
        }
    }

    /// Remove tokens and cached user as a unit.
    pub fn clear(&self) -> Result<()> {
        self.storage
            .remove_many(&[ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY])?;
        debug!("cleared stored session");
        Ok(())
    }

    /// True when nothing session-related is stored.
    pub fn is_empty(&self) -> bool {
        self.storage.get(ACCESS_TOKEN_KEY).is_none()
            && self.storage.get(REFRESH_TOKEN_KEY).is_none()
            && self.storage.get(USER_KEY).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(email: &str) -> User {
        User {
            id: 1,
            email: email.into(),
            username: None,
            full_name: Some("Test User".into()),
            avatar_url: None,
            is_active: true,
            is_verified: true,
            created_at: "2025-01-01T00:00:00".into(),
            last_login: None,
        }
    }

    #[test]
    fn roundtrip_save_load_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let store = TokenStore::open_file(path.clone()).unwrap();
        store.save(&CredentialPair::new("at_1", "rt_1")).unwrap();
        store.save_user(&test_user("a@b.com")).unwrap();

        let reopened = TokenStore::open_file(path).unwrap();
        let pair = reopened.load().unwrap();
        assert_eq!(pair.access.expose(), "at_1");
        assert_eq!(pair.refresh.expose(), "rt_1");
        assert_eq!(reopened.load_user().unwrap().email, "a@b.com");
    }

    #[test]
    fn cold_start_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        assert!(!path.exists());
        let store = TokenStore::open_file(path.clone()).unwrap();
        assert!(store.is_empty());
        assert!(store.load().is_none());
        assert!(path.exists());

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn uses_fixed_storage_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = TokenStore::open_file(path.clone()).unwrap();
        store.save(&CredentialPair::new("at_k", "rt_k")).unwrap();
        store.save_user(&test_user("k@b.com")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed["access_token"], "at_k");
        assert_eq!(parsed["refresh_token"], "rt_k");
        let user: User = serde_json::from_str(&parsed["user"]).unwrap();
        assert_eq!(user.email, "k@b.com");
    }

    #[test]
    fn clear_removes_tokens_and_user() {
        let store = TokenStore::in_memory();
        store.save(&CredentialPair::new("at", "rt")).unwrap();
        store.save_user(&test_user("a@b.com")).unwrap();
        assert!(!store.is_empty());

        store.clear().unwrap();
        assert!(store.is_empty());
        assert!(store.load().is_none());
        assert!(store.load_user().is_none());

        // clearing an empty store is a no-op
        store.clear().unwrap();
    }

    #[test]
    fn half_populated_pair_is_absent() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set_many(&[(ACCESS_TOKEN_KEY, "at_only".to_string())])
            .unwrap();
        let store = TokenStore::new(storage);
        assert!(store.load().is_none());
        assert!(store.has_access_token());
    }

    #[test]
    fn unreadable_user_is_ignored() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set_many(&[(USER_KEY, "{not json".to_string())])
            .unwrap();
        let store = TokenStore::new(storage);
        assert!(store.load_user().is_none());
    }

    #[test]
    fn corrupt_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "[1, 2").unwrap();
        let result = TokenStore::open_file(path);
        assert!(matches!(result, Err(Error::CredentialParse(_))));
    }

    #[cfg(unix)]
    #[test]
    fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = TokenStore::open_file(path.clone()).unwrap();
        store.save(&CredentialPair::new("at", "rt")).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "session file must be 0600, got {mode:o}");
    }

    #[test]
    fn writers_on_one_file_keep_each_others_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let first = FileStorage::open(path.clone()).unwrap();
        let second = FileStorage::open(path.clone()).unwrap();

        first
            .set_many(&[(ACCESS_TOKEN_KEY, "at_first".to_string())])
            .unwrap();
        second
            .set_many(&[(USER_KEY, "{}".to_string())])
            .unwrap();

        let reopened = FileStorage::open(path.clone()).unwrap();
        assert_eq!(reopened.get(ACCESS_TOKEN_KEY).as_deref(), Some("at_first"));
        assert_eq!(reopened.get(USER_KEY).as_deref(), Some("{}"));

        first.remove_many(&[USER_KEY]).unwrap();
        let reopened = FileStorage::open(path).unwrap();
        assert_eq!(reopened.get(ACCESS_TOKEN_KEY).as_deref(), Some("at_first"));
        assert!(reopened.get(USER_KEY).is_none());
    }

    #[test]
    fn clones_share_storage() {
        let store = TokenStore::in_memory();
        let other = store.clone();
        store.save(&CredentialPair::new("at_shared", "rt_shared")).unwrap();
        assert_eq!(other.access_token().as_deref(), Some("at_shared"));
    }
}
