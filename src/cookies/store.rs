//! Cookie storage backends.
//!
//! Stores bucket cookies by origin (`scheme://host:port`) and keep insertion
//! order within a bucket. Values are stored exactly as given; encoding is the
//! jar's concern.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// A stored name/value pair.
///
/// The value is redacted in Debug output to keep session tokens out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    /// Cookie name.
    pub name: String,
    /// Raw stored value (sensitive, never log).
    pub value: String,
    /// When the cookie stops being sent. `None` keeps it until removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<SystemTime>,
}

impl StoredCookie {
    /// Creates a stored cookie that never expires.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires: None,
        }
    }

    /// Sets the expiry instant.
    #[must_use]
    pub fn with_expiry(mut self, expires: Option<SystemTime>) -> Self {
        self.expires = expires;
        self
    }

    /// Whether the cookie has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }
}

impl fmt::Debug for StoredCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("expires", &self.expires)
            .finish()
    }
}

/// Errors raised by persistent cookie stores.
#[derive(Debug, Error)]
pub enum CookieStoreError {
    /// Reading or writing the backing file failed.
    #[error("cookie store IO error at {path}: {source}")]
    Io {
        /// Backing file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Cookies could not be serialized.
    #[error("failed to serialize cookie store: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The backing file exists but is not a valid cookie store.
    #[error("cookie store at {path} is corrupt: {source}")]
    Corrupt {
        /// Backing file path.
        path: PathBuf,
        /// The parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Origin-bucketed cookie storage.
///
/// Implementations are not internally synchronized; share them through
/// [`SharedCookies`](super::SharedCookies).
pub trait CookieStore: Send + fmt::Debug {
    /// Unexpired cookies for `origin` in insertion order.
    fn cookies(&self, origin: &str) -> Vec<StoredCookie>;

    /// Inserts or overwrites (in place) the cookie named `cookie.name`.
    ///
    /// # Errors
    ///
    /// Returns an error if a persistent store fails to save.
    fn set(&mut self, origin: &str, cookie: StoredCookie) -> Result<(), CookieStoreError>;

    /// Removes the cookie named `name`; returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error if a persistent store fails to save.
    fn remove(&mut self, origin: &str, name: &str) -> Result<bool, CookieStoreError>;

    /// Removes every cookie of `origin`; returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a persistent store fails to save.
    fn clear(&mut self, origin: &str) -> Result<usize, CookieStoreError>;

    /// The cookie named `name`, if any.
    fn get(&self, origin: &str, name: &str) -> Option<StoredCookie> {
        self.cookies(origin).into_iter().find(|c| c.name == name)
    }
}

/// In-memory store. Cookies live as long as the process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryCookieStore {
    origins: BTreeMap<String, Vec<StoredCookie>>,
}

impl MemoryCookieStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, origin: &str, cookie: StoredCookie) {
        let now = SystemTime::now();
        let bucket = self.origins.entry(origin.to_string()).or_default();
        // expired entries are dropped on the next write to their bucket
        bucket.retain(|c| c.name == cookie.name || !c.is_expired(now));
        match bucket.iter_mut().find(|c| c.name == cookie.name) {
            Some(existing) => *existing = cookie,
            None => bucket.push(cookie),
        }
    }

    fn delete(&mut self, origin: &str, name: &str) -> bool {
        let Some(bucket) = self.origins.get_mut(origin) else {
            return false;
        };
        let Some(index) = bucket.iter().position(|c| c.name == name) else {
            return false;
        };
        bucket.remove(index);
        if bucket.is_empty() {
            self.origins.remove(origin);
        }
        true
    }

    fn delete_origin(&mut self, origin: &str) -> usize {
        self.origins.remove(origin).map_or(0, |bucket| bucket.len())
    }
}

impl CookieStore for MemoryCookieStore {
    fn cookies(&self, origin: &str) -> Vec<StoredCookie> {
        let now = SystemTime::now();
        self.origins.get(origin).map_or_else(Vec::new, |bucket| {
            bucket.iter().filter(|c| !c.is_expired(now)).cloned().collect()
        })
    }

    fn set(&mut self, origin: &str, cookie: StoredCookie) -> Result<(), CookieStoreError> {
        self.insert(origin, cookie);
        Ok(())
    }

    fn remove(&mut self, origin: &str, name: &str) -> Result<bool, CookieStoreError> {
        Ok(self.delete(origin, name))
    }

    fn clear(&mut self, origin: &str) -> Result<usize, CookieStoreError> {
        Ok(self.delete_origin(origin))
    }
}

/// JSON file store. Survives process restarts.
///
/// Each mutation is applied to a copy, written to a temporary file beside the
/// target and renamed over it; the in-memory state only changes once the file
/// is in place.
#[derive(Debug)]
pub struct FileCookieStore {
    path: PathBuf,
    memory: MemoryCookieStore,
}

impl FileCookieStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CookieStoreError::Io`] if the file cannot be read and
    /// [`CookieStoreError::Corrupt`] if it does not parse.
    #[instrument(level = "debug")]
    pub fn open(path: &Path) -> Result<Self, CookieStoreError> {
        let memory = match std::fs::read(path) {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(|source| CookieStoreError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MemoryCookieStore::new(),
            Err(source) => {
                return Err(CookieStoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        debug!(origins = memory.origins.len(), "opened cookie store");
        Ok(Self {
            path: path.to_path_buf(),
            memory,
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn commit(&mut self, next: MemoryCookieStore) -> Result<(), CookieStoreError> {
        let payload = serde_json::to_vec_pretty(&next)?;
        write_atomically(&self.path, &payload).map_err(|source| CookieStoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.memory = next;
        Ok(())
    }
}

impl CookieStore for FileCookieStore {
    fn cookies(&self, origin: &str) -> Vec<StoredCookie> {
        self.memory.cookies(origin)
    }

    fn set(&mut self, origin: &str, cookie: StoredCookie) -> Result<(), CookieStoreError> {
        let mut next = self.memory.clone();
        next.insert(origin, cookie);
        self.commit(next)
    }

    fn remove(&mut self, origin: &str, name: &str) -> Result<bool, CookieStoreError> {
        let mut next = self.memory.clone();
        if !next.delete(origin, name) {
            return Ok(false);
        }
        self.commit(next)?;
        Ok(true)
    }

    fn clear(&mut self, origin: &str) -> Result<usize, CookieStoreError> {
        let mut next = self.memory.clone();
        let removed = next.delete_origin(origin);
        if removed > 0 {
            self.commit(next)?;
        }
        Ok(removed)
    }
}

fn write_atomically(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".cookies-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    staged.write_all(payload)?;
    staged.as_file().sync_all()?;
    set_owner_only_permissions(staged.path())?;
    staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use tempfile::TempDir;

    const ORIGIN: &str = "https://app.example.com";
    const OTHER: &str = "https://other.example.com";

    #[test]
    fn test_memory_store_overwrites_in_place() {
        let mut store = MemoryCookieStore::new();
        store.set(ORIGIN, StoredCookie::new("a", "1")).unwrap();
        store.set(ORIGIN, StoredCookie::new("b", "2")).unwrap();
        store.set(ORIGIN, StoredCookie::new("a", "3")).unwrap();

        let cookies = store.cookies(ORIGIN);
        assert_eq!(
            cookies,
            vec![StoredCookie::new("a", "3"), StoredCookie::new("b", "2")]
        );
    }

    #[test]
    fn test_memory_store_clear_is_scoped_to_origin() {
        let mut store = MemoryCookieStore::new();
        store.set(ORIGIN, StoredCookie::new("a", "1")).unwrap();
        store.set(OTHER, StoredCookie::new("a", "2")).unwrap();

        assert_eq!(store.clear(ORIGIN).unwrap(), 1);
        assert!(store.cookies(ORIGIN).is_empty());
        assert_eq!(store.get(OTHER, "a").unwrap().value, "2");
        assert_eq!(store.clear(ORIGIN).unwrap(), 0);
    }

    #[test]
    fn test_expired_cookies_are_not_returned() {
        let now = SystemTime::now();
        let mut store = MemoryCookieStore::new();
        store
            .set(
                ORIGIN,
                StoredCookie::new("stale", "1").with_expiry(Some(now - Duration::from_secs(5))),
            )
            .unwrap();
        store
            .set(
                ORIGIN,
                StoredCookie::new("fresh", "2").with_expiry(Some(now + Duration::from_secs(3600))),
            )
            .unwrap();

        let names: Vec<String> = store.cookies(ORIGIN).into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["fresh"]);
        assert!(store.get(ORIGIN, "stale").is_none());
    }

    #[test]
    fn test_overwrite_replaces_expiry() {
        let now = SystemTime::now();
        let mut store = MemoryCookieStore::new();
        store
            .set(
                ORIGIN,
                StoredCookie::new("a", "1").with_expiry(Some(now + Duration::from_secs(60))),
            )
            .unwrap();
        store.set(ORIGIN, StoredCookie::new("a", "2")).unwrap();

        assert_eq!(store.get(ORIGIN, "a").unwrap().expires, None);
    }

    #[test]
    fn test_file_store_round_trips_expiry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cookies.json");
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(4_000_000_000);

        let mut store = FileCookieStore::open(&path).unwrap();
        store
            .set(ORIGIN, StoredCookie::new("a", "1").with_expiry(Some(at)))
            .unwrap();
        drop(store);

        let reopened = FileCookieStore::open(&path).unwrap();
        assert_eq!(reopened.get(ORIGIN, "a").unwrap().expires, Some(at));
    }

    #[test]
    fn test_memory_store_remove_missing_is_false() {
        let mut store = MemoryCookieStore::new();
        assert!(!store.remove(ORIGIN, "nope").unwrap());
    }

    #[test]
    fn test_stored_cookie_debug_redacts_value() {
        let cookie = StoredCookie::new("session", "secret-token");
        let debug = format!("{cookie:?}");
        assert!(debug.contains("session"));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state/cookies.json");

        let mut store = FileCookieStore::open(&path).unwrap();
        store.set(ORIGIN, StoredCookie::new("session", "abc")).unwrap();
        store.set(OTHER, StoredCookie::new("theme", "dark")).unwrap();
        drop(store);

        let reopened = FileCookieStore::open(&path).unwrap();
        assert_eq!(reopened.path(), path.as_path());
        assert_eq!(reopened.get(ORIGIN, "session").unwrap().value, "abc");
        assert_eq!(reopened.get(OTHER, "theme").unwrap().value, "dark");
    }

    #[test]
    fn test_file_store_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cookies.json");

        let mut store = FileCookieStore::open(&path).unwrap();
        store.set(ORIGIN, StoredCookie::new("a", "1")).unwrap();
        store.remove(ORIGIN, "a").unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("cookies.json")]);
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, b"{not json").unwrap();

        let err = FileCookieStore::open(&path).unwrap_err();
        assert!(matches!(err, CookieStoreError::Corrupt { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cookies.json");
        let mut store = FileCookieStore::open(&path).unwrap();
        store.set(ORIGIN, StoredCookie::new("a", "1")).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
