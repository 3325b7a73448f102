//! Cookie jar scoped to the configured server origin.

use std::fmt;

use serde::Serialize;
use tracing::{debug, instrument};

use super::codec::{decode_value, encode_value};
use super::shared::SharedCookies;
use super::store::{CookieStoreError, StoredCookie};

/// A decoded cookie as seen by script callers.
///
/// Serializes as `{"key": ..., "value": ...}`. The value is redacted in Debug
/// output.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct CookieEntry {
    /// Cookie name.
    #[serde(rename = "key")]
    pub name: String,
    /// Decoded value (sensitive, never log).
    pub value: String,
}

impl CookieEntry {
    /// Creates an entry.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Debug for CookieEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieEntry")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Cookies of one origin.
///
/// Values are percent-encoded in the store and decoded on the way out, so
/// `get_cookie` returns exactly what `set_cookie` was given. Cookies of other
/// origins in the same store are never read or modified.
#[derive(Debug, Clone)]
pub struct CookieJar {
    origin: String,
    cookies: SharedCookies,
}

impl CookieJar {
    pub(crate) fn new(origin: String, cookies: SharedCookies) -> Self {
        Self { origin, cookies }
    }

    /// The origin this jar is scoped to (`scheme://host[:port]`).
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Writes or overwrites `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if a persistent store fails to save.
    #[instrument(level = "debug", skip(self, value), fields(origin = %self.origin))]
    pub fn set_cookie(&self, name: &str, value: &str) -> Result<(), CookieStoreError> {
        let encoded = encode_value(value);
        self.cookies
            .with_store(|store| store.set(&self.origin, StoredCookie::new(name, encoded)))?;
        debug!("cookie set");
        Ok(())
    }

    /// Returns the decoded cookie named `name`, or `None` if absent.
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<CookieEntry> {
        self.cookies
            .with_store(|store| store.get(&self.origin, name))
            .map(decode_entry)
    }

    /// Returns every cookie of the origin, decoded, in store order.
    #[must_use]
    pub fn get_cookies(&self) -> Vec<CookieEntry> {
        self.cookies
            .with_store(|store| store.cookies(&self.origin))
            .into_iter()
            .map(decode_entry)
            .collect()
    }

    /// Removes `name`. Removing an absent cookie is not an error.
    ///
    /// Returns whether a cookie was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a persistent store fails to save.
    #[instrument(level = "debug", skip(self), fields(origin = %self.origin))]
    pub fn delete_cookie(&self, name: &str) -> Result<bool, CookieStoreError> {
        let removed = self
            .cookies
            .with_store(|store| store.remove(&self.origin, name))?;
        debug!(removed, "cookie delete");
        Ok(removed)
    }

    /// Removes every cookie of the origin; returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a persistent store fails to save.
    #[instrument(level = "debug", skip(self), fields(origin = %self.origin))]
    pub fn clear_cookies(&self) -> Result<usize, CookieStoreError> {
        let removed = self.cookies.with_store(|store| store.clear(&self.origin))?;
        debug!(removed, "cookies cleared");
        Ok(removed)
    }
}

fn decode_entry(cookie: StoredCookie) -> CookieEntry {
    CookieEntry {
        value: decode_value(&cookie.value),
        name: cookie.name,
    }
}
