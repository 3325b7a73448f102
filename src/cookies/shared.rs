//! Mutex-guarded cookie store shared by the jar and the HTTP client.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use cookie::Cookie;
use reqwest::header::HeaderValue;
use tracing::{debug, warn};
use url::Url;

use super::codec::is_valid_name;
use super::jar::CookieJar;
use super::store::{CookieStore, StoredCookie};

/// Cloneable handle to a single cookie store.
///
/// All access is serialized through one mutex, so concurrent calls never
/// interleave partial updates and a caller always observes its own writes.
#[derive(Debug, Clone)]
pub struct SharedCookies {
    inner: Arc<Mutex<Box<dyn CookieStore>>>,
}

impl SharedCookies {
    /// Wraps `store`.
    pub fn new(store: impl CookieStore + 'static) -> Self {
        Self::from_boxed(Box::new(store))
    }

    /// Wraps an already boxed store.
    #[must_use]
    pub fn from_boxed(store: Box<dyn CookieStore>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Returns a jar scoped to the origin of `server_url`.
    #[must_use]
    pub fn jar(&self, server_url: &Url) -> CookieJar {
        CookieJar::new(origin_key(server_url), self.clone())
    }

    /// Runs `f` with exclusive access to the store.
    pub(crate) fn with_store<R>(&self, f: impl FnOnce(&mut dyn CookieStore) -> R) -> R {
        // A panic while holding the lock cannot leave a store half-written:
        // mutations are single method calls.
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(guard.as_mut())
    }
}

/// Bucket key for `url`: its ASCII-serialized origin.
pub(crate) fn origin_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// A `Set-Cookie` header reduced to what the store keeps.
#[derive(Debug, PartialEq, Eq)]
struct SetCookie {
    name: String,
    value: String,
    expires: Option<SystemTime>,
}

impl SetCookie {
    fn is_expired(&self, now: SystemTime) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    fn into_stored(self) -> StoredCookie {
        StoredCookie::new(self.name, self.value).with_expiry(self.expires)
    }
}

fn parse_set_cookie(header: &str, now: SystemTime) -> Option<SetCookie> {
    let cookie = Cookie::parse(header).ok()?;
    if !is_valid_name(cookie.name()) {
        return None;
    }

    // Max-Age wins over Expires; a non-positive Max-Age expires immediately
    let expires = match cookie.max_age() {
        Some(max_age) if max_age.is_positive() => {
            let seconds = u64::try_from(max_age.whole_seconds()).unwrap_or(u64::MAX);
            now.checked_add(Duration::from_secs(seconds))
        }
        Some(_) => Some(now),
        None => cookie.expires_datetime().map(SystemTime::from),
    };
    Some(SetCookie {
        name: cookie.name().to_string(),
        value: cookie.value().to_string(),
        expires,
    })
}

/// `name=value` for the request header, or `None` if the pair could split
/// into extra cookies or is not a legal header value.
fn request_pair(cookie: &StoredCookie) -> Option<String> {
    if !is_valid_name(&cookie.name) || cookie.value.contains(';') {
        return None;
    }
    let pair = format!("{}={}", cookie.name, cookie.value);
    HeaderValue::from_str(&pair).is_ok().then_some(pair)
}

impl SharedCookies {
    fn store_response_cookies(
        &self,
        cookie_headers: &mut dyn Iterator<Item = &HeaderValue>,
        url: &Url,
        now: SystemTime,
    ) {
        if !url.origin().is_tuple() {
            return;
        }
        let origin = origin_key(url);
        self.with_store(|store| {
            for header in cookie_headers {
                let Ok(text) = header.to_str() else {
                    continue;
                };
                let Some(cookie) = parse_set_cookie(text, now) else {
                    debug!(origin = %origin, "ignoring malformed Set-Cookie header");
                    continue;
                };
                let name = cookie.name.clone();
                let result = if cookie.is_expired(now) {
                    store.remove(&origin, &name).map(|_| ())
                } else {
                    store.set(&origin, cookie.into_stored())
                };
                if let Err(error) = result {
                    warn!(origin = %origin, name = %name, error = %error, "failed to store response cookie");
                }
            }
        });
    }
}

impl reqwest::cookie::CookieStore for SharedCookies {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.store_response_cookies(cookie_headers, url, SystemTime::now());
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        if !url.origin().is_tuple() {
            return None;
        }
        let origin = origin_key(url);
        let cookies = self.with_store(|store| store.cookies(&origin));

        let mut pairs = Vec::with_capacity(cookies.len());
        for cookie in &cookies {
            match request_pair(cookie) {
                Some(pair) => pairs.push(pair),
                None => warn!(origin = %origin, name = ?cookie.name, "not sending cookie with an unencodable name or value"),
            }
        }
        if pairs.is_empty() {
            return None;
        }
        HeaderValue::from_str(&pairs.join("; ")).ok()
    }
}
