//! Cookie storage shared between script calls and native HTTP traffic.
//!
//! One [`SharedCookies`] handle owns the store. It is installed as the HTTP
//! client's cookie provider, and the bridge hands out a [`CookieJar`] scoped
//! to the configured server origin for the script-facing cookie operations.
//!
//! Stores bucket cookies by origin (`scheme://host:port`) rather than applying
//! full RFC 6265 domain/path matching.

mod codec;
mod jar;
mod shared;
mod store;

pub use codec::{decode_value, encode_value, is_valid_name};
pub use jar::{CookieEntry, CookieJar};
pub use shared::SharedCookies;
pub use store::{CookieStore, CookieStoreError, FileCookieStore, MemoryCookieStore, StoredCookie};
