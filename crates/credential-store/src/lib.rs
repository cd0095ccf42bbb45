//! Durable credential persistence for the tourism session client
//!
//! Holds the access token, refresh token and cached user profile behind a
//! pluggable key-value capability so the same session logic runs against
//! an in-memory map (tests), a JSON file (command-line host) or any other
//! backing store.
//!
//! Record lifecycle:
//! 1. Login, registration or identity-provider callback calls `CredentialStore::write()`
//! 2. The refresh protocol calls `CredentialStore::replace_tokens()`
//! 3. Logout or irrecoverable refresh failure calls `CredentialStore::clear()`
//! 4. Startup hydration calls `CredentialStore::read()` exactly once

pub mod backend;
pub mod credentials;
pub mod error;
pub mod file;
pub mod keys;
pub mod preferences;
pub mod profile;

pub use backend::{BoxFuture, KeyValueStore, MemoryStore};
pub use credentials::{CredentialStore, StoredSession};
pub use error::{Error, Result};
pub use file::FileStore;
pub use keys::*;
pub use preferences::{DEFAULT_LOCALE, Preferences, Theme, is_locale_tag};
pub use profile::{TokenPair, UserProfile};
