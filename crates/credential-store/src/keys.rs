//! Persisted key names
//!
//! These names are shared with the web front end's local storage so a
//! profile exported from a browser can be read back unchanged.

/// Short-lived bearer token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Long-lived token used only by the refresh protocol
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Serialized `UserProfile` snapshot
pub const USER_KEY: &str = "user";

/// Present (`"true"`) while the signed-in user still owes profile completion
pub const PROFILE_INCOMPLETE_KEY: &str = "profileIncomplete";

/// UI theme preference, independent of the session
pub const THEME_KEY: &str = "theme";

/// UI locale preference, independent of the session
pub const LOCALE_KEY: &str = "locale";

/// Every key owned by the credential record. Cleared together.
pub const SESSION_KEYS: [&str; 4] = [
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    USER_KEY,
    PROFILE_INCOMPLETE_KEY,
];
