//! Credential record payloads: the token pair and the cached user profile

use common::Secret;
use serde::{Deserialize, Serialize};

/// Access and refresh token, always stored and cleared together.
///
/// Field names match the API wire shape `{ accessToken, refreshToken }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access.into()),
            refresh_token: Secret::new(refresh.into()),
        }
    }

    /// Both tokens are non-blank.
    pub fn is_complete(&self) -> bool {
        !self.access_token.is_blank() && !self.refresh_token.is_blank()
    }
}

/// Last server-confirmed identity. A read-through cache, never authoritative.
///
/// Unknown fields returned by the API are kept in `extra` so a round trip
/// through the store does not drop them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_role() -> String {
    "user".to_string()
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role.eq_ignore_ascii_case("admin")
    }
}
