//! Theme and locale preferences
//!
//! Not part of the credential record, but restored in the same startup pass
//! and stored in the same backend.

use tracing::{debug, warn};

use crate::backend::KeyValueStore;
use crate::error::Result;
use crate::keys::{LOCALE_KEY, THEME_KEY};

pub const DEFAULT_LOCALE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            "system" => Some(Theme::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    pub theme: Theme,
    pub locale: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

impl Preferences {
    /// Load preferences, falling back to defaults per key on missing,
    /// unknown or unreadable values.
    pub async fn load(backend: &dyn KeyValueStore) -> Self {
        let mut prefs = Self::default();

        match backend.get(THEME_KEY).await {
            Ok(Some(raw)) => match Theme::parse(&raw) {
                Some(theme) => prefs.theme = theme,
                None => warn!(value = %raw, "unknown theme preference, using default"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to read theme preference"),
        }

        match backend.get(LOCALE_KEY).await {
            Ok(Some(raw)) if is_locale_tag(&raw) => prefs.locale = raw,
            Ok(Some(raw)) => warn!(value = %raw, "invalid locale preference, using default"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to read locale preference"),
        }

        debug!(theme = prefs.theme.as_str(), locale = %prefs.locale, "preferences loaded");
        prefs
    }

    pub async fn save(&self, backend: &dyn KeyValueStore) -> Result<()> {
        backend
            .set_many(vec![
                (THEME_KEY.to_string(), self.theme.as_str().to_string()),
                (LOCALE_KEY.to_string(), self.locale.clone()),
            ])
            .await
    }
}

/// BCP 47-ish shape check: `en`, `vi`, `en-US`, `zh-Hant-TW`.
pub fn is_locale_tag(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 16
        && value
            .split('-')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric()))
}
