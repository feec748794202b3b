//! Collaborator endpoints and timeouts, driven by the environment.

use serde::Deserialize;

/// Environment variable prefix for all settings.
const ENV_PREFIX: &str = "AUSCULT_";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Media store serving `GET /file/{media_id}`.
    pub media_base: String,
    /// Cache service serving `GET /cache/{hash}` and `POST /cache`.
    pub cache_base: String,
    /// Timeout for collaborator calls, in seconds.
    pub http_timeout_secs: u64,
}

impl Default for Settings {
    #[inline]
    fn default() -> Self {
        Self {
            media_base: "http://media-service:4003".into(),
            cache_base: "http://analysis-service:4004".into(),
            http_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Read settings from `AUSCULT_MEDIA_BASE`, `AUSCULT_CACHE_BASE`, and
    /// `AUSCULT_HTTP_TIMEOUT_SECS`, falling back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}MEDIA_BASE")) {
            settings.media_base = v;
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}CACHE_BASE")) {
            settings.cache_base = v;
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}HTTP_TIMEOUT_SECS")) {
            if let Ok(secs) = v.parse() {
                settings.http_timeout_secs = secs;
            }
        }
        settings
    }
}
