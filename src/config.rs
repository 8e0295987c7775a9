use anyhow::{ensure, Context, Result};
use std::time::Duration;

pub const DEFAULT_GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1/models/gemini-1.5-flash:generateContent";

#[derive(Debug, Clone)]
pub struct Config {
    // Gemini
    pub gemini_api_key: Option<String>,
    pub gemini_api_url: String,
    pub gemini_timeout_secs: u64,

    // Storage
    pub database_url: String,
    pub uploads_dir: String,

    // HTTP server
    pub api_key: Option<String>,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // Gemini - an empty key is the same as no key (offline continuity mode)
            gemini_api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            gemini_api_url: std::env::var("GEMINI_API_URL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_API_URL.to_string()),
            gemini_timeout_secs: match std::env::var("GEMINI_TIMEOUT_SECS") {
                Ok(v) => {
                    let secs: u64 = v
                        .parse()
                        .context("GEMINI_TIMEOUT_SECS must be a whole number of seconds")?;
                    // reqwest fails every request immediately on a zero timeout
                    ensure!(secs > 0, "GEMINI_TIMEOUT_SECS must be at least 1 second");
                    secs
                }
                Err(_) => 10,
            },

            // Storage
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://clinical_bridge.db?mode=rwc".to_string()),
            uploads_dir: std::env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_string()),

            // HTTP server
            api_key: std::env::var("API_KEY").ok().filter(|k| !k.is_empty()),
            port: match std::env::var("PORT") {
                Ok(v) => v.parse().context("PORT must be a valid port number")?,
                Err(_) => 8080,
            },
        })
    }

    /// The provider credential, if one is configured.
    pub fn credential(&self) -> Option<&str> {
        self.gemini_api_key.as_deref()
    }

    pub fn has_credential(&self) -> bool {
        self.credential().is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.gemini_timeout_secs)
    }
}
