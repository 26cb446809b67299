//! Configuration module for the Rev Gateway server
//!
//! Configuration is assembled from environment variables (a `.env` file is
//! loaded in `main.rs` before this module runs, so `.env` values behave like
//! ordinary environment variables) with optional CLI overrides applied on
//! top. Priority: CLI flags > ENV vars > .env values > defaults.
//!
//! # Example
//! ```rust,no_run
//! use rev_gateway::config::ServerConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Default listen host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default listen port, matching the original deployment.
pub const DEFAULT_PORT: u16 = 3000;

/// Default directory holding the browser client bundle.
pub const DEFAULT_STATIC_DIR: &str = "./frontend";

/// Errors produced while loading or validating the server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable was present but could not be parsed
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: &'static str, message: String },
}

/// Server configuration
///
/// Contains everything needed to run the Rev Gateway server:
/// - Server settings (host, port, static asset directory)
/// - The Gemini Live API credential and session options (model, voice)
/// - Security settings (CORS)
///
/// A missing `GEMINI_API_KEY` is deliberately not a startup error: the
/// server still serves the client bundle and health endpoint, and the
/// missing credential surfaces as a per-session connect failure.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    /// Directory the browser client bundle is served from
    pub static_dir: PathBuf,

    /// Gemini Live API key (required to open upstream sessions)
    pub gemini_api_key: Option<String>,

    /// Gemini Live WebSocket endpoint; overridable for testing
    pub gemini_live_url: Option<String>,

    /// Model identifier for upstream sessions
    pub gemini_model: Option<String>,

    /// Prebuilt voice name for audio responses
    pub gemini_voice: Option<String>,

    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,
}

/// Implement Drop to zeroize the credential when ServerConfig is dropped,
/// so the key does not linger in freed memory.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.gemini_api_key {
            key.zeroize();
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            gemini_api_key: None,
            gemini_live_url: None,
            gemini_model: None,
            gemini_voice: None,
            cors_allowed_origins: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env_opt("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidValue {
                    name: "PORT",
                    message: e.to_string(),
                })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            host: env_opt("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            static_dir: env_opt("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
            gemini_api_key: env_opt("GEMINI_API_KEY"),
            gemini_live_url: env_opt("GEMINI_LIVE_URL"),
            gemini_model: env_opt("GEMINI_MODEL"),
            gemini_voice: env_opt("GEMINI_VOICE"),
            cors_allowed_origins: env_opt("CORS_ALLOWED_ORIGINS"),
        })
    }

    /// Get the server address as a string in the format "host:port".
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check whether an upstream credential is configured.
    pub fn has_gemini_credential(&self) -> bool {
        self.gemini_api_key
            .as_deref()
            .is_some_and(|key| !key.is_empty())
    }
}

/// Read an environment variable, treating empty strings as absent.
fn env_opt(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}
