//! Agent configuration parameters
//!
//! All tunable parameters for the command channel and update flow.
//! The device build runs on defaults; the host build can load a JSON
//! document (see [`AgentConfig::from_json`]).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Well-known port of the command channel.
pub const DEFAULT_PORT: u16 = 80;

/// Hard upper bound on one request, in bytes.
pub const MAX_REQUEST_LEN: usize = 10_000;

/// Fixed reply buffer size. Replies are always far shorter.
pub const REPLY_BUF_LEN: usize = 1000;

/// Core agent configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    // --- Command channel ---
    /// TCP port the command channel listens on
    pub listen_port: u16,
    /// Request bytes read per connection before truncating
    pub max_request_len: usize,

    // --- Timing ---
    /// Pause after a bind/accept/read failure (milliseconds)
    pub io_retry_backoff_ms: u32,
    /// Pause before re-binding after the listener is torn down (milliseconds)
    pub rebind_delay_ms: u32,
    /// Grace period between the final reply and a requested restart (milliseconds)
    pub reboot_grace_ms: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_PORT,
            max_request_len: MAX_REQUEST_LEN,

            io_retry_backoff_ms: 1000,
            rebind_delay_ms: 2000,
            reboot_grace_ms: 2000,
        }
    }
}

impl AgentConfig {
    /// Range-check every field. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_port == 0 {
            return Err(ConfigError::ValidationFailed("listen_port must be non-zero"));
        }
        if self.max_request_len < 2 {
            return Err(ConfigError::ValidationFailed("max_request_len must be at least 2"));
        }
        if self.max_request_len > MAX_REQUEST_LEN {
            return Err(ConfigError::ValidationFailed(
                "max_request_len exceeds the 10000-byte request buffer",
            ));
        }
        if self.io_retry_backoff_ms == 0 {
            return Err(ConfigError::ValidationFailed("io_retry_backoff_ms must be non-zero"));
        }
        Ok(())
    }

    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json(doc: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(doc).map_err(|_| ConfigError::Malformed)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse the JSON document at `path`.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let doc = std::fs::read_to_string(path).map_err(|_| ConfigError::IoError)?;
        Self::from_json(&doc)
    }
}

/// Errors from loading or validating [`AgentConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The document is not valid JSON for this schema.
    Malformed,
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// The config source could not be read.
    IoError,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "config malformed"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
