//! Playback configuration.
//!
//! Run-wide defaults the processors apply to every command: the timeout and
//! thinktime stamped onto outgoing commands, whether the agent should take a
//! screenshot on error, and how unresolved `${name}` references are treated.
//!
//! # Example
//!
//! ```no_run
//! use scriptplay_core::config::PlaybackConfig;
//!
//! // Load (returns defaults if the file doesn't exist)
//! let config = PlaybackConfig::load("playback.json");
//! println!("default timeout: {}ms", config.timeout_ms);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::command::{DEFAULT_THINKTIME_MS, DEFAULT_TIMEOUT_MS};
use crate::error::ConfigError;

/// Default `waitFor` timeout when the command gives none, in seconds.
pub const DEFAULT_WAITFOR_TIMEOUT_SECS: u64 = 10;

/// Run-wide playback settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Timeout stamped on commands without `%timeout`, in milliseconds.
    pub timeout_ms: u64,
    /// Thinktime stamped on commands without `%thinktime`, in milliseconds.
    pub thinktime_ms: u64,
    /// When false, outgoing commands get `%screenshotonerror=false` unless
    /// they set it themselves.
    pub screenshot_on_error: bool,
    pub waitfor_timeout_secs: u64,
    /// When true, a command still referencing an undefined `${name}` after
    /// substitution is an ERROR instead of being sent with the literal text.
    pub strict_variables: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            thinktime_ms: DEFAULT_THINKTIME_MS,
            screenshot_on_error: true,
            waitfor_timeout_secs: DEFAULT_WAITFOR_TIMEOUT_SECS,
            strict_variables: false,
        }
    }
}

impl PlaybackConfig {
    /// Load config from a JSON file.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(config) => config,
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "using default playback config");
                Self::default()
            }
        }
    }

    /// Like [`load`](Self::load) but reports why the file could not be used.
    pub fn try_load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Save config as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
