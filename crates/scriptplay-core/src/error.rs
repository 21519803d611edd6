//! Error types.
//!
//! Problems found while playing a script never surface as Rust errors; they
//! are reported as ERROR or FAILURE [`PlaybackResult`](crate::result::PlaybackResult)s.
//! The types here cover the edges: invalid variable names, configuration
//! files and runner inputs.

use thiserror::Error;

/// Message appended to illegal local variable names.
pub const ILLEGAL_VARIABLE_MSG: &str =
    "variables must begin with a letter and contain only letters, numbers, and underscores";

/// A variable name was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VariableError {
    #[error("illegal variable '{0}' -- variables must begin with a letter and contain only letters, numbers, and underscores")]
    Illegal(String),

    #[error("illegal global variable '{0}' -- global variables must begin with a letter and contain only letters, numbers, and underscores")]
    IllegalGlobal(String),

    #[error("illegal global variable '{0}' -- is a reserved global variable name")]
    ReservedGlobal(String),
}

/// Failure to read or parse a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// The runner could not start a playback.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("nothing to run: no script or suite name given")]
    MissingName,

    #[error("unsupported file type '{0}' -- expected a .mt script, .js script, or .mts suite")]
    UnsupportedExtension(String),

    #[error("invalid globals: {0}")]
    InvalidGlobals(#[from] VariableError),
}
