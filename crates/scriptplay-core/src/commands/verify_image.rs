//! `<Component> <id> VerifyImage <path> [tolerance]`.
//!
//! The agent captures the component and answers with a base64 screenshot
//! and the component's bounds (`x y width height`) as its message. The
//! decoded image is handed to an [`ImageVerifier`], which owns the expected
//! images and the pixel comparison.
//!
//! ```text
//! Button login VerifyImage images/login.png 10
//! ```

use std::path::Path;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

use crate::agent::Response;
use crate::command::Command;
use crate::result::{Bounds, PlaybackResult, Status};

/// Per-channel tolerance used when the command gives none.
pub const DEFAULT_TOLERANCE: u8 = 5;

/// What a verifier concluded about a captured image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMatch {
    Matched,
    Mismatched,
    /// No expected image existed, so the capture was stored as the new one.
    Created,
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("cannot read expected image '{0}': {1}")]
    Read(String, String),
    #[error("cannot write expected image '{0}': {1}")]
    Write(String, String),
    #[error("cannot decode image: {0}")]
    Decode(String),
}

/// Compares a captured component image with an expected image file.
#[async_trait]
pub trait ImageVerifier: Send + Sync {
    /// `expected` is relative to the project directory.
    async fn verify(
        &self,
        expected: &str,
        captured: &[u8],
        bounds: Bounds,
        tolerance: u8,
    ) -> Result<ImageMatch, ImageError>;
}

/// A validated `VerifyImage` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub expected: String,
    pub tolerance: u8,
}

/// Checks the command's arguments before anything is sent to the agent.
pub fn parse_request(cmd: &Command) -> Result<ImageRequest, PlaybackResult> {
    let Some(expected) = cmd.args.first().filter(|p| !p.is_empty()) else {
        return Err(PlaybackResult::error(format!(
            "command '{}' must have a file path as its first arg",
            cmd
        )));
    };
    if Path::new(expected).is_absolute() {
        return Err(PlaybackResult::error(format!(
            "command '{}' - expectedImageFile '{}' is an absolute path reference - \
             the expected image file path must be specified relative to the project directory",
            cmd, expected
        )));
    }
    let tolerance = match cmd.args.get(1) {
        None => DEFAULT_TOLERANCE,
        Some(t) => t.parse::<u8>().map_err(|_| {
            PlaybackResult::error(format!(
                "command '{}' - tolerance '{}' is invalid: must be an integer between 0 and 255",
                cmd, t
            ))
        })?,
    };
    Ok(ImageRequest {
        expected: expected.clone(),
        tolerance,
    })
}

/// Parses `x y width height` from the agent's message. `Ok(None)` when the
/// message is not four integers; negative values are an error.
fn parse_bounds(cmd: &Command, message: &str) -> Result<Option<Bounds>, PlaybackResult> {
    let values: Result<Vec<i32>, _> = message.split_whitespace().map(str::parse).collect();
    let Ok(&[x, y, width, height]) = values.as_deref() else {
        return Ok(None);
    };
    if [x, y, width, height].iter().any(|v| *v < 0) {
        return Err(PlaybackResult::error(format!(
            "\"{}\" with MonkeyID, \"{}\" has invalid dimensions!",
            cmd.component_type, cmd.monkey_id
        )));
    }
    Ok(Some(Bounds {
        x,
        y,
        width,
        height,
    }))
}

/// Turns the agent's response into the command's result.
pub async fn complete(
    cmd: &Command,
    request: &ImageRequest,
    response: Response,
    verifier: Option<&dyn ImageVerifier>,
) -> PlaybackResult {
    let prefix = format!("command '{}' - ", cmd);
    if response.status != Status::Ok {
        let mut result = PlaybackResult::from_response(response);
        if result.message.is_empty() {
            result.message = format!("{}no message from agent", prefix);
        } else if !result.message.contains(&prefix) {
            result.message = format!("{}{}", prefix, result.message);
        }
        return result;
    }

    let Some(encoded) = response.image.as_deref() else {
        return PlaybackResult::error(format!("{}no screenshot received", prefix));
    };
    let captured = match STANDARD.decode(encoded) {
        Ok(bytes) => bytes,
        Err(e) => return PlaybackResult::error(format!("{}error decoding image: {}", prefix, e)),
    };
    let bounds = match parse_bounds(cmd, &response.message) {
        Ok(b) => b,
        Err(result) => return result,
    };

    let Some(verifier) = verifier else {
        let mut result = PlaybackResult::ok("").with_warning(format!(
            "{}image captured but not compared: no image verifier is configured",
            prefix
        ));
        result.bounds = bounds;
        return result;
    };
    let Some(bounds) = bounds else {
        return PlaybackResult::ok("").with_warning(format!(
            "{}unable to read component bounds from '{}', image not compared",
            prefix, response.message
        ));
    };

    let mut result = match verifier
        .verify(&request.expected, &captured, bounds, request.tolerance)
        .await
    {
        Ok(ImageMatch::Matched) => PlaybackResult::ok(""),
        Ok(ImageMatch::Mismatched) => PlaybackResult::failure(format!(
            "{}expected and captured images do not match.",
            prefix
        )),
        Ok(ImageMatch::Created) => PlaybackResult::ok("").with_warning(format!(
            "{}file '{}' was not found, creating it with the just-captured image",
            prefix, request.expected
        )),
        Err(e) => PlaybackResult::error(format!("{}{}", prefix, e)),
    };
    result.bounds = Some(bounds);
    result.image = Some(encoded.to_string());
    result
}
