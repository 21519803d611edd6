//! Playback results and the execution trace.
//!
//! Every executed command produces a [`PlaybackResult`]. Results of command
//! lists carry the [`Step`]s that were run, and a step whose command recursed
//! into a child script holds that child's steps inside its own result, so
//! the whole run forms one tree that serializes to JSON for reporting.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::Response;
use crate::command::Command;
use crate::scope::{Scope, ScopeSnapshot};

/// Message used for every result produced by an abort request.
pub const ABORT_MESSAGE: &str = "playback aborted";

/// Outcome category of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// The command did what it was asked.
    Ok,
    /// The script or environment is broken (bad arguments, missing files, agent faults).
    Error,
    /// An assertion did not hold.
    Failure,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Ok => "OK",
            Status::Error => "ERROR",
            Status::Failure => "FAILURE",
        };
        f.write_str(s)
    }
}

/// Screen rectangle reported by the agent for an image verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// The outcome of one command or one command list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackResult {
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Text produced by `Debug.*` commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
    /// Base64 screenshot passed through from the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeSnapshot>,
    pub start_time: DateTime<Utc>,
    pub stop_time: DateTime<Utc>,
    /// Steps executed, present only for results of command lists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Step>>,
}

impl PlaybackResult {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            status,
            message: message.into(),
            warning: None,
            debug: None,
            image: None,
            bounds: None,
            scope: None,
            start_time: now,
            stop_time: now,
            steps: None,
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(Status::Ok, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Status::Error, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(Status::Failure, message)
    }

    /// The result recorded when an abort request is observed.
    pub fn aborted() -> Self {
        Self::error(ABORT_MESSAGE)
    }

    /// Copies status, message, warning and image from an agent response.
    pub fn from_response(response: Response) -> Self {
        let mut result = Self::new(response.status, response.message);
        result.warning = response.warning;
        result.image = response.image;
        result
    }

    /// Copy of the outcome fields (status, message, warning, debug, image,
    /// bounds) without the trace, scope or timings.
    pub fn summary(&self) -> Self {
        let mut copy = Self::new(self.status, self.message.clone());
        copy.warning = self.warning.clone();
        copy.debug = self.debug.clone();
        copy.image = self.image.clone();
        copy.bounds = self.bounds;
        copy
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        self.debug = Some(debug.into());
        self
    }

    pub fn with_scope(mut self, scope: &Scope<'_>) -> Self {
        self.scope = Some(scope.snapshot());
        self
    }

    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = Some(steps);
        self
    }

    /// Sets the start time to `start` and the stop time to now.
    pub fn timed(mut self, start: DateTime<Utc>) -> Self {
        self.start_time = start;
        self.stop_time = Utc::now();
        self
    }

    pub fn duration(&self) -> chrono::Duration {
        self.stop_time - self.start_time
    }

    pub fn steps(&self) -> &[Step] {
        self.steps.as_deref().unwrap_or(&[])
    }

    /// Number of steps in the whole tree below this result.
    pub fn count_steps(&self) -> usize {
        self.steps()
            .iter()
            .map(|s| 1 + s.result.count_steps())
            .sum()
    }

    /// First step anywhere in the tree, depth first, matching `pred`.
    pub fn find<F>(&self, pred: F) -> Option<&Step>
    where
        F: Fn(&Step) -> bool + Copy,
    {
        for step in self.steps() {
            if pred(step) {
                return Some(step);
            }
            if let Some(found) = step.result.find(pred) {
                return Some(found);
            }
        }
        None
    }
}

impl From<&PlaybackResult> for Response {
    fn from(result: &PlaybackResult) -> Self {
        Response {
            status: result.status,
            message: result.message.clone(),
            warning: result.warning.clone(),
            image: result.image.clone(),
        }
    }
}

impl fmt::Display for PlaybackResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.status, self.message)?;
        if let Some(w) = &self.warning {
            write!(f, " (warning: {})", w)?;
        }
        Ok(())
    }
}

/// One node of the execution trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// The command after substitution.
    pub command: Command,
    pub scope: ScopeSnapshot,
    /// 1-based position within the parent list.
    pub step_number: usize,
    pub result: PlaybackResult,
}

impl Step {
    pub fn new(command: Command, scope: &Scope<'_>, step_number: usize, result: PlaybackResult) -> Self {
        Self {
            command,
            scope: scope.snapshot(),
            step_number,
            result,
        }
    }
}
