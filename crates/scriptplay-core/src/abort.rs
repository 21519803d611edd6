//! Abort policy and abort requests.
//!
//! [`AbortPolicy`] decides whether a command's result stops the surrounding
//! command list. It is derived from each command's `%abort` modifier and
//! never carries over to the next command.
//!
//! [`AbortHandle`] lets another thread or task stop a running playback. It is
//! a pair of atomic flags, so requesting an abort never waits on a command
//! that is in flight; the playback loop observes the request just before its
//! next command.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::command::Command;
use crate::result::Status;

/// Which non-OK statuses stop the current command list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortPolicy {
    pub on_error: bool,
    pub on_failure: bool,
}

impl Default for AbortPolicy {
    fn default() -> Self {
        Self {
            on_error: true,
            on_failure: true,
        }
    }
}

impl AbortPolicy {
    /// Parses an `%abort` value. `error` keeps going on ERROR, `fail` keeps
    /// going on FAILURE, `never` keeps going on both. Tokens may be combined
    /// with commas.
    pub fn parse(value: &str) -> Self {
        let value = value.to_lowercase();
        let mut policy = Self::default();
        if value.contains("error") {
            policy.on_error = false;
        }
        if value.contains("fail") {
            policy.on_failure = false;
        }
        if value.contains("never") {
            policy.on_error = false;
            policy.on_failure = false;
        }
        policy
    }

    /// The policy for `command`: the default unless it carries `%abort`.
    pub fn for_command(command: &Command) -> Self {
        command
            .modifier(crate::command::ABORT_MODIFIER)
            .map(Self::parse)
            .unwrap_or_default()
    }

    pub fn triggered_by(&self, status: Status) -> bool {
        match status {
            Status::Ok => false,
            Status::Error => self.on_error,
            Status::Failure => self.on_failure,
        }
    }
}

#[derive(Debug, Default)]
struct Flags {
    pending: AtomicBool,
    active: AtomicBool,
}

/// Cloneable handle for requesting an abort from anywhere.
///
/// A request is `pending` until the innermost running command loop observes
/// it and records the abort. It stays `active` until the next top-level run
/// starts, which stops every enclosing loop (outer scripts, data rows and
/// suites) once the innermost loop has unwound.
#[derive(Debug, Default, Clone)]
pub struct AbortHandle {
    flags: Arc<Flags>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests an abort.
    pub fn abort(&self) {
        self.flags.pending.store(true, Ordering::SeqCst);
        self.flags.active.store(true, Ordering::SeqCst);
    }

    /// True when an abort was requested and no loop has recorded it yet.
    pub fn is_pending(&self) -> bool {
        self.flags.pending.load(Ordering::SeqCst)
    }

    /// True from the request until the next [`reset`](Self::reset).
    pub fn is_active(&self) -> bool {
        self.flags.active.load(Ordering::SeqCst)
    }

    /// Consumes a pending request.
    pub(crate) fn take_pending(&self) -> bool {
        self.flags.pending.swap(false, Ordering::SeqCst)
    }

    /// Clears the request. Called when a top-level run begins.
    pub fn reset(&self) {
        self.flags.pending.store(false, Ordering::SeqCst);
        self.flags.active.store(false, Ordering::SeqCst);
    }
}
