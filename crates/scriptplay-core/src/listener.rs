//! Lifecycle notifications.
//!
//! Listeners are pure observers: the engine ignores anything they do and
//! they must not panic. Every method has a no-op default so implementors
//! only override what they care about.

use tracing::{debug, info};

use crate::agent::Response;
use crate::result::PlaybackResult;
use crate::scope::Scope;

/// Script-level notifications.
pub trait PlaybackListener: Send + Sync {
    /// A command list is about to run in `scope`.
    fn on_script_start(&self, _scope: &Scope<'_>) {}

    /// A command list finished.
    fn on_script_complete(&self, _scope: &Scope<'_>, _result: &PlaybackResult) {}

    /// The scope's current command is about to run.
    fn on_start(&self, _scope: &Scope<'_>) {}

    /// The scope's current command finished.
    fn on_complete(&self, _scope: &Scope<'_>, _response: &Response) {}

    /// Output from `Debug.Print` and friends.
    fn on_print(&self, _message: &str) {}
}

/// Suite-level notifications.
pub trait SuiteListener: Send + Sync {
    /// A top-level suite run begins; `total` is the flattened test count.
    fn on_run_start(&self, _total: i64) {}

    fn on_run_complete(&self, _result: &PlaybackResult) {}

    /// A test begins. `number` is 1-based within its suite.
    fn on_test_start(&self, _name: &str, _number: usize, _total: usize) {}

    fn on_test_complete(&self, _name: &str, _result: &PlaybackResult) {}

    /// A (possibly nested) suite begins with `total` top-level tests.
    fn on_suite_start(&self, _total: usize) {}

    fn on_suite_complete(&self, _result: &PlaybackResult) {}
}

/// Listener that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl PlaybackListener for NoopListener {}
impl SuiteListener for NoopListener {}

/// Listener that reports progress as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

impl PlaybackListener for TracingListener {
    fn on_script_start(&self, scope: &Scope<'_>) {
        debug!(scope = %scope.hierarchy(" > ", false), "script start");
    }

    fn on_script_complete(&self, scope: &Scope<'_>, result: &PlaybackResult) {
        debug!(
            scope = %scope.hierarchy(" > ", false),
            status = %result.status,
            "script complete"
        );
    }

    fn on_start(&self, scope: &Scope<'_>) {
        if let Some(cmd) = scope.current_command() {
            info!(step = scope.current_index(), command = %cmd, "start");
        }
    }

    fn on_complete(&self, scope: &Scope<'_>, response: &Response) {
        info!(
            step = scope.current_index(),
            status = %response.status,
            message = %response.message,
            "complete"
        );
    }

    fn on_print(&self, message: &str) {
        info!(target: "scriptplay::print", "{}", message.trim_end());
    }
}

impl SuiteListener for TracingListener {
    fn on_run_start(&self, total: i64) {
        info!(total, "suite run start");
    }

    fn on_run_complete(&self, result: &PlaybackResult) {
        info!(status = %result.status, message = %result.message, "suite run complete");
    }

    fn on_test_start(&self, name: &str, number: usize, total: usize) {
        info!(test = name, number, total, "test start");
    }

    fn on_test_complete(&self, name: &str, result: &PlaybackResult) {
        info!(test = name, status = %result.status, message = %result.message, "test complete");
    }

    fn on_suite_start(&self, total: usize) {
        debug!(total, "suite start");
    }

    fn on_suite_complete(&self, result: &PlaybackResult) {
        debug!(status = %result.status, "suite complete");
    }
}
