//! Shared test helpers for scriptplay-core integration tests.
//!
//! Provides a programmable in-process agent, a listener that records every
//! notification, and shortcuts for wiring processors to them.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing_subscriber::filter::LevelFilter;

use scriptplay_core::abort::AbortHandle;
use scriptplay_core::agent::{CommandSender, Response};
use scriptplay_core::command::Command;
use scriptplay_core::listener::{PlaybackListener, SuiteListener};
use scriptplay_core::result::PlaybackResult;
use scriptplay_core::scope::Scope;
use scriptplay_core::script::ScriptProcessor;
use scriptplay_core::store::MemoryStore;
use scriptplay_core::suite::SuiteProcessor;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Route `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Log output collected by [`capture_logs`].
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Collects INFO and above on the current thread until the guard drops.
/// Use with the default current-thread `#[tokio::test]` runtime.
pub fn capture_logs() -> (LogCapture, tracing::subscriber::DefaultGuard) {
    let capture = LogCapture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (capture, tracing::subscriber::set_default(subscriber))
}

// ---------------------------------------------------------------------------
// Programmable mock agent
// ---------------------------------------------------------------------------

/// How the mock agent answers a command matching a rule.
#[derive(Clone)]
pub enum MockBehavior {
    /// Reply with the given response.
    Respond(Response),
    /// Sleep for `Duration`, then reply.
    Delay(Duration, Response),
    /// Request an abort through the handle, then reply. Simulates a user
    /// pressing stop while the command is in flight.
    Abort(AbortHandle, Response),
}

/// In-process agent. Commands are matched against rules in the order the
/// rules were added; the first rule whose pattern occurs in the command's
/// text decides the answer. Unmatched commands get an empty OK.
#[derive(Default)]
pub struct MockAgent {
    rules: Mutex<Vec<(String, MockBehavior)>>,
    sent: Mutex<Vec<Command>>,
    starts: AtomicUsize,
}

impl MockAgent {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Adds a rule for commands whose text contains `pattern`.
    pub fn on(self: &Arc<Self>, pattern: &str, behavior: MockBehavior) -> Arc<Self> {
        self.rules
            .lock()
            .unwrap()
            .push((pattern.to_string(), behavior));
        self.clone()
    }

    /// Shortcut for a `Respond` rule.
    pub fn reply(self: &Arc<Self>, pattern: &str, response: Response) -> Arc<Self> {
        self.on(pattern, MockBehavior::Respond(response))
    }

    /// Every command received so far, exactly as sent.
    pub fn sent(&self) -> Vec<Command> {
        self.sent.lock().unwrap().clone()
    }

    /// Received commands rendered without their modifiers.
    pub fn sent_lines(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .map(|mut c| {
                c.modifiers.clear();
                c.to_string()
            })
            .collect()
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandSender for MockAgent {
    async fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    async fn send(&self, command: &Command) -> Response {
        self.sent.lock().unwrap().push(command.clone());
        let text = command.to_string();
        let behavior = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|(pattern, _)| text.contains(pattern.as_str()))
            .map(|(_, b)| b.clone());
        match behavior {
            None => Response::ok(""),
            Some(MockBehavior::Respond(response)) => response,
            Some(MockBehavior::Delay(duration, response)) => {
                tokio::time::sleep(duration).await;
                response
            }
            Some(MockBehavior::Abort(handle, response)) => {
                handle.abort();
                response
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Recording listener
// ---------------------------------------------------------------------------

/// Records notifications as short strings, e.g. `test_start login.mt 1/3`.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<String>>,
    printed: Mutex<String>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Events starting with `prefix`.
    pub fn events_like(&self, prefix: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.starts_with(prefix))
            .collect()
    }

    pub fn printed(&self) -> String {
        self.printed.lock().unwrap().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl PlaybackListener for RecordingListener {
    fn on_script_start(&self, scope: &Scope<'_>) {
        self.push(format!("script_start {}", scope.hierarchy(" > ", false)));
    }

    fn on_script_complete(&self, scope: &Scope<'_>, result: &PlaybackResult) {
        self.push(format!(
            "script_complete {} {}",
            scope.hierarchy(" > ", false),
            result.status
        ));
    }

    fn on_start(&self, scope: &Scope<'_>) {
        let cmd = scope.current_command().map(|c| c.to_string()).unwrap_or_default();
        self.push(format!("start {}", cmd));
    }

    fn on_complete(&self, _scope: &Scope<'_>, response: &Response) {
        self.push(format!("complete {}", response.status));
    }

    fn on_print(&self, message: &str) {
        self.printed.lock().unwrap().push_str(message);
    }
}

impl SuiteListener for RecordingListener {
    fn on_run_start(&self, total: i64) {
        self.push(format!("run_start {}", total));
    }

    fn on_run_complete(&self, result: &PlaybackResult) {
        self.push(format!("run_complete {}", result.status));
    }

    fn on_test_start(&self, name: &str, number: usize, total: usize) {
        self.push(format!("test_start {} {}/{}", name, number, total));
    }

    fn on_test_complete(&self, name: &str, result: &PlaybackResult) {
        self.push(format!("test_complete {} {}", name, result.status));
    }

    fn on_suite_start(&self, total: usize) {
        self.push(format!("suite_start {}", total));
    }

    fn on_suite_complete(&self, result: &PlaybackResult) {
        self.push(format!("suite_complete {}", result.status));
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub fn script_processor(store: MemoryStore, agent: &Arc<MockAgent>) -> ScriptProcessor {
    init_tracing();
    ScriptProcessor::new(Arc::new(store), agent.clone())
}

pub fn suite_processor(
    store: MemoryStore,
    agent: &Arc<MockAgent>,
    listener: &Arc<RecordingListener>,
) -> SuiteProcessor {
    SuiteProcessor::new(script_processor(store, agent)).with_listener(listener.clone())
}

/// Top-level command lines of a result's steps.
pub fn step_lines(result: &PlaybackResult) -> Vec<String> {
    result
        .steps()
        .iter()
        .map(|s| s.command.to_string())
        .collect()
}
