//! Top-level entry point.
//!
//! [`Runner`] picks the processor from the file extension, prepares the
//! global variables and wires fresh processors to the agent for every run.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use scriptplay_core::runner::Runner;
//! use scriptplay_core::store::MemoryStore;
//! # use async_trait::async_trait;
//! # use scriptplay_core::agent::{CommandSender, Response};
//! # use scriptplay_core::command::Command;
//! # struct Agent;
//! # #[async_trait]
//! # impl CommandSender for Agent {
//! #     async fn send(&self, _: &Command) -> Response { Response::ok("") }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new()
//!         .with_script("login.mt", "Input name EnterText ${user}")
//!         .with_suite("all.mts", "Test login.mt Run");
//!     let runner = Runner::new(Arc::new(store), Arc::new(Agent));
//!
//!     let globals = vec![("user".to_string(), "joe".to_string())];
//!     let result = runner.run("all.mts", &globals).await?;
//!     println!("{}", result);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tracing::{info, info_span, Instrument};

use crate::abort::AbortHandle;
use crate::agent::CommandSender;
use crate::commands::verify_image::ImageVerifier;
use crate::config::PlaybackConfig;
use crate::error::RunnerError;
use crate::globals::Globals;
use crate::listener::{PlaybackListener, SuiteListener, TracingListener};
use crate::result::PlaybackResult;
use crate::script::{ScriptOverride, ScriptProcessor};
use crate::store::{has_ext, ScriptStore, JS_EXT, SCRIPT_EXT, SUITE_EXT};
use crate::suite::SuiteProcessor;

/// Runs scripts and suites by name.
pub struct Runner {
    store: Arc<dyn ScriptStore>,
    agent: Arc<dyn CommandSender>,
    config: PlaybackConfig,
    globals: Arc<Globals>,
    playback_listener: Arc<dyn PlaybackListener>,
    suite_listener: Arc<dyn SuiteListener>,
    script_override: Option<Arc<dyn ScriptOverride>>,
    image_verifier: Option<Arc<dyn ImageVerifier>>,
    abort: AbortHandle,
}

impl Runner {
    /// Creates a runner that reports progress through [`TracingListener`]
    /// until other listeners are installed.
    pub fn new(store: Arc<dyn ScriptStore>, agent: Arc<dyn CommandSender>) -> Self {
        Self {
            store,
            agent,
            config: PlaybackConfig::default(),
            globals: Arc::new(Globals::new()),
            playback_listener: Arc::new(TracingListener),
            suite_listener: Arc::new(TracingListener),
            script_override: None,
            image_verifier: None,
            abort: AbortHandle::new(),
        }
    }

    pub fn with_config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_playback_listener(mut self, listener: Arc<dyn PlaybackListener>) -> Self {
        self.playback_listener = listener;
        self
    }

    pub fn with_suite_listener(mut self, listener: Arc<dyn SuiteListener>) -> Self {
        self.suite_listener = listener;
        self
    }

    pub fn with_override(mut self, script_override: Arc<dyn ScriptOverride>) -> Self {
        self.script_override = Some(script_override);
        self
    }

    pub fn with_image_verifier(mut self, verifier: Arc<dyn ImageVerifier>) -> Self {
        self.image_verifier = Some(verifier);
        self
    }

    /// Global variables of the current (or last) run.
    pub fn globals(&self) -> &Arc<Globals> {
        &self.globals
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Stops whichever script or suite is running.
    pub fn abort(&self) {
        self.abort.abort();
    }

    fn script_processor(&self) -> ScriptProcessor {
        let mut processor = ScriptProcessor::new(self.store.clone(), self.agent.clone())
            .with_config(self.config.clone())
            .with_globals(self.globals.clone())
            .with_listener(self.playback_listener.clone())
            .with_abort_handle(self.abort.clone());
        if let Some(script_override) = &self.script_override {
            processor = processor.with_override(script_override.clone());
        }
        if let Some(verifier) = &self.image_verifier {
            processor = processor.with_image_verifier(verifier.clone());
        }
        processor
    }

    /// Runs the script (`.mt`, `.js`) or suite (`.mts`) `name`.
    ///
    /// `globals` replace whatever the previous run left behind. Problems in
    /// the script itself are reported in the returned result; only invalid
    /// inputs are errors.
    pub async fn run(
        &self,
        name: &str,
        globals: &[(String, String)],
    ) -> Result<PlaybackResult, RunnerError> {
        if name.trim().is_empty() {
            return Err(RunnerError::MissingName);
        }
        let is_script = has_ext(name, SCRIPT_EXT) || has_ext(name, JS_EXT);
        let is_suite = has_ext(name, SUITE_EXT);
        if !is_script && !is_suite {
            return Err(RunnerError::UnsupportedExtension(name.to_string()));
        }

        self.globals.clear();
        self.globals
            .set_all(globals.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
        self.abort.reset();

        let span = info_span!("run", name, globals = globals.len());
        let result = async {
            let script = self.script_processor();
            if is_suite {
                SuiteProcessor::new(script)
                    .with_listener(self.suite_listener.clone())
                    .run_suite(name)
                    .await
            } else {
                script.run_script(name).await
            }
        }
        .instrument(span)
        .await;

        info!(
            name,
            status = %result.status,
            message = %result.message,
            steps = result.count_steps(),
            elapsed_ms = result.duration().num_milliseconds(),
            "run complete"
        );
        Ok(result)
    }
}
