//! Script playback.
//!
//! [`ScriptProcessor`] interprets one command list at a time: it substitutes
//! each command against the current [`Scope`], classifies it, runs built-in
//! commands itself and sends everything else to the agent. `Script.Run`,
//! `Script.RunWith` and custom commands recurse into child scopes, and every
//! executed command leaves a [`Step`] in the returned result.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use scriptplay_core::agent::{CommandSender, Response};
//! use scriptplay_core::script::ScriptProcessor;
//! use scriptplay_core::store::MemoryStore;
//! # use async_trait::async_trait;
//! # use scriptplay_core::command::Command;
//! # struct Agent;
//! # #[async_trait]
//! # impl CommandSender for Agent {
//! #     async fn send(&self, _: &Command) -> Response { Response::ok("") }
//! # }
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new().with_script("login.mt", "Input name EnterText joe\nButton ok Tap");
//!     let processor = ScriptProcessor::new(Arc::new(store), Arc::new(Agent));
//!     let result = processor.run_script("login.mt").await;
//!     println!("{} ({} steps)", result, result.steps().len());
//! }
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::abort::{AbortHandle, AbortPolicy};
use crate::agent::{CommandSender, Response};
use crate::classify::CommandKind;
use crate::command::{Command, SCREENSHOT_ON_ERROR_MODIFIER, TIMEOUT_MODIFIER};
use crate::commands;
use crate::commands::verify_image::ImageVerifier;
use crate::config::PlaybackConfig;
use crate::error::ILLEGAL_VARIABLE_MSG;
use crate::globals::{validate_variable, Globals};
use crate::listener::{NoopListener, PlaybackListener};
use crate::result::{PlaybackResult, Status, Step};
use crate::scope::Scope;
use crate::store::{has_ext, DataRow, ScriptStore, SUITE_EXT};

/// Boxed future used where playback recurses.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Alternate runner for scripts the store marks as overridden (for example
/// scripts written in JavaScript).
#[async_trait]
pub trait ScriptOverride: Send + Sync {
    /// Runs `name` with `args`. `scope` is the frame created for the script.
    async fn run(&self, name: &str, args: &[String], scope: &Scope<'_>) -> PlaybackResult;
}

/// Loads the rows of `datafile`, or the ERROR result explaining why not.
pub(crate) fn load_data(
    store: &dyn ScriptStore,
    datafile: &str,
) -> Result<Vec<DataRow>, PlaybackResult> {
    match store.get_data(datafile) {
        None => Err(PlaybackResult::error(format!(
            "datafile '{}' not found",
            datafile
        ))),
        Some(rows) if rows.is_empty() => Err(PlaybackResult::error(format!(
            "datafile '{}' has no data",
            datafile
        ))),
        Some(rows) => Ok(rows),
    }
}

/// `cmd` with its first argument replaced by `datafile[@row]`, as recorded
/// in the trace for each row of a data-driven run.
pub(crate) fn row_command(cmd: &Command, datafile: &str, row: usize) -> Command {
    let mut step = cmd.clone();
    if let Some(first) = step.args.first_mut() {
        *first = format!("{}[@{}]", datafile, row);
    }
    step
}

/// Interprets scripts and command lists.
pub struct ScriptProcessor {
    store: Arc<dyn ScriptStore>,
    agent: Arc<dyn CommandSender>,
    globals: Arc<Globals>,
    listener: Arc<dyn PlaybackListener>,
    script_override: Option<Arc<dyn ScriptOverride>>,
    image_verifier: Option<Arc<dyn ImageVerifier>>,
    config: PlaybackConfig,
    abort: AbortHandle,
}

impl ScriptProcessor {
    pub fn new(store: Arc<dyn ScriptStore>, agent: Arc<dyn CommandSender>) -> Self {
        Self {
            store,
            agent,
            globals: Arc::new(Globals::new()),
            listener: Arc::new(NoopListener),
            script_override: None,
            image_verifier: None,
            config: PlaybackConfig::default(),
            abort: AbortHandle::new(),
        }
    }

    pub fn with_config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_globals(mut self, globals: Arc<Globals>) -> Self {
        self.globals = globals;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn PlaybackListener>) -> Self {
        self.listener = listener;
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

    /// Shares `abort` with other processors so one request stops them all.
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn globals(&self) -> &Arc<Globals> {
        &self.globals
    }

    pub fn store(&self) -> &Arc<dyn ScriptStore> {
        &self.store
    }

    pub fn agent(&self) -> &Arc<dyn CommandSender> {
        &self.agent
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Requests an abort; the running list stops before its next command.
    pub fn abort(&self) {
        self.abort.abort();
    }

    /// True once an abort has been recorded by an inner loop, so enclosing
    /// loops must stop as well.
    pub(crate) fn should_stop(&self) -> bool {
        self.abort.is_active() && !self.abort.is_pending()
    }

    /// Runs the script `name` in a fresh root scope.
    pub async fn run_script(&self, name: &str) -> PlaybackResult {
        self.abort.reset();
        let mut scope = Scope::new(Some(name.to_string()));
        let span = info_span!("run_script", script = name);
        async {
            let result = self.run_script_in(name, &mut scope).await;
            info!(status = %result.status, steps = result.steps().len(), "script complete");
            result
        }
        .instrument(span)
        .await
    }

    /// Runs an ad-hoc command list in a fresh root scope.
    pub async fn run(&self, commands: &[Command]) -> PlaybackResult {
        self.abort.reset();
        let mut scope = Scope::root();
        self.run_commands(commands, &mut scope).await
    }

    /// Runs the script `name` in `scope`, which the caller has already set
    /// up for it. Scripts with an override go to the [`ScriptOverride`].
    pub fn run_script_in<'a, 's: 'a>(
        &'a self,
        name: &'a str,
        scope: &'a mut Scope<'s>,
    ) -> BoxFuture<'a, PlaybackResult> {
        Box::pin(async move {
            let start = Utc::now();
            if self.store.has_override(name) {
                return self.run_override(name, scope).await;
            }
            let result = match self.store.get_script(name) {
                None if has_ext(name, SUITE_EXT) => PlaybackResult::error(format!(
                    "running suite '{}' as a script is not allowed",
                    name
                )),
                None => PlaybackResult::error(format!("script '{}' not found", name)),
                Some(commands) if commands.is_empty() => {
                    PlaybackResult::error(format!("script '{}' is empty", name))
                }
                Some(commands) => return self.run_commands(&commands, scope).await,
            };
            result.with_scope(scope).timed(start)
        })
    }

    async fn run_override(&self, name: &str, scope: &mut Scope<'_>) -> PlaybackResult {
        let Some(script_override) = &self.script_override else {
            return PlaybackResult::error(format!(
                "script '{}' requires a script override, but none is configured",
                name
            ))
            .with_scope(scope);
        };
        let args: Vec<String> = if scope.variables().is_empty() {
            scope.args().to_vec()
        } else {
            scope.variables().values().cloned().collect()
        };
        debug!(script = name, ?args, "running override");
        self.agent.start().await;
        script_override.run(name, &args, scope).await
    }

    /// Plays `commands` in order inside `scope`.
    ///
    /// Stops at the first command whose result triggers its abort policy,
    /// or when an abort is requested. The overall result takes the status
    /// and message of the last command that ran.
    pub async fn run_commands(&self, commands: &[Command], scope: &mut Scope<'_>) -> PlaybackResult {
        let start = Utc::now();
        self.agent.start().await;
        self.listener.on_script_start(scope);

        if commands.is_empty() {
            let result = PlaybackResult::ok("empty command list")
                .with_steps(Vec::new())
                .with_scope(scope)
                .timed(start);
            self.listener.on_script_complete(scope, &result);
            return result;
        }

        let mut steps: Vec<Step> = Vec::new();
        for cmd in commands {
            if cmd.is_comment() {
                continue;
            }
            let full = scope.substitute(cmd, &self.globals);
            let step_number = scope.advance(full.clone());

            if self.abort.take_pending() {
                warn!(command = %full, step = step_number, "playback aborted");
                steps.push(Step::new(full, scope, step_number, PlaybackResult::aborted()));
                break;
            }

            let policy = AbortPolicy::for_command(&full);
            let result = self.run_command(full.clone(), scope).await;
            let status = result.status;
            debug!(command = %full, step = step_number, status = %status, "step complete");
            steps.push(Step::new(full, scope, step_number, result));

            if policy.triggered_by(status) || self.should_stop() {
                break;
            }
        }

        let result = steps
            .last()
            .map(|step| step.result.summary())
            .unwrap_or_else(|| PlaybackResult::ok(""));
        let result = result.with_steps(steps).with_scope(scope).timed(start);
        self.listener.on_script_complete(scope, &result);
        result
    }

    /// Executes one already-substituted command in `scope`.
    pub async fn run_command(&self, cmd: Command, scope: &mut Scope<'_>) -> PlaybackResult {
        let kind = CommandKind::classify(&cmd, self.store.as_ref());
        if kind == CommandKind::Comment {
            return PlaybackResult::ok("");
        }
        self.listener.on_start(scope);
        let start = Utc::now();
        let result = self.dispatch(cmd, kind, scope).await.timed(start);
        self.listener.on_complete(scope, &Response::from(&result));
        result
    }

    async fn dispatch(&self, cmd: Command, kind: CommandKind, scope: &mut Scope<'_>) -> PlaybackResult {
        if kind == CommandKind::Ignored {
            return PlaybackResult::ok("ignored");
        }
        if self.config.strict_variables {
            if let Some(name) = cmd.unresolved_variables().first() {
                return PlaybackResult::error(format!(
                    "command '{}' references undefined variable '{}'",
                    cmd, name
                ));
            }
        }
        debug!(command = %cmd, ?kind, "dispatch");

        match kind {
            CommandKind::Comment => PlaybackResult::ok(""),
            CommandKind::Ignored => PlaybackResult::ok("ignored"),
            CommandKind::ScriptRun => {
                self.run_child(cmd.monkey_id.clone(), &cmd, scope, BTreeMap::new())
                    .await
            }
            CommandKind::ScriptRunIf => self.run_if(&cmd, scope).await,
            CommandKind::ScriptRunWith => self.run_with(&cmd, scope).await,
            CommandKind::GlobalsDefine => commands::globals::define(&cmd, &self.globals),
            CommandKind::VarsDefine => commands::vars::define(&cmd, scope),
            CommandKind::VarsVerify => commands::vars::verify(&cmd, scope, &self.globals),
            CommandKind::Custom { filename } => {
                self.run_child(filename, &cmd, scope, BTreeMap::new()).await
            }
            CommandKind::DebugPrint => commands::debug::print(&cmd, self.listener.as_ref()),
            CommandKind::DebugVars => commands::debug::vars(scope, self.listener.as_ref()),
            CommandKind::SystemExec => commands::system::exec(&cmd).await,
            CommandKind::SystemExecAndReturn => {
                commands::system::exec_and_return(&cmd, scope).await
            }
            CommandKind::VerifyImage => self.verify_image(&cmd).await,
            CommandKind::SuiteOnly => PlaybackResult::error(format!(
                "command '{}' is only allowed in a suite (maybe you need to change the file extension to .mts?)",
                cmd.name()
            )),
            CommandKind::Get => self.get(&cmd, scope).await,
            CommandKind::WaitFor => self.wait_for(cmd).await,
            CommandKind::Vanilla => PlaybackResult::from_response(self.send(&cmd).await),
        }
    }

    /// Runs the script `filename` in a child of `scope` created by `cmd`.
    async fn run_child(
        &self,
        filename: String,
        cmd: &Command,
        scope: &Scope<'_>,
        variables: BTreeMap<String, String>,
    ) -> PlaybackResult {
        let mut child = Scope::for_file(filename.clone(), cmd, scope, variables);
        self.run_script_in(&filename, &mut child).await
    }

    /// `Script x RunIf <verify command>`: runs `x` only when the verify holds.
    async fn run_if(&self, cmd: &Command, scope: &mut Scope<'_>) -> PlaybackResult {
        if cmd.args.is_empty() {
            return PlaybackResult::error(format!(
                "command '{}' must have a valid verify command as its arguments",
                cmd
            ));
        }
        let condition = Command::parse(&format!(
            "{} {}",
            cmd.args_as_string(),
            cmd.modifiers_as_string()
        ));
        if !condition.action.to_lowercase().starts_with("verify") {
            return PlaybackResult::error(format!(
                "command '{}' has invalid verify command '{}'",
                cmd, condition
            ));
        }

        let response = self.send(&condition).await;
        match response.status {
            Status::Ok => {
                let run = Command::new(
                    cmd.component_type.clone(),
                    cmd.monkey_id.clone(),
                    "Run",
                    Vec::new(),
                    BTreeMap::new(),
                );
                self.run_child(cmd.monkey_id.clone(), &run, scope, BTreeMap::new())
                    .await
            }
            Status::Failure => PlaybackResult::ok(format!(
                "not running {} - {}",
                cmd.monkey_id, response.message
            )),
            Status::Error => {
                PlaybackResult::error(format!("verify error - {}", response.message))
            }
        }
    }

    /// `Script x RunWith data.csv`: runs `x` once per data row.
    async fn run_with(&self, cmd: &Command, scope: &mut Scope<'_>) -> PlaybackResult {
        let start = Utc::now();
        let Some(datafile) = cmd.args.first() else {
            return PlaybackResult::error(format!(
                "command '{}' must have a datafile as its first arg",
                cmd
            ));
        };
        let rows = match load_data(self.store.as_ref(), datafile) {
            Ok(rows) => rows,
            Err(result) => return result,
        };

        let policy = AbortPolicy::for_command(cmd);
        let mut steps = Vec::with_capacity(rows.len());
        let mut aborted: Option<PlaybackResult> = None;
        for (i, row) in rows.into_iter().enumerate() {
            let row_number = i + 1;
            let variables: BTreeMap<String, String> = row.into_iter().collect();
            let result = self
                .run_child(cmd.monkey_id.clone(), cmd, scope, variables)
                .await;
            let stop = policy.triggered_by(result.status) || self.should_stop();
            if stop {
                aborted = Some(result.summary());
            }
            steps.push(Step::new(
                row_command(cmd, datafile, row_number),
                scope,
                row_number,
                result,
            ));
            if stop {
                break;
            }
        }

        let processed = format!("{} data records processed", steps.len());
        let result = match aborted {
            Some(row) if row.message.is_empty() => PlaybackResult::new(row.status, processed),
            Some(row) => PlaybackResult::new(row.status, format!("{}: {}", row.message, processed)),
            None => PlaybackResult::ok(processed),
        };
        result.with_steps(steps).with_scope(scope).timed(start)
    }

    /// `Get` / `ExecAndReturn`: stores the agent's answer in a variable,
    /// whatever its status.
    ///
    /// An existing local wins, then an existing global; otherwise a new local
    /// is created.
    async fn get(&self, cmd: &Command, scope: &mut Scope<'_>) -> PlaybackResult {
        let Some(var) = cmd.args.first() else {
            return PlaybackResult::error(format!(
                "command '{}' must have a variable as its first arg",
                cmd
            ));
        };
        if validate_variable(var).is_err() {
            return PlaybackResult::error(format!(
                "command '{}' has illegal variable '{}' as its first arg -- {}",
                cmd, var, ILLEGAL_VARIABLE_MSG
            ));
        }

        let mut result = PlaybackResult::from_response(self.send(cmd).await);
        let value = result.message.clone();
        if scope.has_variable(var) || !self.globals.contains(var) {
            scope.set_variable(var.clone(), value);
        } else if let Err(e) = self.globals.set(var, value) {
            return PlaybackResult::error(format!("command '{}' has {}", cmd, e));
        }
        if var == "value" {
            result = result.with_warning(format!(
                "command '{}' uses variable 'value' -- did you mean to use it as a property instead?",
                cmd
            ));
        }
        result
    }

    /// `WaitFor* [seconds]`: played as the matching `Verify*` with
    /// `%timeout` set to the wait.
    async fn wait_for(&self, cmd: Command) -> PlaybackResult {
        let mut timeout_ms = self.config.waitfor_timeout_secs.saturating_mul(1000);
        if let Some(first) = cmd.args.first().filter(|a| !a.is_empty()) {
            let not_a_number = || {
                PlaybackResult::error(format!(
                    "command '{}' must have a number of seconds to wait as its first arg, found: {}",
                    cmd, first
                ))
            };
            let Ok(secs) = first.trim().parse::<i64>() else {
                return not_a_number();
            };
            if secs < 1 {
                return PlaybackResult::error(format!(
                    "command '{}' must have a number of seconds to wait greater than zero, found: {}",
                    cmd, first
                ));
            }
            match u64::try_from(secs).ok().and_then(|s| s.checked_mul(1000)) {
                Some(ms) => timeout_ms = ms,
                None => return not_a_number(),
            }
        }

        let verify = Command {
            action: cmd.action.to_lowercase().replacen("waitfor", "verify", 1),
            args: cmd.args.iter().skip(1).cloned().collect(),
            ..cmd
        }
        .with_modifier(TIMEOUT_MODIFIER, timeout_ms.to_string());
        PlaybackResult::from_response(self.send(&verify).await)
    }

    async fn verify_image(&self, cmd: &Command) -> PlaybackResult {
        let request = match commands::verify_image::parse_request(cmd) {
            Ok(request) => request,
            Err(result) => return result,
        };
        let response = self.send(cmd).await;
        commands::verify_image::complete(cmd, &request, response, self.image_verifier.as_deref())
            .await
    }

    /// Sends `cmd` to the agent.
    ///
    /// Default timings are stamped onto the outgoing copy, screenshots on
    /// error are switched off unless enabled, and `%shouldfail=true` swaps
    /// OK and FAILURE in the response.
    pub async fn send(&self, cmd: &Command) -> Response {
        let mut outgoing = cmd
            .clone()
            .with_default_timings(self.config.timeout_ms, self.config.thinktime_ms);
        let should_fail = outgoing.should_fail();
        if outgoing.screenshot_on_error().is_none()
            && (!self.config.screenshot_on_error || should_fail)
        {
            outgoing = outgoing.with_modifier(SCREENSHOT_ON_ERROR_MODIFIER, "false");
        }

        debug!(command = %outgoing, "send");
        let response = self.agent.send(&outgoing).await;
        if !should_fail {
            return response;
        }
        match response.status {
            Status::Ok => Response {
                status: Status::Failure,
                message: "expected failure, but was OK".to_string(),
                ..response
            },
            Status::Failure => {
                let message = format!("expected failure : {}", response.message);
                Response {
                    status: Status::Ok,
                    message,
                    ..response
                }
            }
            Status::Error => response,
        }
    }
}
