//! Suite playback.
//!
//! A suite is a command list made of `Test`, `Setup`, `Teardown` and nested
//! `Suite` commands. Every `Setup` and `Teardown` line in a suite wraps every
//! test of that suite: each test runs as setup, test body, teardown, and the
//! three traces are merged into one test result. Test bodies are played by
//! the [`ScriptProcessor`] the suite processor wraps.
//!
//! Unlike a script, a suite keeps going after a failing test. It only stops
//! when an abort is requested or when it meets a command that has no meaning
//! in a suite.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::abort::AbortHandle;
use crate::classify::SuiteCommandKind;
use crate::command::Command;
use crate::flatten::SuiteFlattener;
use crate::listener::{NoopListener, SuiteListener};
use crate::result::{PlaybackResult, Status, Step};
use crate::scope::Scope;
use crate::script::{load_data, row_command, BoxFuture, ScriptProcessor};
use crate::store::{has_ext, SCRIPT_EXT};

/// Tail of the error raised for commands a suite cannot run. A result
/// carrying it always stops the suite.
pub const BAD_SUITE_COMMAND: &str =
    "is illegal -- only Test, Setup, Teardown, and Suite are allowed";

/// Display name of a test: the script, plus its arguments when it has any.
fn test_name(cmd: &Command) -> String {
    if cmd.args.is_empty() {
        cmd.monkey_id.clone()
    } else {
        format!("{}[{}]", cmd.monkey_id, cmd.args_as_string().replace('"', "'"))
    }
}

/// Display name of one data row of a `Test.RunWith`.
fn row_test_name(cmd: &Command, row: &[(String, String)]) -> String {
    let values: Vec<String> = row.iter().map(|(k, v)| format!("{}='{}'", k, v)).collect();
    format!("{}[{}]", cmd.monkey_id, values.join(" "))
}

/// Runs suites on top of a [`ScriptProcessor`].
pub struct SuiteProcessor {
    script: ScriptProcessor,
    listener: Arc<dyn SuiteListener>,
}

impl SuiteProcessor {
    pub fn new(script: ScriptProcessor) -> Self {
        Self {
            script,
            listener: Arc::new(NoopListener),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn SuiteListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn script_processor(&self) -> &ScriptProcessor {
        &self.script
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.script.abort_handle()
    }

    pub fn abort(&self) {
        self.script.abort();
    }

    /// Runs the suite `name` from the top.
    pub async fn run_suite(&self, name: &str) -> PlaybackResult {
        self.script.abort_handle().reset();
        let total = SuiteFlattener::new(self.script.store().as_ref()).flatten(name);
        self.listener.on_run_start(total);

        let mut scope = Scope::new(Some(name.to_string()));
        let span = info_span!("run_suite", suite = name, total);
        let result = async {
            let result = self.run_suite_in(name, &mut scope).await;
            info!(status = %result.status, tests = result.steps().len(), "suite complete");
            result
        }
        .instrument(span)
        .await;

        self.listener.on_run_complete(&result);
        result
    }

    /// Runs the suite `name` in `scope`. Used for the top-level suite and for
    /// every nested `Suite.Run`.
    pub fn run_suite_in<'a, 's: 'a>(
        &'a self,
        name: &'a str,
        scope: &'a mut Scope<'s>,
    ) -> BoxFuture<'a, PlaybackResult> {
        Box::pin(async move {
            let start = Utc::now();
            self.script.agent().start().await;

            if name.is_empty() {
                return PlaybackResult::error("suite filename is empty").with_scope(scope);
            }
            let commands = match self.script.store().get_suite(name) {
                Some(commands) => commands,
                None if has_ext(name, SCRIPT_EXT) => {
                    return PlaybackResult::error(format!(
                        "running script '{}' as a suite is not allowed",
                        name
                    ))
                    .with_scope(scope)
                }
                None => {
                    return PlaybackResult::error(format!("suite '{}' not found", name))
                        .with_scope(scope)
                }
            };
            if commands.is_empty() {
                self.listener.on_suite_start(0);
                let result = PlaybackResult::error(format!("suite '{}' is empty", name))
                    .with_scope(scope)
                    .timed(start);
                self.listener.on_suite_complete(&result);
                return result;
            }

            let fixture = |component: &str| -> Vec<Command> {
                commands
                    .iter()
                    .filter(|c| !c.is_comment() && c.component_type.eq_ignore_ascii_case(component))
                    .cloned()
                    .collect()
            };
            let setup = fixture("setup");
            let teardown = fixture("teardown");
            let total = SuiteFlattener::new(self.script.store().as_ref()).count_tests(&commands);
            self.listener.on_suite_start(total);

            let mut tests = TestCounter { number: 0, total };
            let mut steps: Vec<Step> = Vec::new();
            let mut stopped: Option<PlaybackResult> = None;
            for cmd in &commands {
                let kind = SuiteCommandKind::classify(cmd);
                if kind == SuiteCommandKind::Inert {
                    continue;
                }
                let full = scope.substitute(cmd, self.script.globals());
                let step_number = scope.advance(full.clone());

                if self.script.abort_handle().take_pending() {
                    warn!(command = %full, step = step_number, "suite aborted");
                    steps.push(Step::new(full, scope, step_number, PlaybackResult::aborted()));
                    stopped = Some(PlaybackResult::aborted());
                    break;
                }

                let result = match kind {
                    SuiteCommandKind::Inert => continue,
                    SuiteCommandKind::IgnoredTest => {
                        let name = test_name(&full);
                        self.report_test(&name, &mut tests, PlaybackResult::ok("ignored"))
                    }
                    SuiteCommandKind::TestRun => {
                        let name = test_name(&full);
                        tests.number += 1;
                        self.listener.on_test_start(&name, tests.number, tests.total);
                        let result = self
                            .run_test(&full, &setup, &teardown, scope, BTreeMap::new())
                            .await;
                        self.listener.on_test_complete(&name, &result);
                        result
                    }
                    SuiteCommandKind::TestRunWith => {
                        self.run_test_with(&full, &setup, &teardown, scope, &mut tests)
                            .await
                    }
                    SuiteCommandKind::IgnoredSuite => PlaybackResult::ok("ignored"),
                    SuiteCommandKind::SuiteRun => {
                        let mut child = Scope::for_command(&full, scope);
                        self.run_suite_in(&full.monkey_id, &mut child).await
                    }
                    SuiteCommandKind::SuiteRunWith => PlaybackResult::error(
                        "command 'suite.runwith' is illegal -- only suite.run is allowed",
                    ),
                    SuiteCommandKind::Illegal => PlaybackResult::error(format!(
                        "command '{}' {}",
                        full.name(),
                        BAD_SUITE_COMMAND
                    )),
                };
                debug!(command = %full, step = step_number, status = %result.status, "suite step complete");

                if self.script.abort_handle().is_active() {
                    stopped = Some(PlaybackResult::aborted());
                } else if result.status == Status::Error && result.message.contains(BAD_SUITE_COMMAND) {
                    stopped = Some(result.summary());
                }
                steps.push(Step::new(full, scope, step_number, result));
                if stopped.is_some() {
                    break;
                }
            }

            let result = stopped
                .unwrap_or_else(|| PlaybackResult::ok(""))
                .with_steps(steps)
                .with_scope(scope)
                .timed(start);
            self.listener.on_suite_complete(&result);
            result
        })
    }

    /// Reports `result` as a complete test without running anything.
    fn report_test(&self, name: &str, tests: &mut TestCounter, result: PlaybackResult) -> PlaybackResult {
        tests.number += 1;
        self.listener.on_test_start(name, tests.number, tests.total);
        self.listener.on_test_complete(name, &result);
        result
    }

    /// `Test x RunWith data.csv`: one setup, test, teardown run per row.
    async fn run_test_with(
        &self,
        cmd: &Command,
        setup: &[Command],
        teardown: &[Command],
        scope: &Scope<'_>,
        tests: &mut TestCounter,
    ) -> PlaybackResult {
        let start = Utc::now();
        let Some(datafile) = cmd.args.first() else {
            let result =
                PlaybackResult::error(format!("datafile arg missing in command '{}'", cmd));
            return self.report_test(&test_name(cmd), tests, result);
        };
        let rows = match load_data(self.script.store().as_ref(), datafile) {
            Ok(rows) => rows,
            Err(result) => return self.report_test(&test_name(cmd), tests, result),
        };

        let mut steps = Vec::with_capacity(rows.len());
        let mut aborted: Option<PlaybackResult> = None;
        for (i, row) in rows.into_iter().enumerate() {
            let row_number = i + 1;
            let name = row_test_name(cmd, &row);
            tests.number += 1;
            self.listener.on_test_start(&name, tests.number, tests.total);
            let result = self
                .run_test(cmd, setup, teardown, scope, row.into_iter().collect())
                .await;
            self.listener.on_test_complete(&name, &result);

            if self.script.abort_handle().is_active() {
                aborted = Some(result.summary());
            }
            steps.push(Step::new(
                row_command(cmd, datafile, row_number),
                scope,
                row_number,
                result,
            ));
            if aborted.is_some() {
                break;
            }
        }

        aborted
            .unwrap_or_else(|| PlaybackResult::ok(""))
            .with_steps(steps)
            .with_scope(scope)
            .timed(start)
    }

    /// Runs one test: setup, body, teardown.
    ///
    /// A failing setup ends the test with the setup's result. A failing
    /// teardown turns an OK test into the teardown's result.
    async fn run_test(
        &self,
        cmd: &Command,
        setup: &[Command],
        teardown: &[Command],
        scope: &Scope<'_>,
        row: BTreeMap<String, String>,
    ) -> PlaybackResult {
        let start = Utc::now();
        let mut steps = Vec::new();

        if !cmd.is_ignored_for("setup") {
            let mut setup_result = self.run_fixtures(setup, scope).await;
            steps.extend(setup_result.steps.take().unwrap_or_default());
            if !setup_result.is_ok() {
                return setup_result.with_steps(steps).with_scope(scope).timed(start);
            }
        }

        let mut child = Scope::for_command_with(cmd, scope, row);
        let mut test = self.script.run_script_in(&cmd.monkey_id, &mut child).await;
        steps.extend(test.steps.take().unwrap_or_default());
        let mut result = test.summary();

        if !cmd.is_ignored_for("teardown") {
            let mut teardown_result = self.run_fixtures(teardown, scope).await;
            steps.extend(teardown_result.steps.take().unwrap_or_default());
            if result.is_ok() && !teardown_result.is_ok() {
                result = teardown_result.summary();
            }
        }

        result.with_steps(steps).with_scope(scope).timed(start)
    }

    /// Runs `Setup` or `Teardown` commands in order, stopping at the first
    /// one that is not OK.
    async fn run_fixtures(&self, fixtures: &[Command], scope: &Scope<'_>) -> PlaybackResult {
        let mut steps = Vec::new();
        let mut failed: Option<PlaybackResult> = None;
        for (i, cmd) in fixtures.iter().enumerate() {
            let full = scope.substitute(cmd, self.script.globals());
            let result = match full.action.to_lowercase().as_str() {
                "run" => {
                    let mut child = Scope::for_command(&full, scope);
                    self.script.run_script_in(&full.monkey_id, &mut child).await
                }
                "runwith" => self.run_fixture_rows(&full, scope).await,
                _ => PlaybackResult::error(format!(
                    "command '{}' is illegal -- only Setup.Run, Setup.RunWith, Teardown.Run and Teardown.RunWith are allowed",
                    full.name()
                )),
            };
            if !result.is_ok() {
                failed = Some(result.summary());
            }
            steps.push(Step::new(full, scope, i + 1, result));
            if failed.is_some() {
                break;
            }
        }
        failed
            .unwrap_or_else(|| PlaybackResult::ok(""))
            .with_steps(steps)
    }

    /// `Setup x RunWith data.csv` / `Teardown x RunWith data.csv`.
    async fn run_fixture_rows(&self, cmd: &Command, scope: &Scope<'_>) -> PlaybackResult {
        let Some(datafile) = cmd.args.first() else {
            return PlaybackResult::error(format!("datafile arg missing in command '{}'", cmd));
        };
        let rows = match load_data(self.script.store().as_ref(), datafile) {
            Ok(rows) => rows,
            Err(result) => return result,
        };

        let mut steps = Vec::with_capacity(rows.len());
        let mut failed: Option<PlaybackResult> = None;
        for (i, row) in rows.into_iter().enumerate() {
            let mut child = Scope::for_command_with(cmd, scope, row.into_iter().collect());
            let result = self.script.run_script_in(&cmd.monkey_id, &mut child).await;
            if !result.is_ok() {
                failed = Some(result.summary());
            }
            steps.push(Step::new(row_command(cmd, datafile, i + 1), scope, i + 1, result));
            if failed.is_some() {
                break;
            }
        }
        failed
            .unwrap_or_else(|| PlaybackResult::ok(""))
            .with_steps(steps)
    }
}

/// Progress numbering for the tests of one suite.
struct TestCounter {
    number: usize,
    total: usize,
}
