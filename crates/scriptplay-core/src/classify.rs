//! Command classification.
//!
//! A substituted command is classified once, in a fixed priority order, and
//! the processors dispatch on the resulting tag instead of re-inspecting
//! component types and actions.

use crate::command::Command;
use crate::store::{ScriptStore, JS_EXT, SCRIPT_EXT};

/// What a command inside a script does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Comment,
    /// Carries `%ignore=true`.
    Ignored,
    ScriptRun,
    ScriptRunIf,
    ScriptRunWith,
    /// `Globals.Define` or `Globals.Set`.
    GlobalsDefine,
    VarsDefine,
    /// `Vars.Verify`, `Vars.VerifyNot`, `Vars.VerifyWildcard` ...
    VarsVerify,
    /// A user-defined command backed by the script `filename`.
    Custom { filename: String },
    DebugPrint,
    DebugVars,
    SystemExec,
    SystemExecAndReturn,
    VerifyImage,
    /// `Test`, `Setup`, `Teardown` or `Suite` outside a suite.
    SuiteOnly,
    /// `Get` or `ExecAndReturn` on a component: stores the agent's answer.
    Get,
    /// `WaitFor*`: played as the matching `Verify*` with a timeout.
    WaitFor,
    /// Everything else goes to the agent unchanged.
    Vanilla,
}

/// File backing a custom command, if the store has one.
fn custom_filename(cmd: &Command, store: &dyn ScriptStore) -> Option<String> {
    let name = cmd.name();
    let filename = if store.has_override(&name) {
        format!("{}{}", name, JS_EXT)
    } else {
        format!("{}{}", name, SCRIPT_EXT)
    };
    store.file_exists(&filename).then_some(filename)
}

impl CommandKind {
    pub fn classify(cmd: &Command, store: &dyn ScriptStore) -> Self {
        if cmd.is_comment() {
            return Self::Comment;
        }
        if cmd.is_ignored() {
            return Self::Ignored;
        }

        let component = cmd.component_type.to_lowercase();
        let action = cmd.action.to_lowercase();
        match (component.as_str(), action.as_str()) {
            ("script", "run") => return Self::ScriptRun,
            ("script", "runif") => return Self::ScriptRunIf,
            ("script", "runwith") => return Self::ScriptRunWith,
            ("globals", "define" | "set") => return Self::GlobalsDefine,
            ("vars", "define") => return Self::VarsDefine,
            ("vars", a) if a.starts_with("verify") => return Self::VarsVerify,
            _ => {}
        }
        if let Some(filename) = custom_filename(cmd, store) {
            return Self::Custom { filename };
        }
        match (component.as_str(), action.as_str()) {
            ("debug", "print") => Self::DebugPrint,
            ("debug", "vars") => Self::DebugVars,
            ("system", "exec") => Self::SystemExec,
            ("system", "execandreturn") => Self::SystemExecAndReturn,
            (_, "verifyimage") => Self::VerifyImage,
            ("test" | "setup" | "teardown" | "suite", _) => Self::SuiteOnly,
            (_, "get" | "execandreturn") => Self::Get,
            (_, a) if a.starts_with("waitfor") => Self::WaitFor,
            _ => Self::Vanilla,
        }
    }
}

/// What a command at the top level of a suite does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteCommandKind {
    /// Comments and bare `Setup`/`Teardown` lines, which were collected
    /// before the suite started.
    Inert,
    IgnoredTest,
    TestRun,
    TestRunWith,
    IgnoredSuite,
    SuiteRun,
    SuiteRunWith,
    Illegal,
}

impl SuiteCommandKind {
    pub fn classify(cmd: &Command) -> Self {
        if cmd.is_comment() {
            return Self::Inert;
        }
        let component = cmd.component_type.to_lowercase();
        let action = cmd.action.to_lowercase();
        match component.as_str() {
            "setup" | "teardown" => Self::Inert,
            "test" if cmd.is_ignored() => Self::IgnoredTest,
            "test" if action == "run" => Self::TestRun,
            "test" if action == "runwith" => Self::TestRunWith,
            "suite" if cmd.modifier(crate::command::IGNORE_MODIFIER).is_some() => {
                Self::IgnoredSuite
            }
            "suite" if action == "run" => Self::SuiteRun,
            "suite" if action == "runwith" => Self::SuiteRunWith,
            _ => Self::Illegal,
        }
    }
}
