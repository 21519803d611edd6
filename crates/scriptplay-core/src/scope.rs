//! Execution scopes.
//!
//! A [`Scope`] is one frame of the playback stack. It remembers the command
//! that created it (the source for `%{...}` substitutions), holds the frame's
//! local variables and tracks which command is currently executing. Frames
//! form a chain through borrowed parent references; a child never owns its
//! parent and is dropped when the construct that created it returns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::command::{Bindings, Command};
use crate::globals::Globals;

/// Label used for frames that were not loaded from a named file.
pub const UNNAMED_SCOPE: &str = "<commands>";

/// One frame of the playback stack.
#[derive(Debug, Default)]
pub struct Scope<'p> {
    parent: Option<&'p Scope<'p>>,
    filename: Option<String>,
    component_type: Option<String>,
    monkey_id: Option<String>,
    action: Option<String>,
    args: Vec<String>,
    variables: BTreeMap<String, String>,
    current_command: Option<Command>,
    current_index: usize,
}

impl<'p> Scope<'p> {
    /// Creates a root frame, optionally named after the script it runs.
    pub fn new(filename: Option<String>) -> Self {
        Self {
            filename,
            ..Self::default()
        }
    }

    /// Creates a root frame for an ad-hoc command list.
    pub fn root() -> Self {
        Self::new(None)
    }

    /// Creates a child frame for `command`, named after its monkey id.
    pub fn for_command(command: &Command, parent: &'p Scope<'p>) -> Self {
        Self::for_command_with(command, parent, BTreeMap::new())
    }

    /// Like [`for_command`](Self::for_command) but seeded with `variables`
    /// (one data row of a data-driven run).
    pub fn for_command_with(
        command: &Command,
        parent: &'p Scope<'p>,
        variables: BTreeMap<String, String>,
    ) -> Self {
        Self::for_file(command.monkey_id.clone(), command, parent, variables)
    }

    /// Creates a child frame for `filename`, taking its substitution source
    /// from `command`. Used by custom commands, where the file name differs
    /// from the invoking command's monkey id.
    pub fn for_file(
        filename: impl Into<String>,
        command: &Command,
        parent: &'p Scope<'p>,
        variables: BTreeMap<String, String>,
    ) -> Self {
        Self {
            parent: Some(parent),
            filename: Some(filename.into()),
            component_type: Some(command.component_type.clone()),
            monkey_id: Some(command.monkey_id.clone()),
            action: Some(command.action.clone()),
            args: command.args.clone(),
            variables,
            current_command: None,
            current_index: 0,
        }
    }

    pub fn parent(&self) -> Option<&'p Scope<'p>> {
        self.parent
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn component_type(&self) -> Option<&str> {
        self.component_type.as_deref()
    }

    pub fn monkey_id(&self) -> Option<&str> {
        self.monkey_id.as_deref()
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// Arguments of the command that created this frame.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn set_variables<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.set_variable(k, v);
        }
    }

    pub fn current_command(&self) -> Option<&Command> {
        self.current_command.as_ref()
    }

    /// 1-based index of the command currently executing, 0 before the first.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Records `command` as current and advances the index. Returns the new index.
    pub fn advance(&mut self, command: Command) -> usize {
        self.current_command = Some(command);
        self.current_index += 1;
        self.current_index
    }

    /// Resolves `%{...}` and `${...}` references in `command`.
    ///
    /// Variables are looked up in the globals merged with this frame's
    /// locals; a local shadows a global of the same name.
    pub fn substitute(&self, command: &Command, globals: &Globals) -> Command {
        if command.is_comment() {
            return command.clone();
        }
        let mut merged = globals.snapshot();
        merged.extend(self.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        command.substitute(&Bindings {
            component_type: self.component_type.as_deref(),
            monkey_id: self.monkey_id.as_deref(),
            action: self.action.as_deref(),
            args: &self.args,
            variables: &merged,
        })
    }

    /// Frame names from the root down, joined by `delim`.
    pub fn hierarchy(&self, delim: &str, with_index: bool) -> String {
        let own = format!(
            "{}{}",
            self.filename.as_deref().unwrap_or(UNNAMED_SCOPE),
            if with_index {
                format!(":{}", self.current_index)
            } else {
                String::new()
            }
        );
        match self.parent {
            Some(parent) => format!("{}{}{}", parent.hierarchy(delim, with_index), delim, own),
            None => own,
        }
    }

    /// Multi-line stack trace, innermost frame first.
    pub fn trace(&self) -> String {
        let cmd = self
            .current_command
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "<unknown command>".to_string());
        let vars = if self.variables.is_empty() {
            String::new()
        } else {
            let pairs: Vec<String> = self
                .variables
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            format!(" [{}]", pairs.join(" "))
        };
        let line = format!(
            "  at {}{} ({} : cmd #{})",
            cmd,
            vars,
            self.filename.as_deref().unwrap_or(UNNAMED_SCOPE),
            self.current_index
        );
        match self.parent {
            Some(parent) => format!("{}\n{}", line, parent.trace()),
            None => line,
        }
    }

    /// Owned copy of the frame's reportable state.
    pub fn snapshot(&self) -> ScopeSnapshot {
        ScopeSnapshot {
            filename: self.filename.clone(),
            hierarchy: self.hierarchy(" > ", false),
            index: self.current_index,
            variables: self.variables.clone(),
        }
    }
}

/// Frame state captured into the execution trace.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScopeSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub hierarchy: String,
    pub index: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub variables: BTreeMap<String, String>,
}
