//! `Vars.Define` and `Vars.Verify*`.

use crate::command::Command;
use crate::error::VariableError;
use crate::globals::{unquote, validate_variable, Globals};
use crate::result::PlaybackResult;
use crate::scope::Scope;
use crate::store::{has_ext, DATA_EXT};
use crate::verify::VerifyKind;

/// Declares script parameters as local variables.
///
/// Each argument is `name=default` or a bare `name` (default `<name>`).
/// A variable already present in the scope (set by a data row) is left
/// alone. Otherwise the value is the positional argument of the command
/// that invoked the script, or the default when there is none or it is `*`.
pub fn define(cmd: &Command, scope: &mut Scope<'_>) -> PlaybackResult {
    if cmd.args.is_empty() {
        return PlaybackResult::error(format!(
            "command '{}' must define at least one variable",
            cmd.name()
        ));
    }

    for (i, arg) in cmd.args.iter().enumerate() {
        let (key, default) = match arg.split_once('=') {
            Some((k, v)) => (k.to_string(), unquote(v).to_string()),
            None => (arg.clone(), format!("<{}>", arg)),
        };
        if validate_variable(&key).is_err() {
            return PlaybackResult::error(format!(
                "command '{}' has {}",
                cmd.name(),
                VariableError::Illegal(key)
            ));
        }

        if scope.has_variable(&key) {
            continue;
        }
        let value = match scope.args().get(i) {
            Some(parent) if parent == "*" => default,
            Some(parent) if i == 0 && has_ext(parent, DATA_EXT) => {
                return PlaybackResult::error(format!(
                    "datafile '{}' is missing column '{}' from the header row",
                    parent, key
                ));
            }
            Some(parent) => parent.clone(),
            None => default,
        };
        scope.set_variable(key, value);
    }
    PlaybackResult::ok("")
}

/// Compares a variable's value with an expected value.
///
/// `Vars * Verify <expected> <name>`; the variable is looked up in the
/// scope first, then in the globals.
pub fn verify(cmd: &Command, scope: &Scope<'_>, globals: &Globals) -> PlaybackResult {
    let (expected, name) = match cmd.args.as_slice() {
        [] => {
            return PlaybackResult::error(format!(
                "command '{}' must have the expected value as its first arg",
                cmd
            ))
        }
        [_] => {
            return PlaybackResult::error(format!(
                "command '{}' must have a variable as its second arg",
                cmd
            ))
        }
        [expected, name, ..] => (expected, name),
    };

    let value = match scope.variable(name) {
        Some(v) => v.to_string(),
        None => match globals.get(name) {
            Some(v) => v,
            None => {
                return PlaybackResult::error(format!(
                    "command '{}' must have a valid variable as its second arg -- variable '{}' not found",
                    cmd, name
                ))
            }
        },
    };

    let Some(kind) = VerifyKind::parse(&cmd.action) else {
        return PlaybackResult::error(format!(
            "command '{}' has unknown action '{}'",
            cmd, cmd.action
        ));
    };
    match kind.check(expected, &value) {
        Ok(None) => PlaybackResult::ok(""),
        Ok(Some(msg)) => PlaybackResult::failure(msg),
        Err(e) => PlaybackResult::error(format!("command '{}' has invalid pattern: {}", cmd, e)),
    }
}
