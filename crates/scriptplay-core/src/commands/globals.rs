//! `Globals.Define` and `Globals.Set`.

use crate::command::Command;
use crate::globals::{unquote, Globals};
use crate::result::PlaybackResult;

/// Sets one global per `name=value` argument.
///
/// Stops at the first malformed argument or rejected name; globals set
/// before that point stay set.
pub fn define(cmd: &Command, globals: &Globals) -> PlaybackResult {
    if cmd.args.is_empty() {
        return PlaybackResult::error(format!(
            "command '{}' must define at least one global variable",
            cmd.name()
        ));
    }

    for arg in &cmd.args {
        let Some((name, value)) = arg.split_once('=') else {
            return PlaybackResult::error(format!(
                "command '{}' has bad argument '{}' -- arguments must be in the form of name=value",
                cmd.name(),
                arg
            ));
        };
        if let Err(e) = globals.set(name, unquote(value)) {
            return PlaybackResult::error(format!("command '{}' has {}", cmd.name(), e));
        }
    }
    PlaybackResult::ok("")
}
