//! `Debug.Print` and `Debug.Vars`.

use crate::command::Command;
use crate::listener::PlaybackListener;
use crate::result::PlaybackResult;
use crate::scope::Scope;

/// Prints the arguments joined by spaces.
pub fn print(cmd: &Command, listener: &dyn PlaybackListener) -> PlaybackResult {
    let message = cmd.args.join(" ");
    listener.on_print(&format!("{}\n", message));
    PlaybackResult::ok("").with_debug(message)
}

/// Prints the scope's local variables, one `name=value` per line.
pub fn vars(scope: &Scope<'_>, listener: &dyn PlaybackListener) -> PlaybackResult {
    let message: String = scope
        .variables()
        .iter()
        .map(|(k, v)| format!("{}={}\n", k, v))
        .collect();
    listener.on_print(&message);
    PlaybackResult::ok("").with_debug(message)
}
