//! `System.Exec` and `System.ExecAndReturn`.
//!
//! The program runs to completion before the script continues. Its stdout
//! and stderr are combined into the result message; a non-zero exit status
//! makes the result an ERROR with `err <code>` appended.

use tokio::process::Command as Process;
use tracing::debug;

use crate::command::Command;
use crate::result::PlaybackResult;
use crate::scope::Scope;

/// Runs `argv` and turns its outcome into a result.
pub async fn run(argv: &[String]) -> PlaybackResult {
    let Some((program, args)) = argv.split_first() else {
        return PlaybackResult::error("no system command given");
    };
    debug!(program = %program, ?args, "exec");

    let output = match Process::new(program).args(args).output().await {
        Ok(output) => output,
        Err(e) => return PlaybackResult::error(format!("failed to run '{}': {}", program, e)),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = stdout.trim_end();
    let stderr = stderr.trim_end();
    let mut out = stdout.to_string();
    if !stdout.is_empty() && !stderr.is_empty() {
        out.push('\n');
    }
    out.push_str(stderr);

    if output.status.success() {
        PlaybackResult::ok(out)
    } else {
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        if !out.is_empty() {
            out.push('\n');
        }
        PlaybackResult::error(format!("{}err {}", out, code))
    }
}

/// `System * Exec program args...`
pub async fn exec(cmd: &Command) -> PlaybackResult {
    if cmd.args.is_empty() {
        return PlaybackResult::error(format!(
            "command '{}' must have a system command to execute as its first arg",
            cmd
        ));
    }
    run(&cmd.args).await
}

/// `System * ExecAndReturn variable program args...`
///
/// Stores the combined output in the named local variable.
pub async fn exec_and_return(cmd: &Command, scope: &mut Scope<'_>) -> PlaybackResult {
    match cmd.args.as_slice() {
        [] => PlaybackResult::error(format!(
            "command '{}' must have a variable as its first arg",
            cmd
        )),
        [_] => PlaybackResult::error(format!(
            "command '{}' must have a system command to execute as its second arg",
            cmd
        )),
        [var, argv @ ..] => {
            let result = run(argv).await;
            scope.set_variable(var.clone(), result.message.clone());
            result
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::result::Status;

    #[tokio::test]
    async fn exec_captures_output() {
        let r = exec(&Command::parse("System * Exec echo hello")).await;
        assert_eq!(r.status, Status::Ok);
        assert_eq!(r.message, "hello");
    }

    #[tokio::test]
    async fn exec_nonzero_exit_is_error() {
        let r = exec(&Command::parse(r#"System * Exec sh -c "echo out; echo bad >&2; exit 3""#)).await;
        assert_eq!(r.status, Status::Error);
        assert_eq!(r.message, "out\nbad\nerr 3");
    }

    #[tokio::test]
    async fn exec_missing_program_is_error() {
        let r = exec(&Command::parse("System * Exec definitely-not-a-real-program-xyz")).await;
        assert_eq!(r.status, Status::Error);
    }

    #[tokio::test]
    async fn exec_and_return_stores_output() {
        let mut scope = Scope::root();
        let r = exec_and_return(&Command::parse("System * ExecAndReturn out echo hi"), &mut scope).await;
        assert_eq!(r.status, Status::Ok);
        assert_eq!(scope.variable("out"), Some("hi"));
    }

    #[tokio::test]
    async fn argument_errors() {
        let r = exec(&Command::parse("System * Exec")).await;
        assert!(r.message.ends_with("must have a system command to execute as its first arg"));
        let mut scope = Scope::root();
        let r = exec_and_return(&Command::parse("System * ExecAndReturn out"), &mut scope).await;
        assert!(r.message.ends_with("must have a system command to execute as its second arg"));
    }
}
