//! Script processor integration tests against the in-process mock agent.

mod common;

use std::sync::Arc;

use async_trait::async_trait;

use scriptplay_core::agent::Response;
use scriptplay_core::command::Command;
use scriptplay_core::config::PlaybackConfig;
use scriptplay_core::result::{PlaybackResult, Status};
use scriptplay_core::scope::Scope;
use scriptplay_core::script::ScriptOverride;
use scriptplay_core::store::MemoryStore;

use common::{script_processor, step_lines, MockAgent, RecordingListener};

// ---------------------------------------------------------------------------
// Sequencing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_command_list_is_ok_with_no_steps() {
    let agent = MockAgent::new();
    let listener = RecordingListener::new();
    let processor = script_processor(MemoryStore::new(), &agent).with_listener(listener.clone());

    let result = processor.run(&[]).await;

    assert_eq!(result.status, Status::Ok);
    assert_eq!(result.message, "empty command list");
    assert!(result.steps().is_empty());
    assert_eq!(
        listener.events(),
        vec!["script_start <commands>", "script_complete <commands> OK"]
    );
    assert!(agent.sent().is_empty());
}

#[tokio::test]
async fn overall_result_is_last_command() {
    let agent = MockAgent::new().reply("Label title Verify", Response::ok("verified").with_warning("slow"));
    let processor = script_processor(MemoryStore::new(), &agent);

    let result = processor
        .run(&Command::parse_lines("Button ok Tap\n# comment\nLabel title Verify Hello"))
        .await;

    assert_eq!(result.status, Status::Ok);
    assert_eq!(result.message, "verified");
    assert_eq!(result.warning.as_deref(), Some("slow"));
    assert_eq!(result.steps().len(), 2);
    assert_eq!(result.steps()[1].step_number, 2);
    assert_eq!(agent.sent_lines(), vec!["Button ok Tap", "Label title Verify Hello"]);
}

#[tokio::test]
async fn only_comments_is_ok_with_empty_message() {
    let agent = MockAgent::new();
    let processor = script_processor(MemoryStore::new(), &agent);
    let result = processor.run(&Command::parse_lines("# one\n# two")).await;
    assert_eq!(result.status, Status::Ok);
    assert_eq!(result.message, "");
    assert!(result.steps().is_empty());
}

#[tokio::test]
async fn failure_stops_the_list_by_default() {
    let agent = MockAgent::new().reply("Label a Verify", Response::failure("Expected \"x\" but found \"y\""));
    let processor = script_processor(MemoryStore::new(), &agent);

    let result = processor
        .run(&Command::parse_lines("Button ok Tap\nLabel a Verify x\nButton never Tap"))
        .await;

    assert_eq!(result.status, Status::Failure);
    assert_eq!(result.steps().len(), 2);
    assert_eq!(agent.sent().len(), 2);
}

#[tokio::test]
async fn abort_never_keeps_going_after_an_error() {
    let agent = MockAgent::new().reply("Button broken Tap", Response::error("no such button"));
    let processor = script_processor(MemoryStore::new(), &agent);

    let result = processor
        .run(&Command::parse_lines(
            "Button broken Tap %abort=never\nButton ok Tap\nButton done Tap",
        ))
        .await;

    assert_eq!(result.status, Status::Ok);
    assert_eq!(result.steps().len(), 3);
    assert_eq!(result.steps()[0].result.status, Status::Error);
    assert_eq!(agent.sent().len(), 3);
}

#[tokio::test]
async fn abort_policy_is_not_sticky() {
    let agent = MockAgent::new().reply("Tap", Response::error("boom"));
    let processor = script_processor(MemoryStore::new(), &agent);

    let result = processor
        .run(&Command::parse_lines("Button a Tap %abort=error\nButton b Tap\nButton c Tap"))
        .await;

    assert_eq!(result.steps().len(), 2);
    assert_eq!(result.status, Status::Error);
}

// ---------------------------------------------------------------------------
// Script.Run / RunIf / RunWith
// ---------------------------------------------------------------------------

#[tokio::test]
async fn script_run_passes_arguments() {
    let store = MemoryStore::new()
        .with_script("main.mt", "Script login.mt Run joe *")
        .with_script("login.mt", "Vars * Define user pass=secret\nInput name EnterText ${user}\nInput pw EnterText ${pass}");
    let agent = MockAgent::new();
    let processor = script_processor(store, &agent);

    let result = processor.run_script("main.mt").await;

    assert_eq!(result.status, Status::Ok, "{}", result);
    assert_eq!(
        agent.sent_lines(),
        vec!["Input name EnterText joe", "Input pw EnterText secret"]
    );
    let child = &result.steps()[0].result;
    assert_eq!(child.steps().len(), 3);
    assert_eq!(
        child.scope.as_ref().map(|s| s.hierarchy.as_str()),
        Some("main.mt > login.mt")
    );
    assert_eq!(result.count_steps(), 4);
}

#[tokio::test]
async fn missing_script_is_an_error() {
    let agent = MockAgent::new();
    let processor = script_processor(MemoryStore::new().with_script("main.mt", "Script nope.mt Run"), &agent);
    let result = processor.run_script("main.mt").await;
    assert_eq!(result.status, Status::Error);
    assert_eq!(result.message, "script 'nope.mt' not found");

    let result = processor.run_script("all.mts").await;
    assert_eq!(result.message, "running suite 'all.mts' as a script is not allowed");
}

#[tokio::test]
async fn run_if_false_condition_skips_body() {
    let store = MemoryStore::new().with_script("body.mt", "Button inside Tap");
    let agent = MockAgent::new().reply("Label flag Verify", Response::failure("nope"));
    let processor = script_processor(store, &agent);

    let result = processor
        .run(&Command::parse_lines("Script body.mt RunIf Label flag Verify on"))
        .await;

    assert_eq!(result.status, Status::Ok);
    assert_eq!(result.message, "not running body.mt - nope");
    assert_eq!(agent.sent_lines(), vec!["Label flag Verify on"]);
}

#[tokio::test]
async fn run_if_true_condition_runs_body() {
    let store = MemoryStore::new().with_script("body.mt", "Button inside Tap");
    let agent = MockAgent::new();
    let processor = script_processor(store, &agent);

    let result = processor
        .run(&Command::parse_lines("Script body.mt RunIf Label flag Verify on %timeout=100"))
        .await;

    assert_eq!(result.status, Status::Ok);
    let sent = agent.sent();
    assert_eq!(sent[0].timeout_ms(), Some(100));
    assert_eq!(agent.sent_lines(), vec!["Label flag Verify on", "Button inside Tap"]);
}

#[tokio::test]
async fn run_if_rejects_non_verify_conditions() {
    let agent = MockAgent::new().reply("Verify", Response::error("agent down"));
    let processor = script_processor(MemoryStore::new().with_script("b.mt", "Button x Tap"), &agent);

    let r = processor.run(&Command::parse_lines("Script b.mt RunIf")).await;
    assert!(r.message.ends_with("must have a valid verify command as its arguments"));

    let r = processor.run(&Command::parse_lines("Script b.mt RunIf Button x Tap")).await;
    assert!(r.message.contains("has invalid verify command 'Button x Tap'"));

    let r = processor.run(&Command::parse_lines("Script b.mt RunIf Label x Verify")).await;
    assert_eq!(r.status, Status::Error);
    assert_eq!(r.message, "verify error - agent down");
}

#[tokio::test]
async fn run_with_plays_each_row() {
    let store = MemoryStore::new()
        .with_script("login.mt", "Vars * Define user\nInput name EnterText ${user}")
        .with_data("users.csv", "user\nann\nbob\ncat\n");
    let agent = MockAgent::new();
    let processor = script_processor(store, &agent);

    let result = processor
        .run(&Command::parse_lines("Script login.mt RunWith users.csv"))
        .await;

    assert_eq!(result.status, Status::Ok);
    let run_with = &result.steps()[0].result;
    assert_eq!(run_with.message, "3 data records processed");
    assert_eq!(
        step_lines(run_with),
        vec![
            "Script login.mt RunWith users.csv[@1]",
            "Script login.mt RunWith users.csv[@2]",
            "Script login.mt RunWith users.csv[@3]",
        ]
    );
    assert_eq!(
        agent.sent_lines(),
        vec![
            "Input name EnterText ann",
            "Input name EnterText bob",
            "Input name EnterText cat",
        ]
    );
}

#[tokio::test]
async fn run_with_stops_at_failing_row() {
    let store = MemoryStore::new()
        .with_script("check.mt", "Vars * Define v\nLabel out Verify ${v}")
        .with_data("values.csv", "v\n1\n2\n3\n");
    let agent = MockAgent::new().reply("Verify 2", Response::failure("mismatch"));
    let processor = script_processor(store, &agent);

    let result = processor
        .run(&Command::parse_lines("Script check.mt RunWith values.csv"))
        .await;

    assert_eq!(result.status, Status::Failure);
    assert_eq!(result.message, "mismatch: 2 data records processed");
    assert_eq!(result.steps()[0].result.steps().len(), 2);
}

#[tokio::test]
async fn run_with_data_errors() {
    let store = MemoryStore::new()
        .with_script("s.mt", "Vars * Define nope\nButton x Tap")
        .with_data("empty.csv", "a\n")
        .with_data("cols.csv", "a\n1\n");
    let agent = MockAgent::new();
    let processor = script_processor(store, &agent);

    let r = processor.run(&Command::parse_lines("Script s.mt RunWith")).await;
    assert!(r.message.ends_with("must have a datafile as its first arg"));
    let r = processor.run(&Command::parse_lines("Script s.mt RunWith gone.csv")).await;
    assert_eq!(r.message, "datafile 'gone.csv' not found");
    let r = processor.run(&Command::parse_lines("Script s.mt RunWith empty.csv")).await;
    assert_eq!(r.message, "datafile 'empty.csv' has no data");

    let r = processor.run(&Command::parse_lines("Script s.mt RunWith cols.csv")).await;
    assert_eq!(r.status, Status::Error);
    assert_eq!(
        r.message,
        "datafile 'cols.csv' is missing column 'nope' from the header row: 1 data records processed"
    );
}

// ---------------------------------------------------------------------------
// Custom commands and overrides
// ---------------------------------------------------------------------------

#[tokio::test]
async fn custom_command_uses_invoking_command_as_source() {
    let store = MemoryStore::new().with_script(
        "login.submit.mt",
        "Vars * Define user\nInput %{monkeyId} EnterText ${user}\nButton %{2} Tap",
    );
    let agent = MockAgent::new();
    let processor = script_processor(store, &agent);

    let result = processor
        .run(&Command::parse_lines("Login form Submit joe go"))
        .await;

    assert_eq!(result.status, Status::Ok, "{}", result);
    assert_eq!(
        agent.sent_lines(),
        vec!["Input form EnterText joe", "Button go Tap"]
    );
}

struct EchoOverride;

#[async_trait]
impl ScriptOverride for EchoOverride {
    async fn run(&self, name: &str, args: &[String], _scope: &Scope<'_>) -> PlaybackResult {
        PlaybackResult::ok(format!("{}({})", name, args.join(",")))
    }
}

#[tokio::test]
async fn overridden_scripts_go_to_the_override() {
    let store = MemoryStore::new().with_override("login.submit");
    let agent = MockAgent::new();

    let processor = script_processor(store.clone(), &agent);
    let result = processor.run(&Command::parse_lines("Login x Submit a b")).await;
    assert_eq!(result.status, Status::Error);
    assert!(result.message.contains("requires a script override"));

    let processor = script_processor(store, &agent).with_override(Arc::new(EchoOverride));
    let result = processor.run(&Command::parse_lines("Login x Submit a b")).await;
    assert_eq!(result.status, Status::Ok);
    assert_eq!(result.message, "login.submit.js(a,b)");
}

// ---------------------------------------------------------------------------
// Vanilla send path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn default_timings_are_stamped_on_outgoing_commands() {
    let agent = MockAgent::new();
    let config = PlaybackConfig {
        timeout_ms: 750,
        thinktime_ms: 20,
        ..PlaybackConfig::default()
    };
    let processor = script_processor(MemoryStore::new(), &agent).with_config(config);

    let result = processor
        .run(&Command::parse_lines("Button a Tap\nButton b Tap %timeout=5"))
        .await;

    let sent = agent.sent();
    assert_eq!(sent[0].timeout_ms(), Some(750));
    assert_eq!(sent[0].thinktime_ms(), Some(20));
    assert_eq!(sent[1].timeout_ms(), Some(5));
    // the trace keeps the command as written
    assert_eq!(result.steps()[0].command.timeout_ms(), None);
}

#[tokio::test]
async fn screenshot_on_error_is_switched_off_when_disabled() {
    let agent = MockAgent::new();
    let config = PlaybackConfig {
        screenshot_on_error: false,
        ..PlaybackConfig::default()
    };
    let processor = script_processor(MemoryStore::new(), &agent).with_config(config);
    processor
        .run(&Command::parse_lines("Button a Tap\nButton b Tap %screenshotonerror=true"))
        .await;

    let sent = agent.sent();
    assert_eq!(sent[0].screenshot_on_error(), Some(false));
    assert_eq!(sent[1].screenshot_on_error(), Some(true));
}

#[tokio::test]
async fn should_fail_swaps_ok_and_failure() {
    let agent = MockAgent::new()
        .reply("Label a", Response::failure("wrong text"))
        .reply("Label b", Response::ok(""))
        .reply("Label c", Response::error("gone"));
    let processor = script_processor(MemoryStore::new(), &agent);

    let result = processor
        .run(&Command::parse_lines(
            "Label a Verify x %shouldfail=true\nLabel b Verify x %shouldfail=true %abort=fail\nLabel c Verify x %shouldfail=true",
        ))
        .await;

    let steps = result.steps();
    assert_eq!(steps[0].result.status, Status::Ok);
    assert_eq!(steps[0].result.message, "expected failure : wrong text");
    assert_eq!(steps[1].result.status, Status::Failure);
    assert_eq!(steps[1].result.message, "expected failure, but was OK");
    assert_eq!(steps[2].result.status, Status::Error);
    assert_eq!(agent.sent()[0].screenshot_on_error(), Some(false));
}

#[tokio::test]
async fn strict_variables_reject_unresolved_references() {
    let agent = MockAgent::new();
    let config = PlaybackConfig {
        strict_variables: true,
        ..PlaybackConfig::default()
    };
    let processor = script_processor(MemoryStore::new(), &agent).with_config(config);

    let result = processor
        .run(&Command::parse_lines("Input name EnterText ${who}"))
        .await;

    assert_eq!(result.status, Status::Error);
    assert_eq!(
        result.message,
        "command 'Input name EnterText ${who}' references undefined variable 'who'"
    );
    assert!(agent.sent().is_empty());
}

#[tokio::test]
async fn unresolved_references_are_sent_literally_by_default() {
    let agent = MockAgent::new();
    let processor = script_processor(MemoryStore::new(), &agent);
    processor
        .run(&Command::parse_lines("Input name EnterText ${who}"))
        .await;
    assert_eq!(agent.sent_lines(), vec!["Input name EnterText ${who}"]);
}

// ---------------------------------------------------------------------------
// Built-ins and listeners
// ---------------------------------------------------------------------------

#[tokio::test]
async fn suite_commands_are_rejected_in_scripts() {
    let agent = MockAgent::new();
    let processor = script_processor(MemoryStore::new(), &agent);
    let result = processor.run(&Command::parse_lines("Test login.mt Run")).await;
    assert_eq!(
        result.message,
        "command 'test.run' is only allowed in a suite (maybe you need to change the file extension to .mts?)"
    );
}

#[tokio::test]
async fn ignored_commands_are_recorded_but_not_sent() {
    let agent = MockAgent::new();
    let processor = script_processor(MemoryStore::new(), &agent);
    let result = processor
        .run(&Command::parse_lines("Button a Tap %ignore=true\nButton b Tap"))
        .await;
    assert_eq!(result.steps()[0].result.message, "ignored");
    assert_eq!(agent.sent_lines(), vec!["Button b Tap"]);
}

#[tokio::test]
async fn debug_print_reaches_the_listener() {
    let agent = MockAgent::new();
    let listener = RecordingListener::new();
    let processor = script_processor(MemoryStore::new(), &agent).with_listener(listener.clone());

    processor
        .run(&Command::parse_lines("Vars * Define who=world\nDebug * Print hello ${who}\nDebug * Vars"))
        .await;

    assert_eq!(listener.printed(), "hello world\nwho=world\n");
    assert_eq!(
        listener.events_like("start"),
        vec![
            "start Vars * Define who=world",
            "start Debug * Print hello world",
            "start Debug * Vars",
        ]
    );
}

#[tokio::test]
async fn globals_and_vars_verify() {
    let agent = MockAgent::new();
    let processor = script_processor(MemoryStore::new(), &agent);

    let result = processor
        .run(&Command::parse_lines(
            "Globals * Define host=\"example org\"\nVars * Verify \"example org\" host\nVars * VerifyWildcard ex* host",
        ))
        .await;

    assert_eq!(result.status, Status::Ok, "{}", result);
    assert_eq!(processor.globals().get("host").as_deref(), Some("example org"));
    assert!(agent.sent().is_empty());
}

#[tokio::test]
async fn agent_is_started_per_command_list() {
    let store = MemoryStore::new()
        .with_script("main.mt", "Script child.mt Run\nButton a Tap")
        .with_script("child.mt", "Button b Tap");
    let agent = MockAgent::new();
    let processor = script_processor(store, &agent);
    processor.run_script("main.mt").await;
    assert_eq!(agent.starts(), 2);
}
