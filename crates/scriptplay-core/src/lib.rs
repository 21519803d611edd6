//! # scriptplay-core
//!
//! Command execution engine for component-action UI test scripts.
//!
//! Scripts are lists of `Component monkeyId Action args... %modifier=value`
//! lines. The engine interprets them against an automation agent embedded in
//! the application under test: it manages nested scopes and variable
//! substitution, runs data-driven and suite-level iterations, applies the
//! per-command abort policy and returns the whole run as a tree of steps.
//!
//! ## Modules
//!
//! - [`command`] - Parsed commands, tokenizing and substitution
//! - [`scope`] - Execution frames and their variables
//! - [`globals`] - Run-wide global variables and name validation
//! - [`result`] - Playback results and the step trace
//! - [`classify`] - Command classification for dispatch
//! - [`script`] - Script processor
//! - [`suite`] - Suite processor (tests, setup, teardown, nested suites)
//! - [`flatten`] - Test counting for suite progress
//! - [`abort`] - Abort policy and cross-thread abort requests
//! - [`commands`] - Built-in `Vars`, `Globals`, `Debug`, `System` and `VerifyImage` commands
//! - [`runner`] - Top-level entry point selecting script or suite playback
//! - [`agent`], [`store`], [`listener`] - Interfaces to the agent, script storage and observers
//! - [`config`] - Playback configuration
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use scriptplay_core::agent::{CommandSender, Response};
//! use scriptplay_core::command::Command;
//! use scriptplay_core::runner::Runner;
//! use scriptplay_core::store::MemoryStore;
//!
//! struct Agent;
//!
//! #[async_trait]
//! impl CommandSender for Agent {
//!     async fn send(&self, command: &Command) -> Response {
//!         Response::ok(format!("{} done", command.action))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new().with_script("login.mt", "Button ok Tap");
//!     let runner = Runner::new(Arc::new(store), Arc::new(Agent));
//!     let result = runner.run("login.mt", &[]).await.expect("valid run");
//!     assert!(result.is_ok());
//! }
//! ```

pub mod abort;
pub mod agent;
pub mod classify;
pub mod command;
pub mod commands;
pub mod config;
pub mod error;
pub mod flatten;
pub mod globals;
pub mod listener;
pub mod result;
pub mod runner;
pub mod scope;
pub mod script;
pub mod store;
pub mod suite;
pub mod verify;
