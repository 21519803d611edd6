//! Agent interface.
//!
//! The agent lives inside the application under test and performs the actual
//! UI automation. The engine only sees it through [`CommandSender`]: send a
//! command, receive a [`Response`]. Retrying verify-style actions until
//! their `%timeout` elapses is the agent's job, not the engine's.
//!
//! # Example
//!
//! ```
//! use async_trait::async_trait;
//! use scriptplay_core::agent::{CommandSender, Response};
//! use scriptplay_core::command::Command;
//!
//! struct AlwaysOk;
//!
//! #[async_trait]
//! impl CommandSender for AlwaysOk {
//!     async fn send(&self, command: &Command) -> Response {
//!         Response::ok(format!("did {}", command.action))
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::Command;
use crate::result::Status;

/// The agent's answer to one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Base64 screenshot, when the agent captured one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Response {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            warning: None,
            image: None,
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(Status::Ok, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Status::Error, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(Status::Failure, message)
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Decodes an agent response body.
    ///
    /// Accepts `{"result": "OK", "message": "..."}` where `message` may also
    /// be an object carrying `message`, `warning` and `screenshot` (or
    /// `image`). Unparsable bodies become ERROR responses holding the body.
    pub fn from_json(body: &str) -> Self {
        let json: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => return Self::error(format!("bad agent response '{}': {}", body, e)),
        };
        let status = match json.get("result").and_then(Value::as_str) {
            Some(r) if r.eq_ignore_ascii_case("ok") => Status::Ok,
            Some(r) if r.eq_ignore_ascii_case("failure") => Status::Failure,
            _ => Status::Error,
        };

        let details = match json.get("message") {
            Some(obj @ Value::Object(_)) => obj,
            _ => &json,
        };
        let text = |key: &str| details.get(key).and_then(Value::as_str).map(str::to_string);

        Self {
            status,
            message: text("message").unwrap_or_default(),
            warning: text("warning"),
            image: text("screenshot").or_else(|| text("image")),
        }
    }
}

/// Sends commands to the agent.
///
/// Implementations report transport faults as ERROR responses.
#[async_trait]
pub trait CommandSender: Send + Sync {
    /// Establishes the connection. Called before every command list; must be
    /// idempotent.
    async fn start(&self) {}

    /// Sends one command and waits for the agent's response.
    async fn send(&self, command: &Command) -> Response;
}
