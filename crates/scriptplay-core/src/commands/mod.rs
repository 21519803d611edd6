//! Handlers for the engine's built-in commands.
//!
//! Each handler validates its arguments before doing anything else and
//! reports every problem as an ERROR [`PlaybackResult`](crate::result::PlaybackResult);
//! none of them contacts the agent except [`verify_image`].

pub mod debug;
pub mod globals;
pub mod system;
pub mod vars;
pub mod verify_image;
