//! Shared types for Switchboard: conversation turns, configuration, the
//! cross-crate error type, and structured trace events.

pub mod config;
pub mod error;
pub mod tool;
pub mod trace;
pub mod turn;

pub use error::{Error, Result};
pub use tool::ToolDefinition;
pub use turn::{Role, ToolCallRequest, Turn};
