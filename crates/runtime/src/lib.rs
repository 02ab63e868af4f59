//! The Switchboard tool-call orchestrator.
//!
//! [`Orchestrator::handle`] drives one exchange: security check, optional
//! first-turn bootstrap, then alternating model calls and tool rounds until
//! the model answers, the safety fallback triggers, or the round bound is
//! spent. Transcripts persist through [`sb_sessions::SessionStorage`].

pub mod bootstrap;
pub mod cache;
pub mod cancel;
pub mod compact;
pub mod format;
pub mod model;
pub mod prompt;
pub mod security;
pub mod storage;
pub mod telemetry;
pub mod turn;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use cache::{ToolCacheKey, ToolResultCache};
pub use cancel::{CancelMap, CancelToken};
pub use model::{ChatModel, ModelRequest};
pub use security::{AllowAll, SecurityGate};
pub use turn::{Orchestrator, TurnInput, TurnOutcome};
