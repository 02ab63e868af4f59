//! Callable intents for Switchboard.
//!
//! An [`Intent`] is a named, schema-typed function the model may invoke.
//! Intents live in an [`IntentRegistry`]; each exchange works against an
//! immutable [`ExecutionState`] snapshot carrying per-intent schema hashes.
//! Calls pass through argument coercion, a [`MiddlewareChain`], the handler,
//! and a response consistency check ([`execute_call`]).

pub mod builtin;
pub mod coerce;
pub mod error;
pub mod execute;
pub mod intent;
pub mod middleware;
pub mod registry;
pub mod shape;
pub mod state;
pub mod validate;

pub use builtin::{FnMiddleware, LoggingMiddleware, RateLimitMiddleware};
pub use coerce::coerce_arguments;
pub use error::{tool_error_payload, IntentError};
pub use execute::{execute_call, IntentCall};
pub use intent::{FnHandler, HandlerError, Intent, IntentHandler};
pub use middleware::{Middleware, MiddlewareChain, MiddlewareContext, Next, Terminal};
pub use registry::IntentRegistry;
pub use shape::{ParamField, ParamShape, ParamType};
pub use state::{schema_hash, ExecutionState};
pub use validate::check_response_consistency;
