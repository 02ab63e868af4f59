//! Session persistence for Switchboard.
//!
//! Defines the [`SessionStorage`] interface the orchestrator persists
//! transcripts through, ships an in-memory and a JSONL file backend,
//! protocol-safe transcript truncation ([`ledger`]), and per-session
//! exclusion ([`session_lock`]).

pub mod ledger;
pub mod session_lock;
pub mod store;
pub mod transcript;

pub use ledger::{delete_message, truncate_from, validate_protocol, LedgerError};
pub use session_lock::{SessionBusy, SessionLockMap, SessionPermit};
pub use store::{save_transcript, MemoryStorage, SessionStorage};
pub use transcript::JsonlStorage;
