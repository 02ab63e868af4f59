/// Shared error type used across all Switchboard crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("model {model}: {message}")]
    Model { model: String, message: String },

    #[error("security check rejected the message: {0}")]
    Security(String),

    #[error("exchange cancelled")]
    Cancelled,

    #[error("intent {intent} returned an inconsistent response: {message}")]
    InvalidResponse { intent: String, message: String },

    #[error("intent {intent} failed: {message}")]
    IntentFailed { intent: String, message: String },

    #[error("middleware {middleware} rejected intent {intent}: {reason}")]
    Rejected {
        middleware: String,
        intent: String,
        reason: String,
    },

    #[error("first-turn bootstrap failed on {intent}: {message}")]
    BootstrapFailed { intent: String, message: String },

    #[error("tool loop limit reached ({rounds} rounds) without a final answer")]
    LoopExhausted { rounds: usize },

    #[error("ledger: {0}")]
    Ledger(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
