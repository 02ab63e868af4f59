use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// First-turn bootstrap
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Intents executed server-side before the first user turn of a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub intent_calls: Vec<BootstrapCall>,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    /// Skip the bootstrap when the session id is empty.
    #[serde(default)]
    pub require_session_id: bool,
    #[serde(default)]
    pub limits: CompactionLimits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapCall {
    pub intent_code: String,
    #[serde(default = "d_empty_object")]
    pub params: serde_json::Value,
}

impl BootstrapCall {
    pub fn new(intent_code: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            intent_code: intent_code.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Embed the error in that intent's tool turn and keep going.
    #[default]
    BestEffort,
    /// Abort the bootstrap (and the exchange) on the first error.
    Strict,
}

/// Bounds applied to bootstrap payloads before they enter the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionLimits {
    #[serde(default = "d_4")]
    pub max_depth: usize,
    #[serde(default = "d_20")]
    pub max_array_items: usize,
    #[serde(default = "d_30")]
    pub max_object_keys: usize,
    #[serde(default = "d_280")]
    pub max_string_chars: usize,
    #[serde(default = "d_12000")]
    pub max_payload_bytes: usize,
    /// Characters of raw JSON kept when a payload blows the byte budget.
    #[serde(default = "d_2000")]
    pub preview_chars: usize,
}

impl Default for CompactionLimits {
    fn default() -> Self {
        Self {
            max_depth: 4,
            max_array_items: 20,
            max_object_keys: 30,
            max_string_chars: 280,
            max_payload_bytes: 12_000,
            preview_chars: 2_000,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}
fn d_4() -> usize {
    4
}
fn d_20() -> usize {
    20
}
fn d_30() -> usize {
    30
}
fn d_280() -> usize {
    280
}
fn d_12000() -> usize {
    12_000
}
fn d_2000() -> usize {
    2_000
}
