use serde::Serialize;

/// Structured trace events emitted across all Switchboard crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    TranscriptSaved {
        session_id: String,
        turns: usize,
    },
    TranscriptTruncated {
        session_id: String,
        position: usize,
        removed: usize,
    },
    ToolCacheHit {
        session_id: String,
        function_name: String,
        call_id: String,
    },
    ToolRoundCompleted {
        session_id: String,
        round: usize,
        requests: usize,
        invalid: usize,
        succeeded: usize,
    },
    SafetyFallback {
        session_id: String,
        invalid: usize,
    },
    LoopExhausted {
        session_id: String,
        rounds: usize,
    },
    BootstrapCompleted {
        session_id: String,
        intents: usize,
        errors: usize,
    },
    OutputReprompted {
        session_id: String,
        format: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "sb_event");
    }
}
