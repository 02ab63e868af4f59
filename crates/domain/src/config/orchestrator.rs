use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator (tool loop)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum tool rounds per exchange before the loop fails.
    #[serde(default = "d_10")]
    pub max_tool_rounds: usize,
    /// Invalid tool calls (with zero successes) that trigger the fallback.
    #[serde(default = "d_2")]
    pub invalid_call_threshold: usize,
    /// Assistant reply returned when the safety fallback triggers.
    #[serde(default = "d_fallback_message")]
    pub fallback_message: String,
    /// Trained instructions prepended to every model call.
    #[serde(default)]
    pub instructions: Vec<String>,
    /// Expected shape of the final answer. `text` disables the check.
    #[serde(default)]
    pub output_format: OutputFormat,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 10,
            invalid_call_threshold: 2,
            fallback_message: d_fallback_message(),
            instructions: Vec::new(),
            output_format: OutputFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Markdown,
    Html,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Html => "html",
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_10() -> usize {
    10
}
fn d_2() -> usize {
    2
}
fn d_fallback_message() -> String {
    "I'm sorry, I wasn't able to complete that request with the tools available. \
     Could you rephrase it or give me a bit more detail?"
        .into()
}
