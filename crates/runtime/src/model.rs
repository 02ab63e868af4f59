use sb_domain::error::Result;
use sb_domain::tool::ToolDefinition;
use sb_domain::turn::Turn;

/// Everything the model sees for one completion.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub transcript: &'a [Turn],
    /// Prepended as system messages, in order.
    pub system_lines: &'a [String],
    pub tools: &'a [ToolDefinition],
}

/// A chat-completion backend.
///
/// Returns a single assistant turn; a turn with `tool_calls` asks the
/// orchestrator to run tools and call again.
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    async fn send(&self, request: ModelRequest<'_>) -> Result<Turn>;

    /// Identifier used in logs.
    fn model_id(&self) -> &str {
        "default"
    }
}
