//! Conversation turns and tool-call requests.
//!
//! A transcript is a `Vec<Turn>`. Assistant turns may carry tool-call
//! requests; each request must be answered by exactly one tool turn whose
//! `tool_call_id` matches, before anything else is appended.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A model-issued request to invoke a named intent.
///
/// `raw_arguments` is kept as the literal text the model produced; it is
/// part of the result-cache key, so it must not be re-serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub function_name: String,
    pub raw_arguments: String,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        function_name: impl Into<String>,
        raw_arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            function_name: function_name.into(),
            raw_arguments: raw_arguments.into(),
        }
    }
}

/// One entry in a conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Sequential 1-based position, assigned when the transcript is saved.
    /// Zero means "not yet persisted".
    #[serde(default)]
    pub id: u64,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

// ── Convenience constructors ───────────────────────────────────────

impl Turn {
    fn bare(role: Role, content: String) -> Self {
        Self {
            id: 0,
            role,
            content,
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::bare(Role::System, text.into())
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::bare(Role::User, text.into())
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::bare(Role::Assistant, text.into())
    }

    /// An assistant turn requesting one or more tool calls.
    pub fn assistant_tool_calls(text: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        let mut turn = Self::bare(Role::Assistant, text.into());
        turn.tool_calls = calls;
        turn
    }

    /// A tool response answering the request with id `call_id`.
    pub fn tool(
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut turn = Self::bare(Role::Tool, content.into());
        turn.tool_call_id = Some(call_id.into());
        turn.name = Some(name.into());
        turn
    }

    /// True for an assistant turn that still expects tool responses.
    pub fn has_tool_calls(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }
}

/// Assign sequential 1-based ids, overwriting anything already present.
pub fn assign_ids(turns: &mut [Turn]) {
    for (idx, turn) in turns.iter_mut().enumerate() {
        turn.id = idx as u64 + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_turn_carries_call_id() {
        let turn = Turn::tool("call_1", "lookup", "{}");
        assert_eq!(turn.role, Role::Tool);
        assert_eq!(turn.tool_call_id.as_deref(), Some("call_1"));
        assert!(!turn.has_tool_calls());
    }

    #[test]
    fn assign_ids_overwrites_caller_ids() {
        let mut turns = vec![Turn::user("a"), Turn::assistant("b")];
        turns[0].id = 42;
        assign_ids(&mut turns);
        assert_eq!(turns[0].id, 1);
        assert_eq!(turns[1].id, 2);
    }

    #[test]
    fn serde_omits_empty_tool_fields() {
        let json = serde_json::to_value(Turn::user("hi")).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("tool_calls").is_none());
        assert!(json.get("tool_call_id").is_none());

        let back: Turn = serde_json::from_value(json).unwrap();
        assert_eq!(back.content, "hi");
    }
}
