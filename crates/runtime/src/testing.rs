//! Test doubles for driving the orchestrator without a real model.

use std::collections::VecDeque;

use parking_lot::Mutex;

use sb_domain::error::{Error, Result};
use sb_domain::turn::{ToolCallRequest, Turn};

use crate::model::{ChatModel, ModelRequest};

/// Owned copy of a request the scripted model received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub transcript: Vec<Turn>,
    pub system_lines: Vec<String>,
    pub tool_names: Vec<String>,
}

/// A [`ChatModel`] that replays queued replies in order.
///
/// When the queue runs dry it answers with the `repeat` turn if one is set,
/// otherwise with a model error.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Turn>>,
    repeat: Option<Turn>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: impl IntoIterator<Item = Turn>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Default::default()
        }
    }

    /// A model that answers every call with `turn`.
    pub fn repeating(turn: Turn) -> Self {
        Self {
            repeat: Some(turn),
            ..Default::default()
        }
    }

    pub fn push(&self, turn: Turn) {
        self.replies.lock().push_back(turn);
    }

    /// Number of `send` calls so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait::async_trait]
impl ChatModel for ScriptedModel {
    async fn send(&self, request: ModelRequest<'_>) -> Result<Turn> {
        self.requests.lock().push(RecordedRequest {
            transcript: request.transcript.to_vec(),
            system_lines: request.system_lines.to_vec(),
            tool_names: request.tools.iter().map(|t| t.name.clone()).collect(),
        });

        let next = self.replies.lock().pop_front();
        next.or_else(|| self.repeat.clone()).ok_or_else(|| Error::Model {
            model: self.model_id().to_owned(),
            message: "script exhausted".into(),
        })
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

/// Assistant turn requesting one call per `(id, function_name, raw_arguments)`.
pub fn tool_calls(calls: &[(&str, &str, &str)]) -> Turn {
    Turn::assistant_tool_calls(
        "",
        calls
            .iter()
            .map(|(id, name, args)| ToolCallRequest::new(*id, *name, *args))
            .collect(),
    )
}
