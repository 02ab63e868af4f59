//! First-turn bootstrap.
//!
//! Before the first user message of a session, configured intents run
//! server-side and their results are written into the transcript as if the
//! model had requested them: one assistant turn carrying the requests, then
//! one tool turn per request. The model then starts the conversation with
//! that context already in place.

use serde_json::{json, Value};

use sb_domain::config::{BootstrapConfig, FailurePolicy};
use sb_domain::error::{Error, Result};
use sb_domain::trace::TraceEvent;
use sb_domain::turn::{Role, ToolCallRequest, Turn};
use sb_intents::{execute_call, ExecutionState, IntentCall, MiddlewareChain};

use crate::cancel::CancelToken;
use crate::compact::fit_envelope;

const SOURCE: &str = "first_turn_bootstrap";

/// Whether the bootstrap should run for this transcript.
pub fn should_run(cfg: &BootstrapConfig, turns: &[Turn], session_id: &str) -> bool {
    if cfg.intent_calls.is_empty() {
        return false;
    }
    if cfg.require_session_id && session_id.trim().is_empty() {
        return false;
    }
    !turns
        .iter()
        .any(|t| matches!(t.role, Role::User | Role::Assistant))
}

/// Lowercase, with everything outside `[a-z0-9]` replaced by `_`.
pub fn sanitize_code(code: &str) -> String {
    code.chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Run the configured intents and return the turns to append: one
/// assistant turn followed by one tool turn per executed call. Returns an
/// empty list when none of the configured intents is callable.
pub async fn run_bootstrap(
    cfg: &BootstrapConfig,
    state: &ExecutionState,
    chain: &MiddlewareChain,
    session_id: &str,
    cancel: &CancelToken,
) -> Result<Vec<Turn>> {
    let calls: Vec<_> = cfg
        .intent_calls
        .iter()
        .filter(|call| {
            let known = state.contains(&call.intent_code);
            if !known {
                tracing::debug!(
                    session_id,
                    intent = %call.intent_code,
                    "bootstrap intent not callable, skipping"
                );
            }
            known
        })
        .collect();
    if calls.is_empty() {
        return Ok(Vec::new());
    }

    let requests: Vec<ToolCallRequest> = calls
        .iter()
        .enumerate()
        .map(|(idx, call)| {
            ToolCallRequest::new(
                format!("bootstrap_{idx}_{}", sanitize_code(&call.intent_code)),
                call.intent_code.clone(),
                call.params.to_string(),
            )
        })
        .collect();

    let mut tool_turns = Vec::with_capacity(requests.len());
    let mut previous_results = Vec::new();
    let mut errors = 0;

    for request in &requests {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let outcome = execute_call(
            state,
            chain,
            IntentCall {
                session_id,
                user_message: "",
                function_name: &request.function_name,
                raw_arguments: &request.raw_arguments,
                previous_results: &previous_results,
            },
        )
        .await;

        let envelope = match outcome {
            Ok(data) => {
                let env = json!({
                    "source": SOURCE,
                    "intentCode": request.function_name,
                    "status": "SUCCESS",
                    "summary": summarize(&data),
                    "data": data,
                });
                previous_results.push(data);
                env
            }
            Err(e) => {
                if cfg.failure_policy == FailurePolicy::Strict {
                    return Err(Error::BootstrapFailed {
                        intent: request.function_name.clone(),
                        message: e.to_string(),
                    });
                }
                tracing::warn!(
                    session_id,
                    intent = %request.function_name,
                    error = %e,
                    "bootstrap intent failed, continuing"
                );
                errors += 1;
                json!({
                    "source": SOURCE,
                    "intentCode": request.function_name,
                    "status": "ERROR",
                    "summary": format!("{} failed ({})", request.function_name, e.code()),
                    "error": { "code": e.code(), "message": e.to_string() },
                })
            }
        };

        tool_turns.push(Turn::tool(
            &request.id,
            &request.function_name,
            fit_envelope(&envelope, &cfg.limits),
        ));
    }

    TraceEvent::BootstrapCompleted {
        session_id: session_id.to_owned(),
        intents: requests.len(),
        errors,
    }
    .emit();

    let mut turns = Vec::with_capacity(requests.len() + 1);
    turns.push(Turn::assistant_tool_calls("", requests));
    turns.extend(tool_turns);
    Ok(turns)
}

/// One-line description of a result for the envelope.
fn summarize(data: &Value) -> String {
    match data {
        Value::Null => "no data".into(),
        Value::Array(items) => format!("{} item(s)", items.len()),
        Value::Object(map) => format!("record with {} field(s)", map.len()),
        Value::String(s) => format!("text ({} chars)", s.chars().count()),
        other => other.to_string(),
    }
}
