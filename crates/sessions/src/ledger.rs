//! Protocol-safe transcript truncation.
//!
//! The chat protocol requires every assistant turn that requests tools to be
//! followed by one tool turn per request, in request order. Cutting a
//! transcript at an arbitrary position can leave half a tool round at the
//! tail; the functions here cut and then trim until the tail is clean.

use std::time::Duration;

use sb_domain::error::Error;
use sb_domain::trace::TraceEvent;
use sb_domain::turn::{Role, Turn};

use crate::store::{save_transcript, SessionStorage};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("position {position} is outside the transcript (1..={len})")]
    InvalidPosition { position: usize, len: usize },

    #[error("tool turn at index {index} does not answer a pending request")]
    OrphanToolTurn { index: usize },

    #[error("request {call_id} from the assistant turn at index {index} has no response")]
    MissingResponse { index: usize, call_id: String },

    #[error("tool turn at index {index} answers {found:?}, expected {expected}")]
    MismatchedResponse {
        index: usize,
        expected: String,
        found: Option<String>,
    },
}

impl From<LedgerError> for Error {
    fn from(e: LedgerError) -> Self {
        Error::Ledger(e.to_string())
    }
}

/// Remove the turn at 1-based `position` and everything after it, then trim
/// any dangling tool round from the new tail.
///
/// Returns the number of turns removed.
pub fn truncate_from(turns: &mut Vec<Turn>, position: usize) -> Result<usize, LedgerError> {
    let len = turns.len();
    if position == 0 || position > len {
        return Err(LedgerError::InvalidPosition { position, len });
    }

    turns.truncate(position - 1);
    trim_dangling_tail(turns);
    Ok(len - turns.len())
}

/// Pop trailing tool turns and tool-requesting assistant turns.
pub fn trim_dangling_tail(turns: &mut Vec<Turn>) {
    while let Some(last) = turns.last() {
        if last.role == Role::Tool || last.has_tool_calls() {
            turns.pop();
        } else {
            break;
        }
    }
}

/// Report the first protocol violation in `turns`, if any.
pub fn validate_protocol(turns: &[Turn]) -> Result<(), LedgerError> {
    let mut idx = 0;
    while idx < turns.len() {
        let turn = &turns[idx];
        if turn.role == Role::Tool {
            return Err(LedgerError::OrphanToolTurn { index: idx });
        }
        if !turn.has_tool_calls() {
            idx += 1;
            continue;
        }

        for (offset, call) in turn.tool_calls.iter().enumerate() {
            let pos = idx + 1 + offset;
            match turns.get(pos) {
                Some(resp) if resp.role == Role::Tool => {
                    if resp.tool_call_id.as_deref() != Some(call.id.as_str()) {
                        return Err(LedgerError::MismatchedResponse {
                            index: pos,
                            expected: call.id.clone(),
                            found: resp.tool_call_id.clone(),
                        });
                    }
                }
                _ => {
                    return Err(LedgerError::MissingResponse {
                        index: idx,
                        call_id: call.id.clone(),
                    })
                }
            }
        }
        idx += 1 + turn.tool_calls.len();
    }
    Ok(())
}

/// Load a session, truncate it at `position`, renumber and save it back.
///
/// Returns the transcript as persisted.
pub async fn delete_message(
    storage: &dyn SessionStorage,
    session_id: &str,
    position: usize,
    ttl: Option<Duration>,
) -> sb_domain::Result<Vec<Turn>> {
    let mut turns = storage.get_messages(session_id).await?;
    let removed = truncate_from(&mut turns, position)?;

    save_transcript(storage, session_id, turns, ttl).await?;

    TraceEvent::TranscriptTruncated {
        session_id: session_id.to_owned(),
        position,
        removed,
    }
    .emit();

    storage.get_messages(session_id).await
}
