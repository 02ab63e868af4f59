//! Turn execution: the tool-call loop.
//!
//! One call to [`Orchestrator::handle`] is one exchange: the user message
//! goes in, the model is called, requested tools run, and the model is called
//! again until it answers without tools. Nothing from the exchange is
//! persisted unless it ends in an answer (or the safety fallback); bootstrap
//! turns are the one exception and are committed as soon as they exist.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::Instrument;

use sb_domain::config::{BootstrapConfig, Config, OrchestratorConfig};
use sb_domain::error::{Error, Result};
use sb_domain::tool::ToolDefinition;
use sb_domain::trace::TraceEvent;
use sb_domain::turn::{Role, ToolCallRequest, Turn};
use sb_intents::{
    execute_call, tool_error_payload, ExecutionState, IntentCall, IntentRegistry, MiddlewareChain,
};
use sb_sessions::{save_transcript, validate_protocol, SessionLockMap, SessionStorage};

use crate::bootstrap;
use crate::cache::{ToolCacheKey, ToolResultCache};
use crate::cancel::{CancelMap, CancelToken};
use crate::format;
use crate::model::{ChatModel, ModelRequest};
use crate::prompt;
use crate::security::{AllowAll, SecurityGate};
use crate::storage::storage_from_config;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Input / output
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub session_id: String,
    pub user_id: Option<String>,
    pub message: String,
    /// Restrict the callable intents for this exchange.
    pub tool_subset: Option<Vec<String>>,
}

impl TurnInput {
    pub fn new(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_tools(mut self, codes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tool_subset = Some(codes.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// Final assistant text.
    pub reply: String,
    /// Tool rounds executed.
    pub rounds: usize,
    /// True when the safety fallback produced the reply.
    pub fallback: bool,
    /// Length of the persisted transcript.
    pub transcript_len: usize,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Orchestrator {
    model: Arc<dyn ChatModel>,
    registry: IntentRegistry,
    chain: MiddlewareChain,
    storage: Arc<dyn SessionStorage>,
    security: Arc<dyn SecurityGate>,
    config: OrchestratorConfig,
    bootstrap: Option<BootstrapConfig>,
    ttl: Option<Duration>,
    locks: SessionLockMap,
    cancels: CancelMap,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        registry: IntentRegistry,
        storage: Arc<dyn SessionStorage>,
    ) -> Self {
        Self {
            model,
            registry,
            chain: MiddlewareChain::new(),
            storage,
            security: Arc::new(AllowAll),
            config: OrchestratorConfig::default(),
            bootstrap: None,
            ttl: None,
            locks: SessionLockMap::new(),
            cancels: CancelMap::new(),
        }
    }

    /// Build from a loaded [`Config`], including its storage backend.
    pub fn from_config(
        config: &Config,
        model: Arc<dyn ChatModel>,
        registry: IntentRegistry,
    ) -> Result<Self> {
        let storage = storage_from_config(&config.sessions)?;
        Ok(Self::new(model, registry, storage).with_config(config))
    }

    /// Apply the `[orchestrator]`, `[bootstrap]` and `[sessions]` sections.
    pub fn with_config(mut self, config: &Config) -> Self {
        self.config = config.orchestrator.clone();
        self.bootstrap = config.bootstrap.clone();
        self.ttl = config.sessions.ttl();
        self
    }

    pub fn with_orchestrator_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: BootstrapConfig) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }

    pub fn with_middleware(mut self, chain: MiddlewareChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_security(mut self, security: Arc<dyn SecurityGate>) -> Self {
        self.security = security;
        self
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn storage(&self) -> &Arc<dyn SessionStorage> {
        &self.storage
    }

    /// Stored transcript of a session.
    pub async fn transcript(&self, session_id: &str) -> Result<Vec<Turn>> {
        self.storage.get_messages(session_id).await
    }

    /// Replace the session-scoped system prompts.
    pub async fn set_system_messages(&self, session_id: &str, messages: Vec<String>) -> Result<()> {
        self.storage
            .save_system_messages(session_id, messages, self.ttl)
            .await
    }

    /// Trip the cancel token of the session's running exchange.
    /// Returns false when nothing is running.
    pub fn cancel(&self, session_id: &str) -> bool {
        let found = self.cancels.cancel(session_id);
        if found {
            tracing::info!(session_id, "exchange cancellation requested");
        }
        found
    }

    /// Sessions with an exchange running or queued.
    pub fn active_sessions(&self) -> usize {
        self.locks.session_count()
    }

    /// Truncate a session at 1-based `position`, trimming any tool round
    /// left dangling, and persist the result.
    pub async fn delete_message(&self, session_id: &str, position: usize) -> Result<Vec<Turn>> {
        let _permit = self
            .locks
            .acquire(session_id)
            .await
            .map_err(|e| Error::Other(e.to_string()))?;
        sb_sessions::delete_message(self.storage.as_ref(), session_id, position, self.ttl).await
    }

    /// Run one exchange for `input`.
    pub async fn handle(&self, input: TurnInput) -> Result<TurnOutcome> {
        let span = tracing::info_span!(
            "exchange",
            session_id = %input.session_id,
            outcome = tracing::field::Empty,
        );
        let result = self.run_exchange(&input).instrument(span.clone()).await;
        span.record(
            "outcome",
            match &result {
                Ok(o) if o.fallback => "fallback",
                Ok(_) => "answer",
                Err(_) => "error",
            },
        );
        result
    }

    async fn run_exchange(&self, input: &TurnInput) -> Result<TurnOutcome> {
        let sid = input.session_id.as_str();
        let _permit = self
            .locks
            .acquire(sid)
            .await
            .map_err(|e| Error::Other(e.to_string()))?;
        let cancel = self.cancels.register(sid);
        let _running = RunningGuard {
            cancels: &self.cancels,
            session_id: sid,
        };

        self.security
            .check(input.user_id.as_deref(), sid, &input.message)
            .await?;

        let mut turns = self.storage.get_messages(sid).await?;
        let state = self.registry.execution_state(input.tool_subset.as_deref());

        // ── First-turn bootstrap ─────────────────────────────────────
        if let Some(cfg) = &self.bootstrap {
            if bootstrap::should_run(cfg, &turns, sid) {
                let seeded =
                    bootstrap::run_bootstrap(cfg, &state, &self.chain, sid, &cancel).await?;
                if !seeded.is_empty() {
                    turns.extend(seeded);
                    save_transcript(self.storage.as_ref(), sid, turns.clone(), self.ttl).await?;
                }
            }
        }

        let session_messages = self.storage.get_system_messages(sid).await?;
        let system_lines = prompt::system_lines(
            &self.config.instructions,
            &session_messages,
            state.available_names(),
            Utc::now(),
        );
        let tools = state.tool_definitions();

        turns.push(Turn::user(input.message.clone()));
        let mut ex = Exchange {
            session_id: sid,
            user_message: &input.message,
            state,
            cache: ToolResultCache::new(),
            previous_results: Vec::new(),
            invalid: 0,
            succeeded: 0,
        };
        let mut rounds = 0;

        loop {
            tracing::debug!(round = rounds, "tool loop iteration");
            // ── Check cancellation before each model call ──────────
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let mut reply = self.call_model(&turns, &system_lines, &tools).await?;

            if !reply.has_tool_calls() {
                let reply = self
                    .enforce_format(reply, &turns, &system_lines, &tools, sid, &cancel)
                    .await?;
                let text = reply.content.clone();
                turns.push(reply);
                return self.finish(sid, turns, text, rounds, false).await;
            }

            if rounds >= self.config.max_tool_rounds {
                TraceEvent::LoopExhausted {
                    session_id: sid.to_owned(),
                    rounds,
                }
                .emit();
                return Err(Error::LoopExhausted { rounds });
            }
            rounds += 1;

            normalize_call_ids(&mut reply.tool_calls, rounds);
            let responses = self.resolve_round(&mut ex, &reply.tool_calls, &cancel).await?;
            let responses =
                ensure_responses(&reply.tool_calls, responses, ex.state.available_names());

            TraceEvent::ToolRoundCompleted {
                session_id: sid.to_owned(),
                round: rounds,
                requests: reply.tool_calls.len(),
                invalid: ex.invalid,
                succeeded: ex.succeeded,
            }
            .emit();

            turns.push(reply);
            turns.extend(responses);

            if ex.invalid >= self.config.invalid_call_threshold && ex.succeeded == 0 {
                TraceEvent::SafetyFallback {
                    session_id: sid.to_owned(),
                    invalid: ex.invalid,
                }
                .emit();
                let text = self.config.fallback_message.clone();
                turns.push(Turn::assistant(text.clone()));
                return self.finish(sid, turns, text, rounds, true).await;
            }
        }
    }

    async fn call_model(
        &self,
        transcript: &[Turn],
        system_lines: &[String],
        tools: &[ToolDefinition],
    ) -> Result<Turn> {
        let span = tracing::info_span!(
            "model.call",
            model = self.model.model_id(),
            turns = transcript.len(),
        );
        let mut reply = self
            .model
            .send(ModelRequest {
                transcript,
                system_lines,
                tools,
            })
            .instrument(span)
            .await?;
        reply.role = Role::Assistant;
        reply.id = 0;
        Ok(reply)
    }

    /// Execute every request of one assistant turn, in order.
    async fn resolve_round(
        &self,
        ex: &mut Exchange<'_>,
        calls: &[ToolCallRequest],
        cancel: &CancelToken,
    ) -> Result<Vec<Turn>> {
        let mut responses = Vec::with_capacity(calls.len());

        for call in calls {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let hash = ex
                .state
                .schema_hash(&call.function_name)
                .unwrap_or_default()
                .to_owned();
            let key = ToolCacheKey::new(call, hash);

            if let Some(content) = ex.cache.get(&key) {
                TraceEvent::ToolCacheHit {
                    session_id: ex.session_id.to_owned(),
                    function_name: call.function_name.clone(),
                    call_id: call.id.clone(),
                }
                .emit();
                ex.succeeded += 1;
                responses.push(Turn::tool(&call.id, &call.function_name, content));
                continue;
            }

            let outcome = execute_call(
                &ex.state,
                &self.chain,
                IntentCall {
                    session_id: ex.session_id,
                    user_message: ex.user_message,
                    function_name: &call.function_name,
                    raw_arguments: &call.raw_arguments,
                    previous_results: &ex.previous_results,
                },
            )
            .await;

            match outcome {
                Ok(value) => {
                    let content = value.to_string();
                    ex.cache.insert(key, content.clone());
                    ex.previous_results.push(value);
                    ex.succeeded += 1;
                    responses.push(Turn::tool(&call.id, &call.function_name, content));
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(
                        intent = %call.function_name,
                        call_id = %call.id,
                        code = e.code(),
                        error = %e,
                        "tool call rejected"
                    );
                    ex.invalid += 1;
                    let payload = e.to_payload(&call.function_name, ex.state.available_names());
                    responses.push(Turn::tool(
                        &call.id,
                        &call.function_name,
                        payload.to_string(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(responses)
    }

    /// Re-prompt once when the answer does not match the configured format.
    async fn enforce_format(
        &self,
        reply: Turn,
        turns: &[Turn],
        system_lines: &[String],
        tools: &[ToolDefinition],
        session_id: &str,
        cancel: &CancelToken,
    ) -> Result<Turn> {
        let wanted = self.config.output_format;
        if format::satisfies(wanted, &reply.content) {
            return Ok(reply);
        }

        TraceEvent::OutputReprompted {
            session_id: session_id.to_owned(),
            format: wanted.as_str().to_owned(),
        }
        .emit();
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut lines = system_lines.to_vec();
        lines.push(format::reprompt_line(wanted));
        let mut transcript = turns.to_vec();
        transcript.push(reply.clone());

        let retry = self.call_model(&transcript, &lines, tools).await?;
        if retry.has_tool_calls() {
            tracing::warn!(
                session_id,
                format = wanted.as_str(),
                "format retry asked for tools, keeping the original answer"
            );
            return Ok(reply);
        }
        Ok(retry)
    }

    async fn finish(
        &self,
        session_id: &str,
        turns: Vec<Turn>,
        reply: String,
        rounds: usize,
        fallback: bool,
    ) -> Result<TurnOutcome> {
        if cfg!(debug_assertions) {
            if let Err(e) = validate_protocol(&turns) {
                tracing::warn!(session_id, error = %e, "saving a transcript that breaks the tool protocol");
            }
        }
        let transcript_len = turns.len();
        save_transcript(self.storage.as_ref(), session_id, turns, self.ttl).await?;
        tracing::info!(session_id, rounds, fallback, transcript_len, "exchange complete");
        Ok(TurnOutcome {
            reply,
            rounds,
            fallback,
            transcript_len,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Exchange state & helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Mutable state scoped to one exchange. Dropped when the exchange ends.
struct Exchange<'a> {
    session_id: &'a str,
    user_message: &'a str,
    state: ExecutionState,
    cache: ToolResultCache,
    previous_results: Vec<Value>,
    /// Recoverable-error responses so far.
    invalid: usize,
    /// Successful executions and cache hits so far.
    succeeded: usize,
}

/// Unregisters the session's cancel token when the exchange ends.
struct RunningGuard<'a> {
    cancels: &'a CancelMap,
    session_id: &'a str,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.cancels.remove(self.session_id);
    }
}

/// Give every request in one assistant turn a unique, non-empty id.
pub fn normalize_call_ids(calls: &mut [ToolCallRequest], round: usize) {
    // Ids the model supplied, so a generated id never shadows a later one.
    let supplied: HashSet<String> = calls.iter().map(|c| c.id.clone()).collect();
    let mut seen = HashSet::new();
    for (idx, call) in calls.iter_mut().enumerate() {
        if call.id.trim().is_empty() || seen.contains(&call.id) {
            let base = format!("call_{round}_{idx}");
            let mut fresh = base.clone();
            let mut n = 1;
            while seen.contains(&fresh) || supplied.contains(&fresh) {
                fresh = format!("{base}_{n}");
                n += 1;
            }
            tracing::debug!(old = %call.id, new = %fresh, "renaming tool call id");
            call.id = fresh;
        }
        seen.insert(call.id.clone());
    }
}

/// Return exactly one response per request, in request order, synthesizing
/// an `UNHANDLED_TOOL_CALL` error for any request left unanswered.
pub fn ensure_responses(
    calls: &[ToolCallRequest],
    mut responses: Vec<Turn>,
    available: &[String],
) -> Vec<Turn> {
    calls
        .iter()
        .map(|call| {
            let found = responses
                .iter()
                .position(|t| t.tool_call_id.as_deref() == Some(call.id.as_str()));
            match found {
                Some(pos) => responses.remove(pos),
                None => {
                    tracing::warn!(call_id = %call.id, intent = %call.function_name, "tool call left unanswered");
                    let payload = tool_error_payload(
                        "UNHANDLED_TOOL_CALL",
                        "no response was produced for this tool call",
                        &call.function_name,
                        available,
                    );
                    Turn::tool(&call.id, &call.function_name, payload.to_string())
                }
            }
        })
        .collect()
}
