//! Middleware shipped with the crate.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::IntentError;
use crate::middleware::{Middleware, MiddlewareContext, Next};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Logging
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Logs every invocation with its outcome and duration.
///
/// Runs outermost (priority 0) so the timing covers the whole chain.
#[derive(Debug, Default)]
pub struct LoggingMiddleware;

#[async_trait::async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    fn priority(&self) -> i32 {
        0
    }

    async fn handle(
        &self,
        ctx: &mut MiddlewareContext,
        next: Next<'_>,
    ) -> Result<Value, IntentError> {
        tracing::debug!(
            session_id = %ctx.session_id,
            intent = %ctx.intent_code,
            params = ctx.parameters.len(),
            "intent call started"
        );
        let result = next.run(ctx).await;
        let elapsed_ms = ctx.elapsed_ms();
        ctx.metadata.insert("elapsed_ms".into(), Value::from(elapsed_ms));

        match &result {
            Ok(_) => tracing::info!(
                session_id = %ctx.session_id,
                intent = %ctx.intent_code,
                elapsed_ms,
                "intent call succeeded"
            ),
            Err(e) => tracing::warn!(
                session_id = %ctx.session_id,
                intent = %ctx.intent_code,
                elapsed_ms,
                error = %e,
                "intent call failed"
            ),
        }
        result
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Rate limiting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-session sliding-window limit on intent invocations.
///
/// Calls beyond `max_calls` within `window` are rejected without reaching
/// the handler.
pub struct RateLimitMiddleware {
    max_calls: usize,
    window: Duration,
    targets: Vec<String>,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimitMiddleware {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            max_calls,
            window,
            targets: Vec::new(),
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Only limit the listed intents.
    pub fn for_intents(mut self, codes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.targets = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Record a hit for `session_id` unless the window is already full.
    fn admit(&self, session_id: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock();
        // Expire old hits everywhere so idle sessions drop out of the map.
        hits.retain(|_, window| {
            while window
                .front()
                .is_some_and(|t| now.duration_since(*t) >= self.window)
            {
                window.pop_front();
            }
            !window.is_empty()
        });
        if hits.get(session_id).map_or(0, VecDeque::len) >= self.max_calls {
            return false;
        }
        hits.entry(session_id.to_owned()).or_default().push_back(now);
        true
    }

    #[cfg(test)]
    fn tracked_sessions(&self) -> usize {
        self.hits.lock().len()
    }
}

#[async_trait::async_trait]
impl Middleware for RateLimitMiddleware {
    fn name(&self) -> &str {
        "rate_limit"
    }

    fn applies_to(&self) -> &[String] {
        &self.targets
    }

    fn priority(&self) -> i32 {
        10
    }

    async fn handle(
        &self,
        ctx: &mut MiddlewareContext,
        next: Next<'_>,
    ) -> Result<Value, IntentError> {
        if !self.admit(&ctx.session_id) {
            tracing::warn!(
                session_id = %ctx.session_id,
                intent = %ctx.intent_code,
                max_calls = self.max_calls,
                "intent call rate limited"
            );
            return Err(IntentError::Rejected {
                middleware: self.name().to_owned(),
                intent: ctx.intent_code.clone(),
                reason: format!(
                    "more than {} calls within {}s",
                    self.max_calls,
                    self.window.as_secs()
                ),
            });
        }
        next.run(ctx).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Closure middleware
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Middleware backed by a closure returning a boxed future.
///
/// ```ignore
/// FnMiddleware::new("tag", |ctx, next| Box::pin(async move {
///     ctx.metadata.insert("tagged".into(), true.into());
///     next.run(ctx).await
/// }));
/// ```
pub struct FnMiddleware<F> {
    name: String,
    priority: i32,
    targets: Vec<String>,
    f: F,
}

impl<F> FnMiddleware<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self
    where
        F: for<'a> Fn(
                &'a mut MiddlewareContext,
                Next<'a>,
            ) -> BoxFuture<'a, Result<Value, IntentError>>
            + Send
            + Sync,
    {
        Self {
            name: name.into(),
            priority: 100,
            targets: Vec::new(),
            f,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn for_intents(mut self, codes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.targets = codes.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait::async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut MiddlewareContext, Next<'a>) -> BoxFuture<'a, Result<Value, IntentError>>
        + Send
        + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn applies_to(&self) -> &[String] {
        &self.targets
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn handle(
        &self,
        ctx: &mut MiddlewareContext,
        next: Next<'_>,
    ) -> Result<Value, IntentError> {
        (self.f)(ctx, next).await
    }
}
