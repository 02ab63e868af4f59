//! Middleware chain around intent execution.
//!
//! Middleware wrap every intent invocation as nested continuations: each
//! layer receives the mutable [`MiddlewareContext`] and a [`Next`] handle,
//! and decides whether (and when) to call the rest of the chain. A layer
//! that returns without calling `next` short-circuits the invocation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::IntentError;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-invocation state shared by every middleware and the handler.
#[derive(Debug, Clone)]
pub struct MiddlewareContext {
    pub session_id: String,
    pub intent_code: String,
    /// The user message that started the exchange.
    pub user_message: String,
    /// Coerced arguments; middleware may rewrite them before the handler runs.
    pub parameters: Map<String, Value>,
    pub start_time: DateTime<Utc>,
    /// Free-form scratch space for middleware.
    pub metadata: HashMap<String, Value>,
    /// Results of the intent calls already executed in this exchange.
    pub previous_results: Vec<Value>,
}

impl MiddlewareContext {
    pub fn new(
        session_id: impl Into<String>,
        intent_code: impl Into<String>,
        user_message: impl Into<String>,
        parameters: Map<String, Value>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            intent_code: intent_code.into(),
            user_message: user_message.into(),
            parameters,
            start_time: Utc::now(),
            metadata: HashMap::new(),
            previous_results: Vec::new(),
        }
    }

    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.start_time).num_milliseconds()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    /// Intent codes this middleware wraps. Empty means every intent.
    fn applies_to(&self) -> &[String] {
        &[]
    }

    /// Lower values run earlier (further out).
    fn priority(&self) -> i32 {
        100
    }

    async fn handle(
        &self,
        ctx: &mut MiddlewareContext,
        next: Next<'_>,
    ) -> Result<Value, IntentError>;
}

/// The innermost step of a chain, normally the intent handler.
#[async_trait::async_trait]
pub trait Terminal: Send + Sync {
    async fn call(&self, ctx: &mut MiddlewareContext) -> Result<Value, IntentError>;
}

/// Handle to the remainder of the chain.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    layers: &'a [Arc<dyn Middleware>],
    terminal: &'a dyn Terminal,
}

impl<'a> Next<'a> {
    pub fn new(layers: &'a [Arc<dyn Middleware>], terminal: &'a dyn Terminal) -> Self {
        Self { layers, terminal }
    }

    /// Run the next layer, or the terminal once the layers are exhausted.
    pub async fn run(self, ctx: &mut MiddlewareContext) -> Result<Value, IntentError> {
        match self.layers.split_first() {
            Some((first, rest)) => {
                let next = Next {
                    layers: rest,
                    terminal: self.terminal,
                };
                first.handle(ctx, next).await
            }
            None => self.terminal.call(ctx).await,
        }
    }
}

fn applies(mw: &dyn Middleware, intent_code: &str) -> bool {
    let targets = mw.applies_to();
    targets.is_empty() || targets.iter().any(|t| t == intent_code)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chain
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Priority-ordered list of middleware.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    layers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.add_arc(Arc::new(middleware))
    }

    /// Insert after every layer with priority `<=` the new one, so equal
    /// priorities keep registration order.
    pub fn add_arc(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        let priority = middleware.priority();
        let pos = self.layers.partition_point(|m| m.priority() <= priority);
        tracing::debug!(
            middleware = middleware.name(),
            priority,
            position = pos,
            "middleware registered"
        );
        self.layers.insert(pos, middleware);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Registered names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.layers.iter().map(|m| m.name()).collect()
    }

    /// Run the applicable layers around `terminal`.
    pub async fn execute(
        &self,
        ctx: &mut MiddlewareContext,
        terminal: &dyn Terminal,
    ) -> Result<Value, IntentError> {
        let selected: Vec<Arc<dyn Middleware>> = self
            .layers
            .iter()
            .filter(|m| applies(m.as_ref(), &ctx.intent_code))
            .cloned()
            .collect();
        Next::new(&selected, terminal).run(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Records its name on entry and exit into a shared log.
    struct Tracer {
        name: String,
        priority: i32,
        targets: Vec<String>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Tracer {
        fn new(name: &str, priority: i32, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name: name.into(),
                priority,
                targets: Vec::new(),
                log: log.clone(),
            }
        }
    }

    #[async_trait::async_trait]
    impl Middleware for Tracer {
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
            self.log.lock().push(format!("{}>", self.name));
            let out = next.run(ctx).await;
            self.log.lock().push(format!("<{}", self.name));
            out
        }
    }

    struct Echo;

    #[async_trait::async_trait]
    impl Terminal for Echo {
        async fn call(&self, ctx: &mut MiddlewareContext) -> Result<Value, IntentError> {
            Ok(Value::Object(ctx.parameters.clone()))
        }
    }

    struct Deny;

    #[async_trait::async_trait]
    impl Middleware for Deny {
        fn name(&self) -> &str {
            "deny"
        }
        async fn handle(
            &self,
            ctx: &mut MiddlewareContext,
            _next: Next<'_>,
        ) -> Result<Value, IntentError> {
            Err(IntentError::Rejected {
                middleware: "deny".into(),
                intent: ctx.intent_code.clone(),
                reason: "not today".into(),
            })
        }
    }

    fn ctx(code: &str) -> MiddlewareContext {
        let mut params = Map::new();
        params.insert("n".into(), json!(1));
        MiddlewareContext::new("s1", code, "hi", params)
    }

    #[tokio::test]
    async fn runs_in_priority_order_stable_for_ties() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        chain
            .add(Tracer::new("b", 20, &log))
            .add(Tracer::new("a", 10, &log))
            .add(Tracer::new("c", 20, &log));
        assert_eq!(chain.names(), vec!["a", "b", "c"]);

        let out = chain.execute(&mut ctx("lookup"), &Echo).await.unwrap();

        assert_eq!(out, json!({"n": 1}));
        assert_eq!(*log.lock(), vec!["a>", "b>", "c>", "<c", "<b", "<a"]);
    }

    #[tokio::test]
    async fn targeted_middleware_only_wraps_its_intents() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut targeted = Tracer::new("only-refund", 1, &log);
        targeted.targets = vec!["refund".into()];

        let mut chain = MiddlewareChain::new();
        chain.add(targeted).add(Tracer::new("global", 5, &log));

        chain.execute(&mut ctx("lookup"), &Echo).await.unwrap();
        assert_eq!(*log.lock(), vec!["global>", "<global"]);

        log.lock().clear();
        chain.execute(&mut ctx("refund"), &Echo).await.unwrap();
        assert_eq!(log.lock().first().map(String::as_str), Some("only-refund>"));
    }

    #[tokio::test]
    async fn short_circuit_skips_inner_layers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut chain = MiddlewareChain::new();
        chain.add(Deny).add(Tracer::new("inner", 200, &log));

        let err = chain.execute(&mut ctx("lookup"), &Echo).await.unwrap_err();

        assert_eq!(err.code(), "REJECTED");
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn empty_chain_calls_terminal() {
        let chain = MiddlewareChain::new();
        assert!(chain.is_empty());
        let out = chain.execute(&mut ctx("x"), &Echo).await.unwrap();
        assert_eq!(out["n"], 1);
    }
}
