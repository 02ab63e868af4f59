use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::middleware::MiddlewareContext;
use crate::shape::ParamShape;

/// Error returned by an intent handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// The function behind an intent.
///
/// Receives the middleware context (read-only by the time the handler
/// runs) and the coerced argument map.
#[async_trait::async_trait]
pub trait IntentHandler: Send + Sync {
    async fn call(
        &self,
        ctx: &MiddlewareContext,
        args: Map<String, Value>,
    ) -> Result<Value, HandlerError>;
}

/// Adapts an async closure over the argument map into an [`IntentHandler`].
pub struct FnHandler<F>(F);

impl<F> FnHandler<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait::async_trait]
impl<F, Fut> IntentHandler for FnHandler<F>
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    async fn call(
        &self,
        _ctx: &MiddlewareContext,
        args: Map<String, Value>,
    ) -> Result<Value, HandlerError> {
        (self.0)(args).await
    }
}

/// A named, schema-typed callable.
#[derive(Clone)]
pub struct Intent {
    code: String,
    description_lines: Vec<String>,
    shape: ParamShape,
    handler: Arc<dyn IntentHandler>,
}

impl Intent {
    pub fn new(
        code: impl Into<String>,
        shape: ParamShape,
        handler: impl IntentHandler + 'static,
    ) -> Self {
        Self {
            code: code.into(),
            description_lines: Vec::new(),
            shape,
            handler: Arc::new(handler),
        }
    }

    /// Build an intent from an async closure.
    pub fn from_fn<F, Fut>(code: impl Into<String>, shape: ParamShape, f: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        Self::new(code, shape, FnHandler::new(f))
    }

    /// Append one line to the description shown to the model.
    pub fn with_description(mut self, line: impl Into<String>) -> Self {
        self.description_lines.push(line.into());
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn description_lines(&self) -> &[String] {
        &self.description_lines
    }

    pub fn description(&self) -> String {
        self.description_lines.join("\n")
    }

    pub fn shape(&self) -> &ParamShape {
        &self.shape
    }

    pub fn handler(&self) -> &dyn IntentHandler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Intent")
            .field("code", &self.code)
            .field("description_lines", &self.description_lines)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}
