//! Single intent invocation: resolve, coerce, run the chain, validate.

use serde_json::{Map, Value};
use tracing::Instrument;

use crate::coerce::coerce_arguments;
use crate::error::IntentError;
use crate::intent::Intent;
use crate::middleware::{MiddlewareChain, MiddlewareContext, Terminal};
use crate::state::ExecutionState;
use crate::validate::check_response_consistency;

/// One requested invocation.
#[derive(Debug, Clone, Copy)]
pub struct IntentCall<'a> {
    pub session_id: &'a str,
    pub user_message: &'a str,
    pub function_name: &'a str,
    pub raw_arguments: &'a str,
    /// Results of earlier successful calls in the same exchange.
    pub previous_results: &'a [Value],
}

/// Terminal step: hand the (possibly middleware-rewritten) parameters to
/// the intent's handler.
struct HandlerStep<'a> {
    intent: &'a Intent,
}

#[async_trait::async_trait]
impl Terminal for HandlerStep<'_> {
    async fn call(&self, ctx: &mut MiddlewareContext) -> Result<Value, IntentError> {
        let args = ctx.parameters.clone();
        self.intent
            .handler()
            .call(ctx, args)
            .await
            .map_err(|e| IntentError::Handler {
                intent: self.intent.code().to_owned(),
                message: e.message,
            })
    }
}

/// Execute one call against `state`.
///
/// Recoverable errors (unknown intent, bad arguments) are returned before
/// any middleware runs.
pub async fn execute_call(
    state: &ExecutionState,
    chain: &MiddlewareChain,
    call: IntentCall<'_>,
) -> Result<Value, IntentError> {
    let intent = state
        .get(call.function_name)
        .ok_or_else(|| IntentError::ToolNotFound {
            requested: call.function_name.to_owned(),
        })?;

    let args = coerce_arguments(intent.code(), intent.shape(), call.raw_arguments)?;

    let span = tracing::info_span!(
        "tool.call",
        session_id = %call.session_id,
        intent = %intent.code(),
    );

    run_chain(chain, intent, call, args).instrument(span).await
}

async fn run_chain(
    chain: &MiddlewareChain,
    intent: &Intent,
    call: IntentCall<'_>,
    args: Map<String, Value>,
) -> Result<Value, IntentError> {
    let mut ctx = MiddlewareContext::new(
        call.session_id,
        intent.code(),
        call.user_message,
        args,
    );
    ctx.previous_results = call.previous_results.to_vec();

    let result = chain.execute(&mut ctx, &HandlerStep { intent }).await?;
    // Compare against what the handler received, after middleware rewrites.
    check_response_consistency(intent.code(), &ctx.parameters, &result)?;
    Ok(result)
}
