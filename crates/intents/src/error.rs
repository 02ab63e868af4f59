use serde_json::{json, Value};

/// Failure of a single intent invocation.
///
/// The first four variants are recoverable: the orchestrator turns them into
/// a structured tool response so the model can correct itself. The rest
/// abort the exchange.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntentError {
    #[error("no intent named {requested:?} is available")]
    ToolNotFound { requested: String },

    #[error("invalid arguments for {intent}: {message}")]
    InvalidArguments { intent: String, message: String },

    #[error("arguments for {intent} must be a JSON object: {message}")]
    InvalidArgumentFormat { intent: String, message: String },

    #[error("field {field:?} of {intent} has an unusable value: {message}")]
    InvalidArgumentType {
        intent: String,
        field: String,
        message: String,
    },

    #[error("intent {intent} returned an inconsistent response: {message}")]
    InvalidResponse { intent: String, message: String },

    #[error("intent {intent} failed: {message}")]
    Handler { intent: String, message: String },

    #[error("middleware {middleware} rejected intent {intent}: {reason}")]
    Rejected {
        middleware: String,
        intent: String,
        reason: String,
    },
}

impl IntentError {
    /// Stable machine-readable code used in tool error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            IntentError::ToolNotFound { .. } => "TOOL_NOT_FOUND",
            IntentError::InvalidArguments { .. } => "INVALID_ARGUMENTS",
            IntentError::InvalidArgumentFormat { .. } => "INVALID_ARGUMENT_FORMAT",
            IntentError::InvalidArgumentType { .. } => "INVALID_ARGUMENT_TYPE",
            IntentError::InvalidResponse { .. } => "INVALID_RESPONSE",
            IntentError::Handler { .. } => "INTENT_FAILED",
            IntentError::Rejected { .. } => "REJECTED",
        }
    }

    /// The intent the error concerns (the requested name for `ToolNotFound`).
    pub fn intent(&self) -> &str {
        match self {
            IntentError::ToolNotFound { requested } => requested,
            IntentError::InvalidArguments { intent, .. }
            | IntentError::InvalidArgumentFormat { intent, .. }
            | IntentError::InvalidArgumentType { intent, .. }
            | IntentError::InvalidResponse { intent, .. }
            | IntentError::Handler { intent, .. }
            | IntentError::Rejected { intent, .. } => intent,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            IntentError::ToolNotFound { .. }
                | IntentError::InvalidArguments { .. }
                | IntentError::InvalidArgumentFormat { .. }
                | IntentError::InvalidArgumentType { .. }
        )
    }

    /// Tool-response payload describing this error to the model.
    pub fn to_payload(&self, requested_tool: &str, available: &[String]) -> Value {
        tool_error_payload(self.code(), &self.to_string(), requested_tool, available)
    }
}

/// `{"error": {"code", "message", "requestedTool", "availableTools"}}`
pub fn tool_error_payload(
    code: &str,
    message: &str,
    requested_tool: &str,
    available: &[String],
) -> Value {
    json!({
        "error": {
            "code": code,
            "message": message,
            "requestedTool": requested_tool,
            "availableTools": available,
        }
    })
}

impl From<IntentError> for sb_domain::Error {
    fn from(e: IntentError) -> Self {
        match e {
            IntentError::InvalidResponse { intent, message } => {
                sb_domain::Error::InvalidResponse { intent, message }
            }
            IntentError::Rejected {
                middleware,
                intent,
                reason,
            } => sb_domain::Error::Rejected {
                middleware,
                intent,
                reason,
            },
            IntentError::Handler { intent, message } => {
                sb_domain::Error::IntentFailed { intent, message }
            }
            other => sb_domain::Error::IntentFailed {
                intent: other.intent().to_owned(),
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_shape() {
        let err = IntentError::ToolNotFound {
            requested: "refund".into(),
        };
        let payload = err.to_payload("refund", &["booking-change".to_string()]);

        assert_eq!(payload["error"]["code"], "TOOL_NOT_FOUND");
        assert_eq!(payload["error"]["requestedTool"], "refund");
        assert_eq!(payload["error"]["availableTools"][0], "booking-change");
        assert!(payload["error"]["message"]
            .as_str()
            .unwrap()
            .contains("refund"));
    }

    #[test]
    fn recoverability_split() {
        assert!(IntentError::InvalidArgumentType {
            intent: "x".into(),
            field: "confirm".into(),
            message: "maybe".into(),
        }
        .is_recoverable());
        assert!(!IntentError::InvalidResponse {
            intent: "x".into(),
            message: "m".into(),
        }
        .is_recoverable());
        assert!(!IntentError::Rejected {
            middleware: "rate_limit".into(),
            intent: "x".into(),
            reason: "busy".into(),
        }
        .is_recoverable());
    }

    #[test]
    fn converts_into_shared_error() {
        let err: sb_domain::Error = IntentError::Handler {
            intent: "lookup".into(),
            message: "db down".into(),
        }
        .into();
        assert!(matches!(err, sb_domain::Error::IntentFailed { ref intent, .. } if intent == "lookup"));

        let err: sb_domain::Error = IntentError::InvalidArguments {
            intent: "lookup".into(),
            message: "bad".into(),
        }
        .into();
        assert!(matches!(err, sb_domain::Error::IntentFailed { ref intent, .. } if intent == "lookup"));
    }
}
