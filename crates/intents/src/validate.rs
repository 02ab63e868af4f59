//! Response consistency check.
//!
//! A handler that echoes a requested parameter back must echo it unchanged:
//! asking for booking `X1` and getting `X2` back means the handler answered
//! a different question. Numbers are compared by kind only, since handlers
//! freely widen or reformat them.

use serde_json::{Map, Value};

use crate::error::IntentError;

/// Verify that `response` agrees with the requested `params` on every key
/// they share. `response` may be a record or a list of records; anything
/// else is not checked.
pub fn check_response_consistency(
    intent: &str,
    params: &Map<String, Value>,
    response: &Value,
) -> Result<(), IntentError> {
    match response {
        Value::Object(record) => check_record(intent, params, record, None),
        Value::Array(items) => items.iter().enumerate().try_for_each(|(idx, item)| {
            match item {
                Value::Object(record) => check_record(intent, params, record, Some(idx)),
                _ => Ok(()),
            }
        }),
        _ => Ok(()),
    }
}

fn check_record(
    intent: &str,
    params: &Map<String, Value>,
    record: &Map<String, Value>,
    index: Option<usize>,
) -> Result<(), IntentError> {
    for (key, requested) in params {
        let Some(returned) = record.get(key) else {
            continue;
        };
        if requested.is_null() || returned.is_null() {
            continue;
        }

        let location = match index {
            Some(i) => format!("item {i}, field `{key}`"),
            None => format!("field `{key}`"),
        };

        if kind(requested) != kind(returned) {
            return Err(IntentError::InvalidResponse {
                intent: intent.to_owned(),
                message: format!(
                    "{location}: requested a {} but the response holds a {}",
                    kind(requested),
                    kind(returned)
                ),
            });
        }
        if !requested.is_number() && requested != returned {
            return Err(IntentError::InvalidResponse {
                intent: intent.to_owned(),
                message: format!("{location}: requested {requested} but got {returned}"),
            });
        }
    }
    Ok(())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn matching_echo_passes() {
        let p = params(json!({"bookingRef": "X1", "confirm": true}));
        let resp = json!({"bookingRef": "X1", "confirm": true, "status": "changed"});
        assert!(check_response_consistency("booking-change", &p, &resp).is_ok());
    }

    #[test]
    fn numbers_compare_by_kind_only() {
        let p = params(json!({"seats": 2}));
        let resp = json!({"seats": 2.0});
        assert!(check_response_consistency("x", &p, &resp).is_ok());
        let resp = json!({"seats": 5});
        assert!(check_response_consistency("x", &p, &resp).is_ok());
    }

    #[test]
    fn value_mismatch_fails() {
        let p = params(json!({"bookingRef": "X1"}));
        let resp = json!({"bookingRef": "X2"});
        let err = check_response_consistency("x", &p, &resp).unwrap_err();
        assert_eq!(err.code(), "INVALID_RESPONSE");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn type_mismatch_fails() {
        let p = params(json!({"seats": 2}));
        let resp = json!({"seats": "2"});
        assert!(check_response_consistency("x", &p, &resp).is_err());
    }

    #[test]
    fn lists_are_checked_per_record_and_nulls_skipped() {
        let p = params(json!({"city": "Lyon", "note": null}));
        let ok = json!([{"city": "Lyon"}, {"other": 1}, "scalar", {"city": null}]);
        assert!(check_response_consistency("x", &p, &ok).is_ok());

        let bad = json!([{"city": "Lyon"}, {"city": "Paris"}]);
        let err = check_response_consistency("x", &p, &bad).unwrap_err();
        assert!(err.to_string().contains("item 1"));
    }

    #[test]
    fn scalar_responses_are_not_checked() {
        let p = params(json!({"city": "Lyon"}));
        assert!(check_response_consistency("x", &p, &json!("done")).is_ok());
    }
}
