//! Parse model-supplied argument text against a parameter shape.
//!
//! Models routinely send `"true"` for booleans and `3.0` for integers, so
//! those are accepted; anything the shape cannot make sense of is rejected
//! with an error the model can read and correct.

use serde_json::{Map, Value};

use crate::error::IntentError;
use crate::shape::{ParamShape, ParamType};

/// Parse `raw` and coerce it to `shape`.
///
/// Undeclared keys are dropped; `null` for an optional field counts as
/// absent.
pub fn coerce_arguments(
    intent: &str,
    shape: &ParamShape,
    raw: &str,
) -> Result<Map<String, Value>, IntentError> {
    let parsed: Value =
        serde_json::from_str(raw).map_err(|e| IntentError::InvalidArguments {
            intent: intent.to_owned(),
            message: format!("arguments are not valid JSON: {e}"),
        })?;

    let mut input = match parsed {
        Value::Object(map) => map,
        other => {
            return Err(IntentError::InvalidArgumentFormat {
                intent: intent.to_owned(),
                message: format!("got {}", kind_name(&other)),
            })
        }
    };

    let mut out = Map::new();
    for field in shape.fields() {
        let value = match input.remove(&field.json_key) {
            None | Some(Value::Null) => {
                if field.required {
                    return Err(IntentError::InvalidArguments {
                        intent: intent.to_owned(),
                        message: format!("missing required field `{}`", field.json_key),
                    });
                }
                continue;
            }
            Some(v) => v,
        };

        let coerced = match field.param_type {
            ParamType::Boolean => Some(coerce_bool(&value).ok_or_else(|| {
                IntentError::InvalidArgumentType {
                    intent: intent.to_owned(),
                    field: field.json_key.clone(),
                    message: format!("expected a boolean, got {value}"),
                }
            })?),
            ParamType::Integer => coerce_integer(&value),
            other => Some(value).filter(|v| matches_type(v, other)),
        }
        .ok_or_else(|| IntentError::InvalidArguments {
            intent: intent.to_owned(),
            message: format!(
                "field `{}` must be of type {}",
                field.json_key,
                field.param_type.as_str()
            ),
        });

        out.insert(field.json_key.clone(), coerced?);
    }

    if !input.is_empty() {
        tracing::debug!(
            intent,
            dropped = ?input.keys().collect::<Vec<_>>(),
            "dropping undeclared arguments"
        );
    }
    Ok(out)
}

fn coerce_bool(value: &Value) -> Option<Value> {
    let b = match value {
        Value::Bool(b) => *b,
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "y" => true,
            "false" | "0" | "no" | "n" => false,
            _ => return None,
        },
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => true,
            Some(f) if f == 0.0 => false,
            _ => return None,
        },
        _ => return None,
    };
    Some(Value::Bool(b))
}

fn coerce_integer(value: &Value) -> Option<Value> {
    let Value::Number(n) = value else {
        return None;
    };
    if n.is_i64() || n.is_u64() {
        return Some(value.clone());
    }
    let f = n.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(Value::from(f as i64))
    } else {
        None
    }
}

fn matches_type(value: &Value, ty: ParamType) -> bool {
    match ty {
        ParamType::String => value.is_string(),
        ParamType::Number => value.is_number(),
        ParamType::Array => value.is_array(),
        ParamType::Object => value.is_object(),
        ParamType::Boolean => value.is_boolean(),
        ParamType::Integer => value.is_i64() || value.is_u64(),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn booking_shape() -> ParamShape {
        ParamShape::new()
            .required("bookingRef", ParamType::String, "")
            .optional("confirm", ParamType::Boolean, "")
            .optional("seats", ParamType::Integer, "")
    }

    fn coerce(raw: &str) -> Result<Map<String, Value>, IntentError> {
        coerce_arguments("booking-change", &booking_shape(), raw)
    }

    #[test]
    fn string_booleans_are_accepted() {
        for (raw, want) in [
            ("true", true),
            (" YES ", true),
            ("y", true),
            ("1", true),
            ("False", false),
            ("no", false),
            ("0", false),
        ] {
            let args = coerce(&format!(r#"{{"bookingRef":"X1","confirm":"{raw}"}}"#)).unwrap();
            assert_eq!(args["confirm"], json!(want), "input {raw:?}");
        }
        let args = coerce(r#"{"bookingRef":"X1","confirm":1}"#).unwrap();
        assert_eq!(args["confirm"], json!(true));
    }

    #[test]
    fn unusable_boolean_is_a_type_error() {
        let err = coerce(r#"{"bookingRef":"X1","confirm":"maybe"}"#).unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT_TYPE");
        assert!(matches!(err, IntentError::InvalidArgumentType { ref field, .. } if field == "confirm"));

        let err = coerce(r#"{"bookingRef":"X1","confirm":2}"#).unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT_TYPE");
    }

    #[test]
    fn malformed_and_non_object_input() {
        assert_eq!(coerce("{not json").unwrap_err().code(), "INVALID_ARGUMENTS");
        assert_eq!(coerce("[1,2]").unwrap_err().code(), "INVALID_ARGUMENT_FORMAT");
        assert_eq!(coerce("\"x\"").unwrap_err().code(), "INVALID_ARGUMENT_FORMAT");
    }

    #[test]
    fn missing_required_and_wrong_type() {
        assert_eq!(coerce("{}").unwrap_err().code(), "INVALID_ARGUMENTS");
        assert_eq!(
            coerce(r#"{"bookingRef":null}"#).unwrap_err().code(),
            "INVALID_ARGUMENTS"
        );
        assert_eq!(
            coerce(r#"{"bookingRef":42}"#).unwrap_err().code(),
            "INVALID_ARGUMENTS"
        );
        assert_eq!(
            coerce(r#"{"bookingRef":"X1","seats":2.5}"#)
                .unwrap_err()
                .code(),
            "INVALID_ARGUMENTS"
        );
    }

    #[test]
    fn integral_floats_become_integers() {
        let args = coerce(r#"{"bookingRef":"X1","seats":3.0}"#).unwrap();
        assert_eq!(args["seats"], json!(3));
        assert!(args["seats"].is_i64());
    }

    #[test]
    fn out_of_range_floats_are_not_saturated() {
        assert!(coerce(r#"{"bookingRef":"X1","seats":9223372036854775808.0}"#).is_err());
        assert!(coerce(r#"{"bookingRef":"X1","seats":1e300}"#).is_err());

        let args = coerce(r#"{"bookingRef":"X1","seats":-9223372036854775808.0}"#).unwrap();
        assert_eq!(args["seats"], json!(i64::MIN));
    }

    #[test]
    fn undeclared_keys_and_optional_nulls_are_dropped() {
        let args = coerce(r#"{"bookingRef":"X1","confirm":null,"extra":"x"}"#).unwrap();
        assert_eq!(Value::Object(args), json!({"bookingRef": "X1"}));
    }
}
