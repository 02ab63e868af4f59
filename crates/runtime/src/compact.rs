//! Payload compaction for bootstrap tool turns.
//!
//! Bootstrap results are injected into the transcript without the model
//! asking for them, so they are bounded before they land there: deep
//! structures collapse to a marker, long arrays and objects are cut with a
//! count of what was dropped, long strings are cut at a char boundary.

use serde_json::{json, Map, Value};

use sb_domain::config::CompactionLimits;

const STRING_MARKER: &str = "…[truncated]";

/// Recursively bound `value` by `limits`.
pub fn compact_value(value: &Value, limits: &CompactionLimits) -> Value {
    compact_at(value, limits, 0)
}

fn compact_at(value: &Value, limits: &CompactionLimits, depth: usize) -> Value {
    match value {
        Value::String(s) => Value::String(truncate_string(s, limits.max_string_chars)),
        Value::Array(items) => {
            if depth >= limits.max_depth {
                return depth_marker("array", items.len());
            }
            let mut out: Vec<Value> = items
                .iter()
                .take(limits.max_array_items)
                .map(|item| compact_at(item, limits, depth + 1))
                .collect();
            if items.len() > limits.max_array_items {
                out.push(json!({ "remaining_items": items.len() - limits.max_array_items }));
            }
            Value::Array(out)
        }
        Value::Object(map) => {
            if depth >= limits.max_depth {
                return depth_marker("object", map.len());
            }
            let mut out = Map::new();
            for (key, v) in map.iter().take(limits.max_object_keys) {
                out.insert(key.clone(), compact_at(v, limits, depth + 1));
            }
            if map.len() > limits.max_object_keys {
                out.insert(
                    "_truncated_keys".into(),
                    json!(map.len() - limits.max_object_keys),
                );
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn depth_marker(kind: &str, size: usize) -> Value {
    json!({ "truncated": true, "type": kind, "size": size })
}

/// First `max_chars` characters of `s`, never splitting a code point.
pub fn char_prefix(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Cut `s` to `max_chars` characters and mark the cut.
pub fn truncate_string(s: &str, max_chars: usize) -> String {
    let prefix = char_prefix(s, max_chars);
    if prefix.len() == s.len() {
        return s.to_owned();
    }
    format!("{prefix}{STRING_MARKER}")
}

/// Envelope fields holding intent output. Everything else is metadata the
/// envelope always keeps.
const PAYLOAD_KEYS: [&str; 2] = ["data", "error"];

/// Compact the payload of a bootstrap envelope and serialize it, falling
/// back to a `PAYLOAD_TOO_LARGE` stub with a preview when the result still
/// exceeds `max_payload_bytes`.
pub fn fit_envelope(envelope: &Value, limits: &CompactionLimits) -> String {
    let mut bounded = envelope.clone();
    if let Value::Object(map) = &mut bounded {
        for key in PAYLOAD_KEYS {
            if let Some(payload) = map.get_mut(key) {
                let compacted = compact_value(payload, limits);
                *payload = compacted;
            }
        }
    }
    let compacted = bounded.to_string();
    if compacted.len() <= limits.max_payload_bytes {
        return compacted;
    }

    let raw = envelope.to_string();
    tracing::debug!(
        bytes = compacted.len(),
        budget = limits.max_payload_bytes,
        "bootstrap payload over budget after compaction"
    );
    json!({
        "source": envelope.get("source").cloned().unwrap_or(Value::Null),
        "intentCode": envelope.get("intentCode").cloned().unwrap_or(Value::Null),
        "status": envelope.get("status").cloned().unwrap_or(Value::Null),
        "reason": "PAYLOAD_TOO_LARGE",
        "preview": char_prefix(&raw, limits.preview_chars),
    })
    .to_string()
}
