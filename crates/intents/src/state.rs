//! Per-exchange execution snapshot and schema hashing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use sb_domain::tool::ToolDefinition;

use crate::intent::Intent;

/// Immutable view of the callable intents for one exchange.
///
/// Built from the registry (optionally restricted to a subset) and never
/// mutated afterwards; a different callable set means a new state.
#[derive(Debug, Clone, Default)]
pub struct ExecutionState {
    intents: BTreeMap<String, Arc<Intent>>,
    hashes: HashMap<String, String>,
    available: Vec<String>,
}

impl ExecutionState {
    pub fn new(intents: impl IntoIterator<Item = Arc<Intent>>) -> Self {
        let intents: BTreeMap<String, Arc<Intent>> = intents
            .into_iter()
            .map(|i| (i.code().to_owned(), i))
            .collect();
        let hashes = intents
            .iter()
            .map(|(code, intent)| (code.clone(), schema_hash(intent)))
            .collect();
        let available = intents.keys().cloned().collect();
        Self {
            intents,
            hashes,
            available,
        }
    }

    pub fn get(&self, code: &str) -> Option<&Arc<Intent>> {
        self.intents.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.intents.contains_key(code)
    }

    pub fn schema_hash(&self, code: &str) -> Option<&str> {
        self.hashes.get(code).map(String::as_str)
    }

    /// Callable names, sorted.
    pub fn available_names(&self) -> &[String] {
        &self.available
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// Tool list for the model request, in name order.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.intents
            .values()
            .map(|intent| ToolDefinition {
                name: intent.code().to_owned(),
                description: intent.description(),
                parameters: intent.shape().to_json_schema(),
            })
            .collect()
    }
}

/// SHA-256 (hex) over the intent code, description lines, and parameter
/// fields sorted by key.
pub fn schema_hash(intent: &Intent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"code\0");
    hasher.update(intent.code().as_bytes());
    for line in intent.description_lines() {
        hasher.update(b"\0desc\0");
        hasher.update(line.as_bytes());
    }

    let mut fields: Vec<_> = intent.shape().fields().iter().collect();
    fields.sort_by(|a, b| a.json_key.cmp(&b.json_key));
    for f in fields {
        hasher.update(b"\0field\0");
        hasher.update(f.json_key.as_bytes());
        hasher.update(b"\0");
        hasher.update(f.param_type.as_str().as_bytes());
        hasher.update(if f.required { b"\0required\0" } else { b"\0optional\0" });
        hasher.update(f.description.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{ParamShape, ParamType};
    use serde_json::json;

    fn intent(shape: ParamShape) -> Intent {
        Intent::from_fn("booking-change", shape, |_args| async { Ok(json!({})) })
            .with_description("Change a booking.")
    }

    fn base_shape() -> ParamShape {
        ParamShape::new()
            .required("bookingRef", ParamType::String, "Reference")
            .optional("confirm", ParamType::Boolean, "")
    }

    #[test]
    fn hash_is_stable_and_order_independent() {
        let a = intent(base_shape());
        let b = intent(
            ParamShape::new()
                .optional("confirm", ParamType::Boolean, "")
                .required("bookingRef", ParamType::String, "Reference"),
        );
        assert_eq!(schema_hash(&a), schema_hash(&a));
        assert_eq!(schema_hash(&a), schema_hash(&b));
        assert_eq!(schema_hash(&a).len(), 64);
    }

    #[test]
    fn any_schema_change_changes_the_hash() {
        let base = schema_hash(&intent(base_shape()));

        let retyped = base_shape().optional("confirm", ParamType::String, "");
        let now_required = base_shape().required("confirm", ParamType::Boolean, "");
        let redescribed = base_shape().required("bookingRef", ParamType::String, "Ref");
        let extra = base_shape().optional("seats", ParamType::Integer, "");

        for shape in [retyped, now_required, redescribed, extra] {
            assert_ne!(schema_hash(&intent(shape)), base);
        }

        let more_docs = intent(base_shape()).with_description("Requires confirmation.");
        assert_ne!(schema_hash(&more_docs), base);
    }

    #[test]
    fn names_are_sorted_and_tools_rendered() {
        let state = ExecutionState::new([
            Arc::new(Intent::from_fn("zeta", ParamShape::new(), |_| async {
                Ok(json!(null))
            })),
            Arc::new(intent(base_shape())),
        ]);
        assert_eq!(state.available_names(), ["booking-change", "zeta"]);
        assert!(state.schema_hash("zeta").is_some());

        let tools = state.tool_definitions();
        assert_eq!(tools[0].name, "booking-change");
        assert_eq!(tools[0].description, "Change a booking.");
        assert_eq!(tools[0].parameters["required"], json!(["bookingRef"]));
    }
}
