//! Exchange-local tool result cache.
//!
//! Keys include the intent's schema hash, so a result computed against one
//! version of an intent is never served for another.

use std::collections::HashMap;

use sb_domain::turn::ToolCallRequest;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolCacheKey {
    pub function_name: String,
    /// Exact text the model sent; not normalized.
    pub raw_arguments: String,
    pub schema_hash: String,
}

impl ToolCacheKey {
    pub fn new(call: &ToolCallRequest, schema_hash: impl Into<String>) -> Self {
        Self {
            function_name: call.function_name.clone(),
            raw_arguments: call.raw_arguments.clone(),
            schema_hash: schema_hash.into(),
        }
    }
}

/// Serialized tool responses keyed by [`ToolCacheKey`].
#[derive(Debug, Default)]
pub struct ToolResultCache {
    entries: HashMap<ToolCacheKey, String>,
}

impl ToolResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ToolCacheKey) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: ToolCacheKey, content: String) {
        self.entries.insert(key, content);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
