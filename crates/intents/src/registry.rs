use std::collections::BTreeMap;
use std::sync::Arc;

use crate::intent::Intent;
use crate::state::ExecutionState;

/// All intents known to the process, keyed by code.
#[derive(Debug, Clone, Default)]
pub struct IntentRegistry {
    intents: BTreeMap<String, Arc<Intent>>,
}

impl IntentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an intent. The first registration of a code wins; returns
    /// `false` when the code was already taken.
    pub fn register(&mut self, intent: Intent) -> bool {
        if self.intents.contains_key(intent.code()) {
            tracing::debug!(intent = intent.code(), "intent already registered, ignoring");
            return false;
        }
        self.intents
            .insert(intent.code().to_owned(), Arc::new(intent));
        true
    }

    pub fn get(&self, code: &str) -> Option<&Arc<Intent>> {
        self.intents.get(code)
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.intents.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// Snapshot the callable set, optionally restricted to `subset`.
    /// Unknown codes in the subset are skipped.
    pub fn execution_state(&self, subset: Option<&[String]>) -> ExecutionState {
        match subset {
            None => ExecutionState::new(self.intents.values().cloned()),
            Some(codes) => {
                let picked: Vec<Arc<Intent>> = codes
                    .iter()
                    .filter_map(|code| {
                        let found = self.intents.get(code).cloned();
                        if found.is_none() {
                            tracing::warn!(intent = %code, "tool subset names an unknown intent");
                        }
                        found
                    })
                    .collect();
                ExecutionState::new(picked)
            }
        }
    }
}
