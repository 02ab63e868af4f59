use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session storage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Which storage backend holds transcripts.
    #[serde(default)]
    pub storage: StorageKind,
    /// Directory for file-backed storage.
    #[serde(default)]
    pub state_path: Option<PathBuf>,
    /// Transcript time-to-live in seconds. 0 = never expire.
    #[serde(default = "d_86400")]
    pub ttl_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            storage: StorageKind::Memory,
            state_path: None,
            ttl_secs: 86_400,
        }
    }
}

impl SessionsConfig {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    Jsonl,
}

fn d_86400() -> u64 {
    86_400
}
