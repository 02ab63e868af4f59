use std::sync::Arc;

use sb_domain::config::{SessionsConfig, StorageKind};
use sb_domain::error::{Error, Result};
use sb_sessions::{JsonlStorage, MemoryStorage, SessionStorage};

/// Build the storage backend named by `[sessions]`.
pub fn storage_from_config(cfg: &SessionsConfig) -> Result<Arc<dyn SessionStorage>> {
    match cfg.storage {
        StorageKind::Memory => Ok(Arc::new(MemoryStorage::new())),
        StorageKind::Jsonl => {
            let dir = cfg.state_path.as_deref().ok_or_else(|| {
                Error::Config("sessions.storage = \"jsonl\" requires sessions.state_path".into())
            })?;
            Ok(Arc::new(JsonlStorage::new(dir)?))
        }
    }
}
