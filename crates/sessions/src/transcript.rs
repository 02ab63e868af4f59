//! JSONL file-backed session storage.
//!
//! Each session gets a `<sessionId>.jsonl` file under the base directory,
//! one turn per line, and a `<sessionId>.system.json` file holding its
//! system prompts. A save rewrites the whole file (temp file + rename), so a
//! crash never leaves a half-written transcript behind.
//!
//! Includes an in-memory write-through cache so reads never hit disk after
//! the first load, and runs all file I/O on the blocking pool. File-backed
//! transcripts do not expire; the `ttl` argument is ignored.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::RwLock;

use sb_domain::error::{Error, Result};
use sb_domain::turn::Turn;

use crate::store::SessionStorage;

pub struct JsonlStorage {
    base_dir: PathBuf,
    cache: RwLock<HashMap<String, Vec<Turn>>>,
}

impl JsonlStorage {
    /// Open (creating if needed) a storage directory.
    pub fn new(base_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(base_dir)?;
        tracing::info!(path = %base_dir.display(), "jsonl session storage opened");
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Drop the cached copy of a session so the next read goes to disk.
    pub fn invalidate_cache(&self, session_id: &str) {
        self.cache.write().remove(session_id);
    }

    fn transcript_path(&self, session_id: &str) -> Result<PathBuf> {
        check_session_id(session_id)?;
        Ok(self.base_dir.join(format!("{session_id}.jsonl")))
    }

    fn system_path(&self, session_id: &str) -> Result<PathBuf> {
        check_session_id(session_id)?;
        Ok(self.base_dir.join(format!("{session_id}.system.json")))
    }
}

#[async_trait::async_trait]
impl SessionStorage for JsonlStorage {
    async fn get_messages(&self, session_id: &str) -> Result<Vec<Turn>> {
        // Fast path: return from cache.
        if let Some(turns) = self.cache.read().get(session_id) {
            return Ok(turns.clone());
        }

        let path = self.transcript_path(session_id)?;
        let sid = session_id.to_owned();
        let turns = tokio::task::spawn_blocking(move || read_jsonl_file(&path, &sid))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        self.cache
            .write()
            .insert(session_id.to_owned(), turns.clone());
        Ok(turns)
    }

    async fn save_messages(
        &self,
        session_id: &str,
        turns: Vec<Turn>,
        _ttl: Option<Duration>,
    ) -> Result<()> {
        let path = self.transcript_path(session_id)?;
        let buf = serialize_turns(&turns)?;

        // Cache is updated only after the write lands.
        tokio::task::spawn_blocking(move || write_atomic(&path, buf.as_bytes()))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        self.cache.write().insert(session_id.to_owned(), turns);
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let paths = [self.transcript_path(session_id)?, self.system_path(session_id)?];
        tokio::task::spawn_blocking(move || {
            for path in paths {
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(Error::Io(e)),
                }
            }
            Ok(())
        })
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        self.invalidate_cache(session_id);
        Ok(())
    }

    async fn get_system_messages(&self, session_id: &str) -> Result<Vec<String>> {
        let path = self.system_path(session_id)?;
        tokio::task::spawn_blocking(move || {
            if !path.exists() {
                return Ok(Vec::new());
            }
            let raw = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&raw)?)
        })
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))?
    }

    async fn save_system_messages(
        &self,
        session_id: &str,
        messages: Vec<String>,
        _ttl: Option<Duration>,
    ) -> Result<()> {
        let path = self.system_path(session_id)?;
        let json = serde_json::to_vec_pretty(&messages)?;
        tokio::task::spawn_blocking(move || write_atomic(&path, &json))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))?
    }
}

// ── Private helpers ───────────────────────────────────────────────

/// Session ids become file names, so path syntax is refused outright.
fn check_session_id(session_id: &str) -> Result<()> {
    let bad = session_id.is_empty()
        || session_id.contains(['/', '\\'])
        || session_id.contains("..");
    if bad {
        return Err(Error::Storage(format!(
            "session id {session_id:?} is not usable as a file name"
        )));
    }
    Ok(())
}

fn serialize_turns(turns: &[Turn]) -> Result<String> {
    let mut buf = String::new();
    for turn in turns {
        let json = serde_json::to_string(turn)
            .map_err(|e| Error::Other(format!("serializing transcript turn: {e}")))?;
        buf.push_str(&json);
        buf.push('\n');
    }
    Ok(buf)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_path(path);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// `<file name>.tmp` next to `path`. The whole name is kept so files that
/// differ only in their extension never share a temp file.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read and parse a JSONL transcript file.
fn read_jsonl_file(path: &Path, session_id: &str) -> Result<Vec<Turn>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(path)?;
    let mut turns = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Turn>(line) {
            Ok(turn) => turns.push(turn),
            Err(e) => {
                tracing::warn!(
                    session_id = session_id,
                    error = %e,
                    "skipping malformed transcript line"
                );
            }
        }
    }
    Ok(turns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_domain::turn::ToolCallRequest;

    #[tokio::test]
    async fn round_trips_tool_turns_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStorage::new(dir.path()).unwrap();
        let turns = vec![
            Turn::user("book it"),
            Turn::assistant_tool_calls(
                "",
                vec![ToolCallRequest::new("c1", "booking-change", r#"{"confirm":true}"#)],
            ),
            Turn::tool("c1", "booking-change", r#"{"ok":true}"#),
        ];
        store.save_messages("s1", turns.clone(), None).await.unwrap();

        // Fresh handle: forces a disk read.
        let reopened = JsonlStorage::new(dir.path()).unwrap();
        let back = reopened.get_messages("s1").await.unwrap();
        assert_eq!(back, turns);
    }

    #[tokio::test]
    async fn save_replaces_previous_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStorage::new(dir.path()).unwrap();
        store
            .save_messages("s1", vec![Turn::user("a"), Turn::assistant("b")], None)
            .await
            .unwrap();
        store
            .save_messages("s1", vec![Turn::user("a")], None)
            .await
            .unwrap();

        store.invalidate_cache("s1");
        assert_eq!(store.get_messages("s1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let line = serde_json::to_string(&Turn::user("ok")).unwrap();
        std::fs::write(dir.path().join("s1.jsonl"), format!("{line}\nnot json\n")).unwrap();

        let store = JsonlStorage::new(dir.path()).unwrap();
        let back = store.get_messages("s1").await.unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].content, "ok");
    }

    #[tokio::test]
    async fn system_messages_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStorage::new(dir.path()).unwrap();
        store
            .save_system_messages("s1", vec!["answer in French".into()], None)
            .await
            .unwrap();
        store
            .save_messages("s1", vec![Turn::user("salut")], None)
            .await
            .unwrap();
        assert_eq!(
            store.get_system_messages("s1").await.unwrap(),
            vec!["answer in French".to_string()]
        );

        store.delete_session("s1").await.unwrap();
        assert!(store.get_messages("s1").await.unwrap().is_empty());
        assert!(store.get_system_messages("s1").await.unwrap().is_empty());
        // Deleting twice is fine.
        store.delete_session("s1").await.unwrap();
    }

    #[tokio::test]
    async fn dotted_session_ids_do_not_share_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStorage::new(dir.path()).unwrap();

        let transcript = store.transcript_path("a.system").unwrap();
        let system = store.system_path("a").unwrap();
        assert_ne!(temp_path(&transcript), temp_path(&system));
        assert_eq!(
            temp_path(&system).file_name().unwrap(),
            "a.system.json.tmp"
        );

        store
            .save_messages("a.system", vec![Turn::user("hi")], None)
            .await
            .unwrap();
        store
            .save_system_messages("a", vec!["be brief".into()], None)
            .await
            .unwrap();
        store.invalidate_cache("a.system");
        store.invalidate_cache("a");
        assert_eq!(store.get_messages("a.system").await.unwrap().len(), 1);
        assert_eq!(store.get_system_messages("a").await.unwrap(), ["be brief"]);
    }

    #[tokio::test]
    async fn path_like_session_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStorage::new(dir.path()).unwrap();
        let err = store.get_messages("../escape").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
