//! Filesystem-backed session store.
//!
//! Each session lives at `{data_dir}/{session_id}.json`. Writes are
//! atomic (temp file + fsync + rename) to prevent corruption on crash.
//!
//! # Examples
//!
//! ```no_run
//! use sona::store::FsChatStore;
//!
//! # fn example() -> sona::Result<()> {
//! let store = FsChatStore::new("/tmp/sona-sessions")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use super::ChatStore;
use crate::chat::session::{SessionMeta, StoredSession};
use crate::error::{ChatError, Result};

/// Filesystem-backed session store.
#[derive(Debug, Clone)]
pub struct FsChatStore {
    data_dir: PathBuf,
}

impl FsChatStore {
    /// Create a store, creating the data directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Store`] if the directory cannot be created.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir).map_err(|e| {
            ChatError::Store(format!(
                "failed to create session directory {}: {e}",
                data_dir.display()
            ))
        })?;
        Ok(Self { data_dir })
    }

    /// The data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.data_dir.join(format!("{id}.json"))
    }

    fn read_session_file(&self, path: &Path) -> Result<StoredSession> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChatError::Store(format!(
                "failed to read session file {}: {e}",
                path.display()
            ))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ChatError::Store(format!(
                "failed to parse session file {}: {e}",
                path.display()
            ))
        })
    }

    /// Write to a temp file in the same directory, fsync, then rename.
    fn write_session_atomic(&self, session: &StoredSession) -> Result<()> {
        let path = self.session_path(&session.meta.id);
        let json = serde_json::to_string_pretty(session)
            .map_err(|e| ChatError::Store(format!("failed to serialize session: {e}")))?;

        let tmp_path = self.data_dir.join(format!(".{}.tmp", session.meta.id));
        std::fs::write(&tmp_path, json.as_bytes()).map_err(|e| {
            ChatError::Store(format!(
                "failed to write temp file {}: {e}",
                tmp_path.display()
            ))
        })?;

        if let Ok(file) = std::fs::File::open(&tmp_path) {
            let _ = file.sync_all();
        }

        std::fs::rename(&tmp_path, &path).map_err(|e| {
            ChatError::Store(format!(
                "failed to rename temp file to {}: {e}",
                path.display()
            ))
        })?;

        Ok(())
    }
}

#[async_trait]
impl ChatStore for FsChatStore {
    async fn save(&self, session: &StoredSession) -> Result<()> {
        self.write_session_atomic(session)
    }

    async fn load(&self, id: &str) -> Result<StoredSession> {
        let path = self.session_path(id);
        if !path.exists() {
            return Err(ChatError::Store(format!("session not found: {id}")));
        }
        self.read_session_file(&path)
    }

    async fn list(&self) -> Result<Vec<SessionMeta>> {
        let entries = std::fs::read_dir(&self.data_dir).map_err(|e| {
            ChatError::Store(format!(
                "failed to read session directory {}: {e}",
                self.data_dir.display()
            ))
        })?;

        let mut metas = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            // An unreadable file must not hide the rest of the store
            match self.read_session_file(&path) {
                Ok(session) => metas.push(session.meta),
                Err(e) => warn!("skipping unreadable session file: {e}"),
            }
        }
        metas.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(metas)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.session_path(id);
        if !path.exists() {
            return Ok(());
        }
        std::fs::remove_file(&path).map_err(|e| {
            ChatError::Store(format!(
                "failed to delete session file {}: {e}",
                path.display()
            ))
        })
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.session_path(id).exists())
    }
}
