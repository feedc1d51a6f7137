//! Session persistence: storage trait, in-memory store, and the
//! local/remote bridge.
//!
//! [`ChatStore`] is the async CRUD surface over [`StoredSession`]s.
//! [`MemoryChatStore`] backs tests and ephemeral use; [`FsChatStore`]
//! (in [`fs`]) persists JSON files; [`PersistenceBridge`] (in [`bridge`])
//! routes between a local and a remote store by auth state.
//!
//! # Examples
//!
//! ```
//! use sona::store::{ChatStore, MemoryChatStore};
//!
//! # async fn example() -> sona::Result<()> {
//! let store = MemoryChatStore::new();
//! assert!(store.is_empty().await?);
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod fs;

pub use bridge::PersistenceBridge;
pub use fs::FsChatStore;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::chat::session::{SessionId, SessionMeta, StoredSession};
use crate::error::{ChatError, Result};

/// Async session storage backend.
///
/// All methods are async to support both in-memory and filesystem (or
/// remote) backends behind one seam.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Save (overwrite) a session.
    async fn save(&self, session: &StoredSession) -> Result<()>;

    /// Load a session by ID.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Store`] if the session does not exist or is
    /// corrupted.
    async fn load(&self, id: &str) -> Result<StoredSession>;

    /// List metadata for all stored sessions.
    async fn list(&self) -> Result<Vec<SessionMeta>>;

    /// Delete a session by ID. `Ok(())` even if it did not exist.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Whether a session with the given ID exists.
    async fn exists(&self, id: &str) -> Result<bool>;

    /// Whether the store holds no sessions.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.list().await?.is_empty())
    }
}

/// In-memory session store for testing and ephemeral usage.
///
/// Sessions live in an `Arc<RwLock<HashMap>>` and are lost when the last
/// clone is dropped. Thread-safe and cheaply cloneable.
#[derive(Debug, Clone, Default)]
pub struct MemoryChatStore {
    sessions: Arc<RwLock<HashMap<SessionId, StoredSession>>>,
}

impl MemoryChatStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn save(&self, session: &StoredSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.meta.id.clone(), session.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<StoredSession> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| ChatError::Store(format!("session not found: {id}")))
    }

    async fn list(&self) -> Result<Vec<SessionMeta>> {
        let sessions = self.sessions.read().await;
        let mut metas: Vec<SessionMeta> = sessions.values().map(|s| s.meta.clone()).collect();
        metas.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(metas)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id);
        Ok(())
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let sessions = self.sessions.read().await;
        Ok(sessions.contains_key(id))
    }
}
