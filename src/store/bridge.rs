//! Local/remote persistence routing.
//!
//! [`PersistenceBridge`] owns two stores: a local one for signed-out use
//! and a remote one once the user signs in. `persist` and `hydrate` route
//! to whichever is active. The signed-out→signed-in transition performs a
//! one-time migration: when the remote store is empty and the local one
//! is not, local sessions are copied up and then cleared locally. The
//! migration runs at most once per transition.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use super::ChatStore;
use crate::chat::session::{ChatSession, StoredSession};
use crate::error::Result;

/// Routes persistence between a local and a remote store.
pub struct PersistenceBridge {
    local: Arc<dyn ChatStore>,
    remote: Arc<dyn ChatStore>,
    authenticated: AtomicBool,
}

impl PersistenceBridge {
    /// Create a bridge starting signed out.
    pub fn new(local: Arc<dyn ChatStore>, remote: Arc<dyn ChatStore>) -> Self {
        Self {
            local,
            remote,
            authenticated: AtomicBool::new(false),
        }
    }

    /// Whether the remote store is currently active.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    /// The currently active store.
    fn active(&self) -> &Arc<dyn ChatStore> {
        if self.is_authenticated() {
            &self.remote
        } else {
            &self.local
        }
    }

    /// Save a session snapshot to the active store.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Store`](crate::error::ChatError::Store) on
    /// storage failure. Callers on the chat path should log and continue;
    /// persistence never feeds back into session status.
    pub async fn persist(&self, session: &ChatSession) -> Result<()> {
        let stored = StoredSession::from_session(session);
        self.active().save(&stored).await
    }

    /// Load a session from the active store.
    ///
    /// Returns `Ok(None)` when no such session exists. Hydrated sessions
    /// always start `Ready`; status is transient.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Store`](crate::error::ChatError::Store) when
    /// the session exists but cannot be read.
    pub async fn hydrate(&self, id: &str) -> Result<Option<ChatSession>> {
        let store = self.active();
        if !store.exists(id).await? {
            return Ok(None);
        }
        let stored = store.load(id).await?;
        Ok(Some(stored.into_session()))
    }

    /// Flip the auth state, migrating local sessions on sign-in.
    ///
    /// The migration copies every local session to the remote store and
    /// clears the local one, but only when the remote store is empty —
    /// an account with existing remote history is never overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Store`](crate::error::ChatError::Store) when
    /// the migration fails part-way; the auth state still changes, and
    /// already-copied sessions remain remote.
    pub async fn set_authenticated(&self, authenticated: bool) -> Result<()> {
        let was = self.authenticated.swap(authenticated, Ordering::AcqRel);
        if was || !authenticated {
            return Ok(());
        }
        self.migrate_local_to_remote().await
    }

    async fn migrate_local_to_remote(&self) -> Result<()> {
        if !self.remote.is_empty().await? {
            info!("remote store already has sessions, skipping migration");
            return Ok(());
        }
        let metas = self.local.list().await?;
        if metas.is_empty() {
            return Ok(());
        }

        info!("migrating {} local session(s) to remote", metas.len());
        for meta in &metas {
            let session = self.local.load(&meta.id).await?;
            self.remote.save(&session).await?;
        }
        for meta in &metas {
            if let Err(e) = self.local.delete(&meta.id).await {
                warn!("failed to clear migrated local session {}: {e}", meta.id);
            }
        }
        Ok(())
    }
}
