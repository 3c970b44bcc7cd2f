//! In-memory store for tests and single-process runs.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use swarmforge_core::{SessionId, SessionSnapshot};

use super::{Result, SessionStore};

/// In-memory snapshot store. Background mode with this store is a detached
/// task within the same process; use [`crate::JsonSessionStore`] when a
/// second process needs to poll.
#[derive(Default)]
pub struct MemorySessionStore {
    snapshots: Arc<Mutex<HashMap<SessionId, SessionSnapshot>>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        self.snapshots
            .lock()
            .await
            .insert(snapshot.session_id, snapshot.clone());
        Ok(())
    }

    async fn load(&self, id: SessionId) -> Result<Option<SessionSnapshot>> {
        Ok(self.snapshots.lock().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<SessionSnapshot>> {
        let mut snapshots: Vec<SessionSnapshot> =
            self.snapshots.lock().await.values().cloned().collect();
        snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmforge_core::{ExecutionSession, ValueMap};

    #[tokio::test]
    async fn save_load_list() {
        let store = MemorySessionStore::new();
        let snap = ExecutionSession::new("research_only", "survey parsers", ValueMap::new()).snapshot();

        store.save(&snap).await.unwrap();
        assert!(store.load(snap.session_id).await.unwrap().is_some());
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(store.load(SessionId::new()).await.unwrap().is_none());
    }
}
