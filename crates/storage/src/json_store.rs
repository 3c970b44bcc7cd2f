//! JSON file store implementation.
//!
//! One file per session under `<project_dir>/.swarmforge/sessions/`,
//! rewritten in full on every save. A separate process polling the same
//! directory sees the identical snapshot the scheduler last published.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use swarmforge_core::{SessionId, SessionSnapshot};

use super::{Result, SessionStore};

/// File-based JSON snapshot store.
pub struct JsonSessionStore {
    dir: PathBuf,
}

impl JsonSessionStore {
    /// Create the store, ensuring `<project_dir>/.swarmforge/sessions/` exists.
    pub async fn new(project_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = project_dir.as_ref().join(".swarmforge").join("sessions");
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn session_path(&self, id: SessionId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait::async_trait]
impl SessionStore for JsonSessionStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let path = self.session_path(snapshot.session_id);
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&path, json.as_bytes()).await?;
        debug!(session_id = %snapshot.session_id, status = %snapshot.overall_status, "persisted snapshot");
        Ok(())
    }

    async fn load(&self, id: SessionId) -> Result<Option<SessionSnapshot>> {
        read_json(&self.session_path(id)).await
    }

    async fn list(&self) -> Result<Vec<SessionSnapshot>> {
        let mut snapshots = Vec::new();
        let mut rd = fs::read_dir(&self.dir).await?;
        while let Some(entry) = rd.next_entry().await? {
            if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            if let Ok(Some(snapshot)) = read_json(&entry.path()).await {
                snapshots.push(snapshot);
            }
        }
        snapshots.sort_by(|a: &SessionSnapshot, b| a.created_at.cmp(&b.created_at));
        Ok(snapshots)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
