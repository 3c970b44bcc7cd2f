//! Session store abstraction.

use async_trait::async_trait;

use swarmforge_core::{SessionId, SessionSnapshot};

/// Error type for store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while persisting or loading snapshots.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Storage abstraction for session snapshots.
///
/// Implementations must make a saved snapshot visible to any subsequent
/// `load`, regardless of which thread or process wrote it.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a snapshot (create or overwrite).
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()>;

    /// Load the latest snapshot for a session.
    async fn load(&self, id: SessionId) -> Result<Option<SessionSnapshot>>;

    /// List all persisted snapshots.
    async fn list(&self) -> Result<Vec<SessionSnapshot>>;
}
