use model::pagination::cursor::PipelineCursor;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint store error: {0}")]
    Store(#[from] sled::Error),

    #[error("corrupt checkpoint: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Persists the last committed cursor of each named pipeline.
///
/// Cursors are stored as JSON so record values keep their original shape
/// when loaded back.
pub struct CheckpointStore {
    db: sled::Db,
}

impl CheckpointStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    #[inline]
    fn cursor_key(pipeline: &str) -> String {
        format!("cursor:{pipeline}")
    }

    pub fn save(&self, pipeline: &str, cursor: &PipelineCursor) -> Result<(), CheckpointError> {
        let bytes = serde_json::to_vec(cursor)?;
        self.db.insert(Self::cursor_key(pipeline), bytes)?;
        self.db.flush()?;
        debug!(pipeline, position = cursor.position, "Checkpoint saved");
        Ok(())
    }

    pub fn load(&self, pipeline: &str) -> Result<Option<PipelineCursor>, CheckpointError> {
        match self.db.get(Self::cursor_key(pipeline))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Removes a pipeline's checkpoint. Returns whether one existed.
    pub fn clear(&self, pipeline: &str) -> Result<bool, CheckpointError> {
        let removed = self.db.remove(Self::cursor_key(pipeline))?;
        self.db.flush()?;
        debug!(pipeline, existed = removed.is_some(), "Checkpoint cleared");
        Ok(removed.is_some())
    }

    /// All stored checkpoints, ordered by pipeline name.
    pub fn list(&self) -> Result<Vec<(String, PipelineCursor)>, CheckpointError> {
        let mut entries = Vec::new();
        for item in self.db.scan_prefix("cursor:") {
            let (key, value) = item?;
            let name = String::from_utf8_lossy(&key["cursor:".len()..]).into_owned();
            entries.push((name, serde_json::from_slice(&value)?));
        }
        Ok(entries)
    }
}
