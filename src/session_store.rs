//! Durable session persistence.
//!
//! Sessions are single JSON files named by session id. Saves are atomic:
//! serialize into a temp file in the target directory, then rename over
//! the destination, so a crash mid-save leaves either the old file or the
//! new one, never a torn write. Loads re-validate the session's structural
//! invariants; a file that parses but fails validation is reported as
//! corrupt rather than handed to callers.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::ProcessingSession;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No saved session with id {0}")]
    NotFound(Uuid),

    #[error("Saved session {id} is corrupt: {reason}")]
    CorruptData { id: Uuid, reason: String },

    #[error("Session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Listing entry for a saved session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub session_id: Uuid,
    pub path: PathBuf,
    pub modified_at: Option<DateTime<Utc>>,
}

/// File-backed store rooted at one directory.
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    /// Open a store at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Store at the default application sessions directory.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(crate::config::sessions_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Atomically write the session to disk, overwriting any prior save.
    pub fn save(&self, session: &ProcessingSession) -> Result<SessionHandle, StoreError> {
        let json = serde_json::to_vec_pretty(session)?;
        let path = self.path_for(session.id);

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&json)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(session_id = %session.id, path = %path.display(), bytes = json.len(), "session saved");
        Ok(SessionHandle {
            session_id: session.id,
            path,
            modified_at: Some(Utc::now()),
        })
    }

    /// Load and validate a saved session.
    pub fn load(&self, id: Uuid) -> Result<ProcessingSession, StoreError> {
        let path = self.path_for(id);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id));
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        let session: ProcessingSession =
            serde_json::from_slice(&data).map_err(|e| StoreError::CorruptData {
                id,
                reason: e.to_string(),
            })?;
        session.validate().map_err(|e| StoreError::CorruptData {
            id,
            reason: e.to_string(),
        })?;

        info!(session_id = %id, documents = session.documents.len(), "session loaded");
        Ok(session)
    }

    /// All saved sessions, newest first. Files that are not
    /// `<uuid>.json` are ignored.
    pub fn list(&self) -> Result<Vec<SessionHandle>, StoreError> {
        let mut handles = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(session_id) = stem.parse::<Uuid>() else {
                continue;
            };
            let modified_at = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from);
            handles.push(SessionHandle {
                session_id,
                path,
                modified_at,
            });
        }
        handles.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        Ok(handles)
    }

    /// Delete a saved session file.
    pub fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(session_id = %id, "session deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(id)),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
