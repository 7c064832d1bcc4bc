//! Durable snapshot persistence for the activity tracker.
//!
//! The snapshot is the sole durable representation: a gzip stream over a
//! JSON object with exactly three fields (`active_users`,
//! `user_to_time_ranges`, `now`) at one fixed, unversioned path. In-memory
//! state stays authoritative while the process runs; the file is read once
//! at cold start.
//!
//! Writes go to a temporary sibling path and are renamed into place, so a
//! crash mid-write leaves the previous snapshot intact rather than a
//! truncated gzip stream.

use crate::error::{Result, VigilError};
use crate::tracker::intervals::{Interval, UserId};
use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Point-in-time serialization of the tracker's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Ids whose most recent interval was open at write time.
    pub active_users: Vec<UserId>,
    /// Every user's full interval history.
    pub user_to_time_ranges: HashMap<UserId, Vec<Interval>>,
    /// When the snapshot was written. Drives gap inference on reload.
    pub now: DateTime<Utc>,
}

/// Reads and writes [`Snapshot`]s at a fixed storage path.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Create a store backed by `path`. Nothing is touched until the first
    /// save or load.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The storage path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `snapshot`, replacing any previous one atomically.
    ///
    /// # Errors
    ///
    /// I/O and encoding failures propagate unmasked; the system favors a
    /// visible failure over silent data loss.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec(snapshot)
            .map_err(|e| VigilError::Serialize(e.to_string()))?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        let compressed = encoder.finish()?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, compressed)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Load the stored snapshot.
    ///
    /// Returns `Ok(None)` when no snapshot exists yet — that is a cold
    /// start, not an error.
    ///
    /// # Errors
    ///
    /// [`VigilError::CorruptSnapshot`] when the file exists but its gzip or
    /// JSON content cannot be decoded, [`VigilError::Io`] for other read
    /// failures.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        let compressed = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut json = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut json)
            .map_err(|e| VigilError::CorruptSnapshot(format!("gzip: {e}")))?;
        let snapshot = serde_json::from_slice(&json)
            .map_err(|e| VigilError::CorruptSnapshot(format!("json: {e}")))?;
        Ok(Some(snapshot))
    }
}
