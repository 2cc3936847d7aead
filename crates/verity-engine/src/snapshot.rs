//! Durable progress snapshots.
//!
//! A [`Snapshot`] records which items have been collected. It is what a new
//! session resumes from; physics state is never persisted. Snapshots are
//! stored as one JSON file each, named after the level and creation time.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const FILE_PREFIX: &str = "snapshot_";
const FILE_SUFFIX: &str = ".json";

/// Errors raised while reading or writing snapshots.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("snapshot I/O failed for {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode snapshot")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode snapshot {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Progress of a single item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub name: String,
    pub important: bool,
    pub collected: bool,
}

/// Collected-item progress at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub items: Vec<ItemRecord>,
    /// Milliseconds since the Unix epoch.
    pub created_at_ms: u64,
}

impl Snapshot {
    /// Snapshot of `items` stamped with the current wall-clock time.
    pub fn now(items: Vec<ItemRecord>) -> Self {
        let created_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self { items, created_at_ms }
    }

    pub fn collected(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter(|i| i.collected).map(|i| i.name.as_str())
    }

    pub fn to_json(&self) -> Result<String, PersistenceError> {
        serde_json::to_string_pretty(self).map_err(PersistenceError::Encode)
    }

    pub fn from_json(path: &Path, json: &str) -> Result<Self, PersistenceError> {
        serde_json::from_str(json).map_err(|source| PersistenceError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Directory of snapshot files.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(level: &str, created_at_ms: u64) -> String {
        format!("{FILE_PREFIX}{level}_{created_at_ms}{FILE_SUFFIX}")
    }

    /// Writes `snapshot` for `level`, creating the directory if needed.
    pub fn save(&self, level: &str, snapshot: &Snapshot) -> Result<PathBuf, PersistenceError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| PersistenceError::Io { path, source }
        };

        fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;
        let path = self.dir.join(Self::file_name(level, snapshot.created_at_ms));
        let json = snapshot.to_json()?;
        fs::write(&path, json).map_err(io_err(&path))?;
        debug!(path = %path.display(), "snapshot saved");
        Ok(path)
    }

    /// The newest snapshot of `level`, or `None` if there is none. A missing
    /// directory counts as empty.
    pub fn latest(&self, level: &str) -> Result<Option<Snapshot>, PersistenceError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistenceError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let prefix = format!("{FILE_PREFIX}{level}_");
        let mut newest: Option<(u64, PathBuf)> = None;
        for entry in entries {
            let entry = entry.map_err(|source| PersistenceError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let Some(stamp) = name
                .to_str()
                .and_then(|n| n.strip_prefix(&prefix))
                .and_then(|n| n.strip_suffix(FILE_SUFFIX))
            else {
                continue;
            };
            let Ok(stamp) = stamp.parse::<u64>() else {
                warn!(file = ?name, "ignoring snapshot with malformed timestamp");
                continue;
            };
            if newest.as_ref().map_or(true, |(best, _)| stamp > *best) {
                newest = Some((stamp, entry.path()));
            }
        }

        let Some((_, path)) = newest else {
            return Ok(None);
        };
        let json = fs::read_to_string(&path).map_err(|source| PersistenceError::Io {
            path: path.clone(),
            source,
        })?;
        Snapshot::from_json(&path, &json).map(Some)
    }
}
