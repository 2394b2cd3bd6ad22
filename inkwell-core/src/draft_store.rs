//! Local Draft Store: the single autosave slot.
//!
//! The slot holds one serialized [`DraftRecord`]. Writes replace it outright;
//! reads never fail, a missing or corrupt slot simply means "no draft".

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::config::StorageConfig;
use crate::models::DraftRecord;

/// Errors from writing or clearing the slot. Callers treat these as non-fatal.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize draft: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Storage quota exceeded: draft is {needed} bytes, quota is {quota}")]
    QuotaExceeded { needed: u64, quota: u64 },

    #[error("Draft storage is disabled")]
    Disabled,
}

/// Narrow save/load/clear contract over the autosave slot.
pub trait DraftStore: Send + Sync {
    /// Overwrite the slot with `record`.
    fn save(&self, record: &DraftRecord) -> Result<(), StorageError>;

    /// Read the slot. Empty, corrupt and unparsable slots all yield `None`.
    fn load(&self) -> Option<DraftRecord>;

    /// Empty the slot. Clearing an empty slot is a no-op.
    fn clear(&self) -> Result<(), StorageError>;
}

fn encode(record: &DraftRecord, quota: Option<u64>) -> Result<String, StorageError> {
    let json = serde_json::to_string(record)?;
    if let Some(quota) = quota {
        let needed = json.len() as u64;
        if needed > quota {
            return Err(StorageError::QuotaExceeded { needed, quota });
        }
    }
    Ok(json)
}

fn decode(raw: &str, slot: &str) -> Option<DraftRecord> {
    if raw.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(raw) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(slot = %slot, error = %e, "Discarding unparsable draft");
            None
        }
    }
}

// ============================================================================
// FileDraftStore
// ============================================================================

/// Slot backed by `<dir>/<slot>.json`.
///
/// Saves write a uniquely named sibling temp file and rename it over the slot,
/// so a crash mid-write leaves either the old draft or the new one, and two
/// writers sharing the slot never touch each other's temp file.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    path: PathBuf,
    slot: String,
    quota: Option<u64>,
}

impl FileDraftStore {
    pub fn new(dir: impl AsRef<Path>, slot: impl Into<String>) -> Self {
        let slot = slot.into();
        Self {
            path: dir.as_ref().join(format!("{}.json", slot)),
            slot,
            quota: None,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.resolved_data_dir(), config.slot.clone()).with_quota(config.quota_bytes)
    }

    pub fn with_quota(mut self, quota: Option<u64>) -> Self {
        self.quota = quota;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DraftStore for FileDraftStore {
    fn save(&self, record: &DraftRecord) -> Result<(), StorageError> {
        let json = encode(record, self.quota)?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        tracing::debug!(slot = %self.slot, bytes = json.len(), "Draft written");
        Ok(())
    }

    fn load(&self) -> Option<DraftRecord> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(slot = %self.slot, error = %e, "Failed to read draft slot");
                return None;
            }
        };
        decode(&raw, &self.slot)
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// MemoryDraftStore
// ============================================================================

/// In-process slot holding the serialized record, like a browser's local storage.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    slot: Mutex<Option<String>>,
    quota: Option<u64>,
    disabled: bool,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: u64) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }

    /// A store that refuses every write, as when storage is turned off.
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    /// Put arbitrary text in the slot, bypassing serialization.
    pub fn put_raw(&self, raw: impl Into<String>) {
        *self.lock() = Some(raw.into());
    }

    pub fn raw(&self) -> Option<String> {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> MutexGuard<'_, Option<String>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DraftStore for MemoryDraftStore {
    fn save(&self, record: &DraftRecord) -> Result<(), StorageError> {
        if self.disabled {
            return Err(StorageError::Disabled);
        }
        let json = encode(record, self.quota)?;
        *self.lock() = Some(json);
        Ok(())
    }

    fn load(&self) -> Option<DraftRecord> {
        let raw = self.lock().clone()?;
        decode(&raw, "memory")
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.lock().take();
        Ok(())
    }
}
