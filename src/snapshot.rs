/*!
 * Durable router snapshots
 *
 * The full [`RouterState`] is written after every mutating router call,
 * overwriting the previous snapshot. [`FileSnapshotStore`] writes to a
 * temporary file in the destination directory and renames it over the
 * target, so a crash mid-write leaves the previous snapshot intact.
 *
 * # Example
 *
 * ```no_run
 * use bagrouter::snapshot::{FileSnapshotStore, SnapshotStore};
 * use bagrouter_core_routing::RouterState;
 *
 * let mut store = FileSnapshotStore::new("/var/lib/bagrouter/state.json");
 * let state = store.load()?.unwrap_or_default();
 * store.save(&state)?;
 * # Ok::<(), bagrouter::error::SnapshotError>(())
 * ```
 */

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use bagrouter_core_routing::RouterState;

use crate::error::SnapshotError;

/// Current on-disk snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persistence backend for router state.
///
/// Only the router's lock holder calls into the store, so implementations
/// need no internal write serialization.
pub trait SnapshotStore: Send {
    /// Load the last saved state; `Ok(None)` when nothing has been saved yet
    fn load(&mut self) -> Result<Option<RouterState>, SnapshotError>;

    /// Replace the saved state in full
    fn save(&mut self, state: &RouterState) -> Result<(), SnapshotError>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

#[derive(Serialize)]
struct SnapshotEnvelopeRef<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    state: &'a RouterState,
}

#[derive(Deserialize)]
struct SnapshotEnvelope {
    version: u32,
    #[allow(dead_code)]
    saved_at: DateTime<Utc>,
    state: RouterState,
}

/// Snapshot store backed by a single JSON file
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&mut self) -> Result<Option<RouterState>, SnapshotError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SnapshotError::io(&self.path, e)),
        };

        let envelope: SnapshotEnvelope =
            serde_json::from_slice(&bytes).map_err(|source| SnapshotError::Decode {
                path: self.path.clone(),
                source,
            })?;

        if envelope.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                expected: SNAPSHOT_VERSION,
                found: envelope.version,
            });
        }

        Ok(Some(envelope.state))
    }

    fn save(&mut self, state: &RouterState) -> Result<(), SnapshotError> {
        let dir = self.parent_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| SnapshotError::io(&dir, e))?;
        }

        let envelope = SnapshotEnvelopeRef {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            state,
        };
        let json = serde_json::to_vec(&envelope).map_err(SnapshotError::Encode)?;

        // Same directory as the target so the rename stays on one filesystem
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| SnapshotError::io(&dir, e))?;
        let write = |tmp: &mut NamedTempFile| -> std::io::Result<()> {
            tmp.write_all(&json)?;
            tmp.flush()?;
            tmp.as_file().sync_all()
        };
        write(&mut tmp).map_err(|e| SnapshotError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| SnapshotError::io(&self.path, e.error))?;

        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[derive(Debug, Default)]
struct MemorySlot {
    state: Option<RouterState>,
    saves: u64,
    fail_next: u32,
}

/// In-memory snapshot store.
///
/// Clones share the same slot, so a test can keep a handle, hand a clone to a
/// router, and later inspect or reuse what was saved.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    slot: Arc<Mutex<MemorySlot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a saved state
    pub fn with_state(state: RouterState) -> Self {
        let store = Self::new();
        store.lock().state = Some(state);
        store
    }

    /// Make the next `n` saves fail
    pub fn fail_next_saves(&self, n: u32) {
        self.lock().fail_next = n;
    }

    /// Number of successful saves
    pub fn save_count(&self) -> u64 {
        self.lock().saves
    }

    /// Last successfully saved state
    pub fn saved_state(&self) -> Option<RouterState> {
        self.lock().state.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemorySlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&mut self) -> Result<Option<RouterState>, SnapshotError> {
        Ok(self.lock().state.clone())
    }

    fn save(&mut self, state: &RouterState) -> Result<(), SnapshotError> {
        let mut slot = self.lock();
        if slot.fail_next > 0 {
            slot.fail_next -= 1;
            return Err(SnapshotError::Injected("save rejected".to_string()));
        }
        slot.state = Some(state.clone());
        slot.saves += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
