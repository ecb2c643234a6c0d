/*!
 * Error types for bagrouter
 *
 * Routing decisions never fail: duplicates, missing or unknown gates, full
 * gates and empty polls are all returned as values. Errors only arise at the
 * persistence boundary (snapshot store, scan-record log) and while loading
 * configuration.
 */

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use bagrouter_core_routing::{BagId, RoutingOutcome};

pub type Result<T> = std::result::Result<T, RouterError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;
pub const EXIT_PERSISTENCE: i32 = 3;

/// Failures reading or writing the durable snapshot
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    /// The snapshot exists but cannot be read back (empty, truncated, corrupt)
    #[error("unreadable snapshot at {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { expected: u32, found: u32 },

    /// Raised by test stores to exercise the write-failure path
    #[error("injected snapshot failure: {0}")]
    Injected(String),
}

impl SnapshotError {
    pub(crate) fn io<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        SnapshotError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures emitting scan records
#[derive(Error, Debug)]
pub enum ScanLogError {
    #[error("scan log I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode scan record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Effect already applied to in-memory state when a snapshot write failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Committed {
    /// A scan was routed
    Scan(RoutingOutcome),

    /// A dequeue ran; the bag (if any) has left the gate queue
    Dequeue(Option<BagId>),
}

/// Top-level router error
#[derive(Error, Debug)]
pub enum RouterError {
    /// The persisted snapshot could not be loaded at startup
    #[error("failed to load router snapshot: {0}")]
    SnapshotLoad(#[source] SnapshotError),

    /// The in-memory mutation succeeded but was not persisted.
    ///
    /// State is not rolled back; `committed` describes what already happened.
    #[error("router state changed but snapshot write failed: {source}")]
    PersistenceFailed {
        committed: Committed,
        #[source]
        source: SnapshotError,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The scan-record log could not be opened
    #[error("scan log error: {0}")]
    ScanLog(#[from] ScanLogError),

    #[error("{0}")]
    Other(String),
}

impl RouterError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            RouterError::PersistenceFailed { .. } => EXIT_PERSISTENCE,
            RouterError::SnapshotLoad(_)
            | RouterError::Config(_)
            | RouterError::ScanLog(_)
            | RouterError::Other(_) => EXIT_FATAL,
        }
    }

    /// The effect that was committed in memory, if this is a persistence failure
    pub fn committed(&self) -> Option<&Committed> {
        match self {
            RouterError::PersistenceFailed { committed, .. } => Some(committed),
            _ => None,
        }
    }
}
