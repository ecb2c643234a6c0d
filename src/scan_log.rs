/*!
 * Scan records for the reporting service
 *
 * Every call to `Router::scan` emits exactly one [`ScanRecord`], including
 * duplicates, manual-inspection and buffered bags, tagged with the routing
 * outcome. Records are emitted while the router lock is held, so `sequence`
 * follows the order in which scans were applied.
 *
 * # Example
 *
 * ```no_run
 * use bagrouter::scan_log::{JsonLinesScanLog, ScanRecord, ScanRecordSink};
 * use bagrouter_core_routing::{Lane, RoutingOutcome};
 * use std::path::Path;
 *
 * let mut log = JsonLinesScanLog::open(Path::new("scans.jsonl")).unwrap();
 * let outcome = RoutingOutcome::Enqueued { lane: Lane::Regular };
 * let record = ScanRecord::new(0, "BAG1", Some("G1"), false, Some("T1-SORTER"), &outcome);
 * log.emit(&record).unwrap();
 * ```
 */

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bagrouter_core_routing::{InspectionReason, Lane, OutcomeKind, RoutingOutcome};

use crate::error::ScanLogError;

/// One accepted scan, as seen by the reporting service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub timestamp: DateTime<Utc>,

    /// Position in the router's scan order for this process
    pub sequence: u64,

    pub bag_id: String,

    /// Destination tag as scanned; `None` when the tag was missing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<String>,

    pub priority: bool,

    /// Scanner location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    pub outcome: OutcomeKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane: Option<Lane>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<InspectionReason>,
}

impl ScanRecord {
    /// Build a record stamped with the current time
    pub fn new(
        sequence: u64,
        bag_id: &str,
        gate: Option<&str>,
        priority: bool,
        location: Option<&str>,
        outcome: &RoutingOutcome,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            sequence,
            bag_id: bag_id.to_string(),
            gate: gate.filter(|g| !g.is_empty()).map(str::to_string),
            priority,
            location: location.map(str::to_string),
            outcome: outcome.kind(),
            lane: outcome.lane(),
            reason: outcome.reason(),
        }
    }
}

/// Destination for scan records
pub trait ScanRecordSink: Send {
    fn emit(&mut self, record: &ScanRecord) -> Result<(), ScanLogError>;
}

/// Append-only JSON Lines scan log.
///
/// Each record is written with a single unbuffered `write_all`, so a record
/// reported as failed is never flushed later by a subsequent emit.
#[derive(Debug)]
pub struct JsonLinesScanLog<W = File> {
    path: PathBuf,
    writer: W,
}

impl JsonLinesScanLog {
    /// Open or create the log in append mode
    pub fn open(path: &Path) -> Result<Self, ScanLogError> {
        let io_err = |source| ScanLogError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;

        Ok(Self::from_writer(path, file))
    }
}

impl<W: Write> JsonLinesScanLog<W> {
    /// Log to an arbitrary writer; `path` is only used in error messages
    pub fn from_writer(path: impl Into<PathBuf>, writer: W) -> Self {
        Self {
            path: path.into(),
            writer,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ScanRecordSink for JsonLinesScanLog<W> {
    fn emit(&mut self, record: &ScanRecord) -> Result<(), ScanLogError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.writer
            .write_all(&line)
            .map_err(|source| ScanLogError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

/// Read a JSON Lines scan log back into records
pub fn read_scan_log(path: &Path) -> Result<Vec<ScanRecord>, ScanLogError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ScanLogError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(ScanLogError::from))
        .collect()
}

/// In-memory sink; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemoryScanLog {
    records: Arc<Mutex<Vec<ScanRecord>>>,
}

impl MemoryScanLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every record emitted so far
    pub fn records(&self) -> Vec<ScanRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ScanRecordSink for MemoryScanLog {
    fn emit(&mut self, record: &ScanRecord) -> Result<(), ScanLogError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}
