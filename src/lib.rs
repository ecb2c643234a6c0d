/*!
 * bagrouter - gate routing engine for scanned bags
 *
 * Routes bags arriving from an upstream scanner to per-gate delivery queues:
 * - Priority lane served strictly before the regular lane, FIFO within each
 * - Duplicate rejection across the router's whole lifetime
 * - Manual inspection for missing or disallowed gate tags
 * - Overflow buffering when a gate reaches capacity
 * - Crash-safe snapshot after every mutation
 * - One outcome-tagged scan record per scan for the reporting service
 *
 * The routing decision itself lives in `bagrouter-core-routing`; this crate
 * adds locking, persistence, scan records, configuration and the CLI.
 */

pub mod batch;
pub mod config;
pub mod error;
pub mod logging;
pub mod router;
pub mod scan_log;
pub mod snapshot;
pub mod stats;

// Re-export commonly used types
pub use bagrouter_core_routing::{
    BagId, GateId, InspectionReason, Lane, OutcomeKind, OverflowEntry, RouterState, RoutingOutcome,
    RoutingPolicy,
};
pub use config::{LogLevel, RouterConfig};
pub use error::{Committed, Result, RouterError};
pub use router::{Router, RouterBuilder};
pub use scan_log::{read_scan_log, JsonLinesScanLog, MemoryScanLog, ScanRecord, ScanRecordSink};
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore};
pub use stats::{RouterStats, StateSizes};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
