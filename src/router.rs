/*!
 * Thread-safe bag router
 *
 * [`Router`] wraps the core [`RouterState`] in a single exclusive lock. Every
 * public operation, read or write, holds the lock for its whole duration,
 * including the snapshot write and scan-record emission, so operations from
 * different threads never interleave.
 *
 * # Example
 *
 * ```
 * use bagrouter::Router;
 * use bagrouter_core_routing::{Lane, RoutingOutcome, RoutingPolicy};
 *
 * let router = Router::builder()
 *     .policy(RoutingPolicy::new(2).with_allowed_gates(["G1", "G2", "G3"]))
 *     .build()?;
 *
 * assert_eq!(router.scan("BAG1", Some("G1"), false)?, RoutingOutcome::Enqueued { lane: Lane::Regular });
 * assert_eq!(router.scan("BAG2", Some("G1"), true)?, RoutingOutcome::Enqueued { lane: Lane::Priority });
 * assert_eq!(router.scan("BAG3", Some("G1"), false)?, RoutingOutcome::Buffered);
 * assert_eq!(router.scan("BAG1", Some("G1"), false)?, RoutingOutcome::Duplicate);
 * assert_eq!(router.next_bag("G1")?.unwrap().as_str(), "BAG2");
 * # Ok::<(), bagrouter::RouterError>(())
 * ```
 */

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, instrument, warn};

use bagrouter_core_routing::{BagId, GateId, OverflowEntry, RouterState, RoutingOutcome, RoutingPolicy};

use crate::config::RouterConfig;
use crate::error::{Committed, Result, RouterError, SnapshotError};
use crate::scan_log::{JsonLinesScanLog, ScanRecord, ScanRecordSink};
use crate::snapshot::{FileSnapshotStore, SnapshotStore};
use crate::stats::{RouterCounters, RouterStats};

struct Inner {
    state: RouterState,
    counters: RouterCounters,
    next_sequence: u64,
    store: Option<Box<dyn SnapshotStore>>,
    sink: Option<Box<dyn ScanRecordSink>>,
}

impl Inner {
    /// Write the full state to the store, if one is configured
    fn persist(&mut self) -> std::result::Result<(), SnapshotError> {
        let Some(store) = self.store.as_mut() else {
            return Ok(());
        };

        match store.save(&self.state) {
            Ok(()) => {
                self.counters.snapshot_writes += 1;
                Ok(())
            }
            Err(e) => {
                self.counters.snapshot_failures += 1;
                error!(store = %store.describe(), error = %e, "snapshot write failed");
                Err(e)
            }
        }
    }

    fn emit_record(
        &mut self,
        location: Option<&str>,
        bag_id: &str,
        gate: Option<&str>,
        priority: bool,
        outcome: &RoutingOutcome,
    ) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let Some(sink) = self.sink.as_mut() else {
            return;
        };

        let record = ScanRecord::new(sequence, bag_id, gate, priority, location, outcome);
        if let Err(e) = sink.emit(&record) {
            self.counters.scan_log_failures += 1;
            warn!(bag_id, sequence, error = %e, "failed to emit scan record");
        }
    }
}

/// Routes scanned bags to gate queues and serves them to gate consumers.
///
/// Share between threads with `Arc<Router>`.
pub struct Router {
    policy: RoutingPolicy,
    location: Option<String>,
    inner: Mutex<Inner>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("policy", &self.policy)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    /// Create a router, loading any existing snapshot from `store`.
    ///
    /// An unreadable snapshot is a hard error; use
    /// [`RouterBuilder::recover_empty_on_corrupt`] to start empty instead.
    pub fn new(
        policy: RoutingPolicy,
        store: Option<Box<dyn SnapshotStore>>,
        sink: Option<Box<dyn ScanRecordSink>>,
    ) -> Result<Self> {
        RouterBuilder {
            policy,
            store,
            sink,
            ..RouterBuilder::default()
        }
        .build()
    }

    /// Build a router from configuration: file snapshot store and JSON Lines
    /// scan log when their paths are set
    pub fn from_config(config: &RouterConfig) -> Result<Self> {
        config.validate()?;

        let mut builder = Router::builder()
            .policy(config.policy())
            .recover_empty_on_corrupt(config.recover_empty_on_corrupt);

        if let Some(ref path) = config.state_file {
            builder = builder.snapshot_store(FileSnapshotStore::new(path));
        }
        if let Some(ref path) = config.scan_log {
            builder = builder.scan_sink(JsonLinesScanLog::open(path)?);
        }
        if let Some(ref location) = config.scan_location {
            builder = builder.location(location.clone());
        }

        builder.build()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    /// Route a freshly scanned bag.
    ///
    /// `gate` of `None` or `Some("")` means the bag carried no gate tag.
    /// Every mutating outcome is persisted before returning; a duplicate
    /// changes nothing and writes nothing. One scan record is emitted per
    /// call regardless of outcome.
    #[instrument(level = "debug", skip(self))]
    pub fn scan(&self, bag_id: &str, gate: Option<&str>, priority: bool) -> Result<RoutingOutcome> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let outcome = inner.state.route(&self.policy, bag_id, gate, priority);
        inner.counters.record_outcome(&outcome);
        debug!(%outcome, "routing decision");

        inner.emit_record(self.location.as_deref(), bag_id, gate, priority, &outcome);

        if outcome.changed_state() {
            inner
                .persist()
                .map_err(|source| RouterError::PersistenceFailed {
                    committed: Committed::Scan(outcome),
                    source,
                })?;
        }

        Ok(outcome)
    }

    /// Remove and return the next bag for a gate, priority lane first.
    ///
    /// The snapshot is written after every call, including polls that
    /// return nothing.
    #[instrument(level = "debug", skip(self))]
    pub fn next_bag(&self, gate: &str) -> Result<Option<BagId>> {
        let mut inner = self.lock();

        let bag = inner.state.dequeue(gate);
        inner.counters.record_poll(bag.is_some());
        debug!(bag = ?bag.as_ref().map(BagId::as_str), "dequeue");

        if let Err(source) = inner.persist() {
            return Err(RouterError::PersistenceFailed {
                committed: Committed::Dequeue(bag),
                source,
            });
        }

        Ok(bag)
    }

    /// Combined priority + regular count; 0 for an unknown gate
    pub fn count_bags(&self, gate: &str) -> usize {
        self.lock().state.count(gate)
    }

    /// Pending bags for a gate, priority lane then regular lane
    pub fn view_bags(&self, gate: &str) -> Vec<BagId> {
        self.lock().state.bags(gate)
    }

    pub fn view_manual_inspection(&self) -> Vec<BagId> {
        self.lock().state.manual_inspection()
    }

    pub fn view_buffer(&self) -> Vec<OverflowEntry> {
        self.lock().state.overflow()
    }

    /// Known gates in sorted order
    pub fn gates(&self) -> Vec<GateId> {
        self.lock().state.gates()
    }

    /// Whether a bag ID has ever been scanned
    pub fn has_seen(&self, bag_id: &str) -> bool {
        self.lock().state.has_seen(bag_id)
    }

    pub fn stats(&self) -> RouterStats {
        let inner = self.lock();
        RouterStats::capture(&inner.counters, &inner.state)
    }

    /// Clone of the full routing state
    pub fn state_snapshot(&self) -> RouterState {
        self.lock().state.clone()
    }
}

/// Builder for [`Router`]
#[derive(Default)]
pub struct RouterBuilder {
    policy: RoutingPolicy,
    store: Option<Box<dyn SnapshotStore>>,
    sink: Option<Box<dyn ScanRecordSink>>,
    location: Option<String>,
    recover_empty_on_corrupt: bool,
}

impl RouterBuilder {
    pub fn policy(mut self, policy: RoutingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn snapshot_store(mut self, store: impl SnapshotStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn scan_sink(mut self, sink: impl ScanRecordSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Scanner location stamped on scan records
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Start from empty state instead of failing when the snapshot is unreadable
    pub fn recover_empty_on_corrupt(mut self, recover: bool) -> Self {
        self.recover_empty_on_corrupt = recover;
        self
    }

    pub fn build(mut self) -> Result<Router> {
        let state = match self.store.as_mut() {
            None => {
                debug!("no snapshot store configured, state is memory-only");
                RouterState::new()
            }
            Some(store) => match store.load() {
                Ok(Some(state)) => {
                    info!(
                        store = %store.describe(),
                        gates = state.gates().len(),
                        queued = state.queued_total(),
                        manual_inspection = state.manual_inspection_len(),
                        buffered = state.overflow_len(),
                        seen = state.seen_count(),
                        "restored router state from snapshot"
                    );
                    state
                }
                Ok(None) => {
                    info!(store = %store.describe(), "no snapshot found, starting empty");
                    RouterState::new()
                }
                Err(e) if self.recover_empty_on_corrupt => {
                    warn!(
                        store = %store.describe(),
                        error = %e,
                        "snapshot unreadable, starting from empty state by operator request"
                    );
                    RouterState::new()
                }
                Err(e) => return Err(RouterError::SnapshotLoad(e)),
            },
        };

        Ok(Router {
            policy: self.policy,
            location: self.location,
            inner: Mutex::new(Inner {
                state,
                counters: RouterCounters::default(),
                next_sequence: 0,
                store: self.store,
                sink: self.sink,
            }),
        })
    }
}
