/*!
 * Router statistics
 */

use serde::Serialize;

use bagrouter_core_routing::{InspectionReason, Lane, RouterState, RoutingOutcome};

/// Process-lifetime counters; not persisted with the snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouterCounters {
    pub scanned: u64,
    pub duplicates: u64,
    pub manual_inspection_missing_gate: u64,
    pub manual_inspection_unknown_gate: u64,
    pub buffered: u64,
    pub enqueued_priority: u64,
    pub enqueued_regular: u64,
    pub delivered: u64,
    pub empty_polls: u64,
    pub snapshot_writes: u64,
    pub snapshot_failures: u64,
    pub scan_log_failures: u64,
}

impl RouterCounters {
    pub(crate) fn record_outcome(&mut self, outcome: &RoutingOutcome) {
        self.scanned += 1;
        match outcome {
            RoutingOutcome::Duplicate => self.duplicates += 1,
            RoutingOutcome::ManualInspection {
                reason: InspectionReason::MissingGate,
            } => self.manual_inspection_missing_gate += 1,
            RoutingOutcome::ManualInspection {
                reason: InspectionReason::UnknownGate,
            } => self.manual_inspection_unknown_gate += 1,
            RoutingOutcome::Buffered => self.buffered += 1,
            RoutingOutcome::Enqueued {
                lane: Lane::Priority,
            } => self.enqueued_priority += 1,
            RoutingOutcome::Enqueued {
                lane: Lane::Regular,
            } => self.enqueued_regular += 1,
        }
    }

    pub(crate) fn record_poll(&mut self, delivered: bool) {
        if delivered {
            self.delivered += 1;
        } else {
            self.empty_polls += 1;
        }
    }
}

/// Counters plus current sizes, taken under the router lock
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    #[serde(flatten)]
    pub counters: RouterCounters,
    pub gates: usize,
    pub queued: usize,
    pub manual_inspection_len: usize,
    pub buffer_len: usize,
    pub seen: usize,
}

/// Current sizes only, for reports that outlive the process counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSizes {
    pub gates: usize,
    pub queued: usize,
    pub manual_inspection_len: usize,
    pub buffer_len: usize,
    pub seen: usize,
}

impl RouterStats {
    pub fn sizes(&self) -> StateSizes {
        StateSizes {
            gates: self.gates,
            queued: self.queued,
            manual_inspection_len: self.manual_inspection_len,
            buffer_len: self.buffer_len,
            seen: self.seen,
        }
    }

    pub(crate) fn capture(counters: &RouterCounters, state: &RouterState) -> Self {
        Self {
            counters: counters.clone(),
            gates: state.gates().len(),
            queued: state.queued_total(),
            manual_inspection_len: state.manual_inspection_len(),
            buffer_len: state.overflow_len(),
            seen: state.seen_count(),
        }
    }

    /// Print counters and current sizes to stdout
    pub fn print(&self) {
        self.print_counters();
        println!();
        self.print_sizes();
    }

    /// Counters cover this process only; they restart at zero with each router
    pub fn print_counters(&self) {
        let c = &self.counters;
        println!("Scanned:            {}", c.scanned);
        println!("  enqueued:         {} priority, {} regular", c.enqueued_priority, c.enqueued_regular);
        println!("  buffered:         {}", c.buffered);
        println!(
            "  manual ins.:      {} missing gate, {} unknown gate",
            c.manual_inspection_missing_gate, c.manual_inspection_unknown_gate
        );
        println!("  duplicates:       {}", c.duplicates);
        println!("Delivered:          {} ({} empty polls)", c.delivered, c.empty_polls);
        println!("Snapshots written:  {} ({} failed)", c.snapshot_writes, c.snapshot_failures);
        println!("Scan log failures:  {}", c.scan_log_failures);
    }

    /// Sizes of the restored or current state
    pub fn print_sizes(&self) {
        println!("Gates:              {}", self.gates);
        println!("Queued:             {}", self.queued);
        println!("Manual inspection:  {}", self.manual_inspection_len);
        println!("Overflow buffer:    {}", self.buffer_len);
        println!("Seen bag IDs:       {}", self.seen);
    }
}
