//! Router state and the routing decision
//!
//! [`RouterState`] is the aggregate that gets persisted as a snapshot: gate
//! queues, the manual-inspection list, the overflow buffer and the set of
//! every bag ID ever scanned. It holds no lock and performs no I/O; callers
//! provide mutual exclusion and persistence.
//!
//! # Example
//!
//! ```
//! use bagrouter_core_routing::{Lane, RouterState, RoutingOutcome, RoutingPolicy};
//!
//! let policy = RoutingPolicy::new(2).with_allowed_gates(["G1", "G2", "G3"]);
//! let mut state = RouterState::new();
//!
//! assert_eq!(
//!     state.route(&policy, "BAG1", Some("G1"), false),
//!     RoutingOutcome::Enqueued { lane: Lane::Regular }
//! );
//! assert_eq!(
//!     state.route(&policy, "BAG2", Some("G1"), true),
//!     RoutingOutcome::Enqueued { lane: Lane::Priority }
//! );
//! assert_eq!(state.route(&policy, "BAG3", Some("G1"), false), RoutingOutcome::Buffered);
//! assert_eq!(state.route(&policy, "BAG1", Some("G1"), false), RoutingOutcome::Duplicate);
//!
//! assert_eq!(state.dequeue("G1").map(|b| b.into_inner()), Some("BAG2".to_string()));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::trace;

use crate::ids::{BagId, GateId};
use crate::lane::{GateQueue, Lane};
use crate::outcome::{InspectionReason, RoutingOutcome};
use crate::policy::RoutingPolicy;

/// A bag held back because its gate was at capacity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverflowEntry {
    pub bag_id: BagId,
    pub gate: GateId,
    pub priority: bool,
}

/// Complete routing state: the unit of persistence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterState {
    #[serde(default)]
    gate_queues: BTreeMap<GateId, GateQueue>,

    #[serde(default)]
    manual_inspection: VecDeque<BagId>,

    #[serde(default)]
    overflow: VecDeque<OverflowEntry>,

    /// Grows monotonically; delivered bags stay here
    #[serde(default)]
    seen: BTreeSet<BagId>,
}

impl RouterState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a scanned bag to exactly one destination.
    ///
    /// Checks run in a fixed order and the first match wins: duplicate,
    /// missing gate, unknown gate, overloaded gate, enqueue. Every non-duplicate
    /// scan records the bag ID as seen.
    pub fn route(
        &mut self,
        policy: &RoutingPolicy,
        bag_id: &str,
        gate: Option<&str>,
        priority: bool,
    ) -> RoutingOutcome {
        if self.seen.contains(bag_id) {
            return RoutingOutcome::Duplicate;
        }
        let bag = BagId::new(bag_id);
        self.seen.insert(bag.clone());

        let Some(gate) = GateId::from_tag(gate) else {
            self.manual_inspection.push_back(bag);
            return RoutingOutcome::ManualInspection {
                reason: InspectionReason::MissingGate,
            };
        };

        if !policy.allows(gate.as_str()) {
            self.manual_inspection.push_back(bag);
            return RoutingOutcome::ManualInspection {
                reason: InspectionReason::UnknownGate,
            };
        }

        let queue = self.gate_queues.entry(gate.clone()).or_default();

        if queue.len() >= policy.max_queue_length() {
            trace!(gate = %gate, depth = queue.len(), "gate at capacity");
            self.overflow.push_back(OverflowEntry {
                bag_id: bag,
                gate,
                priority,
            });
            return RoutingOutcome::Buffered;
        }

        let lane = Lane::for_priority(priority);
        queue.push(lane, bag);
        RoutingOutcome::Enqueued { lane }
    }

    /// Remove and return the next bag for a gate, priority lane first
    pub fn dequeue(&mut self, gate: &str) -> Option<BagId> {
        self.gate_queues
            .get_mut(gate)
            .and_then(GateQueue::pop_next)
            .map(|(_, bag)| bag)
    }

    /// Combined lane length for a gate; 0 for an unknown gate
    pub fn count(&self, gate: &str) -> usize {
        self.gate_queues.get(gate).map_or(0, GateQueue::len)
    }

    /// Pending bags for a gate in delivery order; empty for an unknown gate
    pub fn bags(&self, gate: &str) -> Vec<BagId> {
        self.gate_queues
            .get(gate)
            .map(GateQueue::bags)
            .unwrap_or_default()
    }

    pub fn gate_queue(&self, gate: &str) -> Option<&GateQueue> {
        self.gate_queues.get(gate)
    }

    /// Known gates in sorted order
    pub fn gates(&self) -> Vec<GateId> {
        self.gate_queues.keys().cloned().collect()
    }

    /// Copy of the manual-inspection list in arrival order
    pub fn manual_inspection(&self) -> Vec<BagId> {
        self.manual_inspection.iter().cloned().collect()
    }

    /// Copy of the overflow buffer in arrival order
    pub fn overflow(&self) -> Vec<OverflowEntry> {
        self.overflow.iter().cloned().collect()
    }

    pub fn has_seen(&self, bag_id: &str) -> bool {
        self.seen.contains(bag_id)
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Number of bags waiting across all gate queues
    pub fn queued_total(&self) -> usize {
        self.gate_queues.values().map(GateQueue::len).sum()
    }

    pub fn manual_inspection_len(&self) -> usize {
        self.manual_inspection.len()
    }

    pub fn overflow_len(&self) -> usize {
        self.overflow.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_policy() -> RoutingPolicy {
        RoutingPolicy::new(2).with_allowed_gates(["G1", "G2", "G3"])
    }

    #[test]
    fn test_reference_scenario() {
        let policy = scenario_policy();
        let mut state = RouterState::new();

        assert_eq!(
            state.route(&policy, "BAG1", Some("G1"), false),
            RoutingOutcome::Enqueued {
                lane: Lane::Regular
            }
        );
        assert_eq!(
            state.route(&policy, "BAG2", Some("G1"), true),
            RoutingOutcome::Enqueued {
                lane: Lane::Priority
            }
        );
        assert_eq!(
            state.route(&policy, "BAG3", Some("G1"), false),
            RoutingOutcome::Buffered
        );
        assert_eq!(
            state.route(&policy, "BAG1", Some("G1"), false),
            RoutingOutcome::Duplicate
        );
        assert_eq!(state.dequeue("G1"), Some(BagId::new("BAG2")));

        assert!(state.manual_inspection().is_empty());
        assert_eq!(
            state.overflow(),
            vec![OverflowEntry {
                bag_id: BagId::new("BAG3"),
                gate: GateId::new("G1"),
                priority: false,
            }]
        );
    }

    #[test]
    fn test_duplicate_regardless_of_gate_or_priority() {
        let policy = RoutingPolicy::default();
        let mut state = RouterState::new();

        state.route(&policy, "BAG1", Some("G1"), false);
        let before = state.clone();

        assert_eq!(
            state.route(&policy, "BAG1", Some("G2"), true),
            RoutingOutcome::Duplicate
        );
        assert_eq!(state.route(&policy, "BAG1", None, false), RoutingOutcome::Duplicate);
        assert_eq!(state, before);
    }

    #[test]
    fn test_duplicate_after_manual_inspection() {
        let policy = RoutingPolicy::default();
        let mut state = RouterState::new();

        assert!(matches!(
            state.route(&policy, "BAG1", None, false),
            RoutingOutcome::ManualInspection { .. }
        ));
        assert_eq!(
            state.route(&policy, "BAG1", Some("G1"), false),
            RoutingOutcome::Duplicate
        );
        assert_eq!(state.count("G1"), 0);
    }

    #[test]
    fn test_duplicate_after_delivery() {
        let policy = RoutingPolicy::default();
        let mut state = RouterState::new();

        state.route(&policy, "BAG1", Some("G1"), false);
        assert_eq!(state.dequeue("G1"), Some(BagId::new("BAG1")));
        assert!(state.has_seen("BAG1"));
        assert_eq!(
            state.route(&policy, "BAG1", Some("G1"), false),
            RoutingOutcome::Duplicate
        );
    }

    #[test]
    fn test_missing_gate_never_creates_queue() {
        let policy = RoutingPolicy::default();
        let mut state = RouterState::new();

        for tag in [None, Some("")] {
            let bag = format!("BAG-{}", state.seen_count());
            assert_eq!(
                state.route(&policy, &bag, tag, true),
                RoutingOutcome::ManualInspection {
                    reason: InspectionReason::MissingGate
                }
            );
        }
        assert!(state.gates().is_empty());
        assert_eq!(state.manual_inspection_len(), 2);
    }

    #[test]
    fn test_unknown_gate() {
        let policy = RoutingPolicy::new(10).with_allowed_gates(["G1", "G2"]);
        let mut state = RouterState::new();

        assert_eq!(
            state.route(&policy, "BAG1", Some("G9"), false),
            RoutingOutcome::ManualInspection {
                reason: InspectionReason::UnknownGate
            }
        );
        assert!(state.gates().is_empty());
        assert_eq!(state.manual_inspection(), vec![BagId::new("BAG1")]);
    }

    #[test]
    fn test_missing_gate_checked_before_allow_set() {
        let policy = RoutingPolicy::new(10).with_allowed_gates(["G1"]);
        let mut state = RouterState::new();

        assert_eq!(
            state.route(&policy, "BAG1", Some(""), false),
            RoutingOutcome::ManualInspection {
                reason: InspectionReason::MissingGate
            }
        );
    }

    #[test]
    fn test_capacity_boundary() {
        let n = 5;
        let policy = RoutingPolicy::new(n);
        let mut state = RouterState::new();

        for i in 0..n {
            let outcome = state.route(&policy, &format!("BAG{i}"), Some("G1"), i % 2 == 0);
            assert!(matches!(outcome, RoutingOutcome::Enqueued { .. }), "bag {i}");
        }
        assert_eq!(
            state.route(&policy, "OVER", Some("G1"), true),
            RoutingOutcome::Buffered
        );
        assert_eq!(state.count("G1"), n);
        assert_eq!(state.overflow_len(), 1);
    }

    #[test]
    fn test_capacity_frees_after_dequeue() {
        let policy = RoutingPolicy::new(1);
        let mut state = RouterState::new();

        state.route(&policy, "BAG1", Some("G1"), false);
        assert_eq!(
            state.route(&policy, "BAG2", Some("G1"), false),
            RoutingOutcome::Buffered
        );
        state.dequeue("G1");
        assert_eq!(
            state.route(&policy, "BAG3", Some("G1"), false),
            RoutingOutcome::Enqueued {
                lane: Lane::Regular
            }
        );
        // Buffered bags are not re-injected
        assert_eq!(state.bags("G1"), vec![BagId::new("BAG3")]);
        assert_eq!(state.overflow_len(), 1);
    }

    #[test]
    fn test_zero_capacity_buffers_and_creates_gate() {
        let policy = RoutingPolicy::new(0);
        let mut state = RouterState::new();

        assert_eq!(
            state.route(&policy, "BAG1", Some("G1"), false),
            RoutingOutcome::Buffered
        );
        assert_eq!(state.gates(), vec![GateId::new("G1")]);
        assert_eq!(state.count("G1"), 0);
    }

    #[test]
    fn test_capacity_is_per_gate() {
        let policy = RoutingPolicy::new(1);
        let mut state = RouterState::new();

        state.route(&policy, "BAG1", Some("G1"), false);
        assert!(matches!(
            state.route(&policy, "BAG2", Some("G2"), false),
            RoutingOutcome::Enqueued { .. }
        ));
    }

    #[test]
    fn test_dequeue_unknown_or_empty_gate() {
        let policy = RoutingPolicy::default();
        let mut state = RouterState::new();

        assert_eq!(state.dequeue("NOPE"), None);
        state.route(&policy, "BAG1", Some("G1"), false);
        state.dequeue("G1");
        assert_eq!(state.dequeue("G1"), None);
        assert_eq!(state.gates(), vec![GateId::new("G1")]);
    }

    #[test]
    fn test_count_matches_view() {
        let policy = RoutingPolicy::default();
        let mut state = RouterState::new();

        for i in 0..7 {
            state.route(&policy, &format!("BAG{i}"), Some("G1"), i % 3 == 0);
        }
        state.dequeue("G1");
        assert_eq!(state.count("G1"), state.bags("G1").len());
        assert_eq!(state.count("UNKNOWN"), 0);
        assert!(state.bags("UNKNOWN").is_empty());
    }

    #[test]
    fn test_seen_set_counts_every_first_scan() {
        let policy = RoutingPolicy::new(1).with_allowed_gates(["G1"]);
        let mut state = RouterState::new();

        state.route(&policy, "A", Some("G1"), false); // enqueued
        state.route(&policy, "B", Some("G1"), false); // buffered
        state.route(&policy, "C", None, false); // missing gate
        state.route(&policy, "D", Some("G7"), false); // unknown gate
        state.route(&policy, "A", Some("G1"), false); // duplicate

        assert_eq!(state.seen_count(), 4);
    }

    #[test]
    fn test_state_serde_roundtrip_preserves_order() {
        let policy = RoutingPolicy::new(2);
        let mut state = RouterState::new();
        state.route(&policy, "R1", Some("G1"), false);
        state.route(&policy, "P1", Some("G1"), true);
        state.route(&policy, "X", Some("G1"), true);
        state.route(&policy, "M", None, false);

        let json = serde_json::to_string(&state).unwrap();
        let restored: RouterState = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, state);
        assert_eq!(restored.bags("G1"), vec![BagId::new("P1"), BagId::new("R1")]);
        assert!(restored.has_seen("X"));
    }

    #[test]
    fn test_state_deserializes_with_missing_sections() {
        let restored: RouterState = serde_json::from_str("{}").unwrap();
        assert_eq!(restored, RouterState::new());
    }
}
