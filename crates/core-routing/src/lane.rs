//! Gate queues: one priority lane and one regular lane per gate
//!
//! ```
//! use bagrouter_core_routing::{BagId, GateQueue, Lane};
//!
//! let mut queue = GateQueue::new();
//! queue.push(Lane::Regular, BagId::new("BAG1"));
//! queue.push(Lane::Priority, BagId::new("BAG2"));
//!
//! assert_eq!(queue.len(), 2);
//! assert_eq!(queue.pop_next(), Some((Lane::Priority, BagId::new("BAG2"))));
//! assert_eq!(queue.pop_next(), Some((Lane::Regular, BagId::new("BAG1"))));
//! assert_eq!(queue.pop_next(), None);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::ids::BagId;

/// Sub-queue within a gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    /// Served first whenever non-empty
    Priority,

    /// Served once the priority lane is drained
    Regular,
}

impl Lane {
    /// Select the lane for a bag's priority flag
    pub fn for_priority(is_priority: bool) -> Self {
        if is_priority {
            Lane::Priority
        } else {
            Lane::Regular
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Priority => "priority",
            Lane::Regular => "regular",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// FIFO lanes for a single gate.
///
/// Capacity is not enforced here; the routing decision in
/// [`RouterState::route`](crate::RouterState::route) checks the combined
/// length against the policy before pushing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateQueue {
    #[serde(default)]
    priority: VecDeque<BagId>,

    #[serde(default)]
    regular: VecDeque<BagId>,
}

impl GateQueue {
    /// Create a gate queue with both lanes empty
    pub fn new() -> Self {
        Self::default()
    }

    /// Combined length of both lanes
    pub fn len(&self) -> usize {
        self.priority.len() + self.regular.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priority.is_empty() && self.regular.is_empty()
    }

    /// Append a bag to the tail of a lane
    pub fn push(&mut self, lane: Lane, bag_id: BagId) {
        match lane {
            Lane::Priority => self.priority.push_back(bag_id),
            Lane::Regular => self.regular.push_back(bag_id),
        }
    }

    /// Remove the next bag to convey: priority head first, then regular head
    pub fn pop_next(&mut self) -> Option<(Lane, BagId)> {
        if let Some(bag) = self.priority.pop_front() {
            return Some((Lane::Priority, bag));
        }
        self.regular.pop_front().map(|bag| (Lane::Regular, bag))
    }

    /// Borrow a single lane
    pub fn lane(&self, lane: Lane) -> &VecDeque<BagId> {
        match lane {
            Lane::Priority => &self.priority,
            Lane::Regular => &self.regular,
        }
    }

    /// Iterate pending bags in delivery order
    pub fn iter(&self) -> impl Iterator<Item = &BagId> {
        self.priority.iter().chain(self.regular.iter())
    }

    /// Copy of pending bags, priority lane then regular lane
    pub fn bags(&self) -> Vec<BagId> {
        self.iter().cloned().collect()
    }
}
