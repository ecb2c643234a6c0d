//! Routing policy: gate allow-set and per-gate capacity

use std::collections::BTreeSet;

use crate::ids::GateId;

/// Default maximum combined lane length per gate
pub const DEFAULT_MAX_QUEUE_LENGTH: usize = 1000;

/// Static routing rules applied to every scan.
///
/// An empty allow-set accepts any gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingPolicy {
    allowed_gates: BTreeSet<GateId>,
    max_queue_length: usize,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            allowed_gates: BTreeSet::new(),
            max_queue_length: DEFAULT_MAX_QUEUE_LENGTH,
        }
    }
}

impl RoutingPolicy {
    /// Create an unrestricted policy with the given per-gate capacity
    pub fn new(max_queue_length: usize) -> Self {
        Self {
            allowed_gates: BTreeSet::new(),
            max_queue_length,
        }
    }

    /// Restrict routing to the given gates
    pub fn with_allowed_gates<I, S>(mut self, gates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<GateId>,
    {
        self.allowed_gates = gates.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_queue_length(mut self, max_queue_length: usize) -> Self {
        self.max_queue_length = max_queue_length;
        self
    }

    /// Whether an allow-set is in effect
    pub fn is_restricted(&self) -> bool {
        !self.allowed_gates.is_empty()
    }

    /// Whether a gate passes the allow-set check
    pub fn allows(&self, gate: &str) -> bool {
        !self.is_restricted() || self.allowed_gates.contains(gate)
    }

    pub fn allowed_gates(&self) -> &BTreeSet<GateId> {
        &self.allowed_gates
    }

    pub fn max_queue_length(&self) -> usize {
        self.max_queue_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = RoutingPolicy::default();
        assert_eq!(policy.max_queue_length(), DEFAULT_MAX_QUEUE_LENGTH);
        assert!(!policy.is_restricted());
        assert!(policy.allows("ANY"));
    }

    #[test]
    fn test_allow_set() {
        let policy = RoutingPolicy::new(10).with_allowed_gates(["G1", "G2"]);
        assert!(policy.is_restricted());
        assert!(policy.allows("G1"));
        assert!(policy.allows("G2"));
        assert!(!policy.allows("G9"));
    }

    #[test]
    fn test_empty_allow_set_is_unrestricted() {
        let policy = RoutingPolicy::new(10).with_allowed_gates(Vec::<String>::new());
        assert!(!policy.is_restricted());
        assert!(policy.allows("G9"));
    }

    #[test]
    fn test_with_max_queue_length_keeps_allow_set() {
        let policy = RoutingPolicy::default()
            .with_allowed_gates(["G1"])
            .with_max_queue_length(3);
        assert_eq!(policy.max_queue_length(), 3);
        assert!(!policy.allows("G2"));
    }
}
