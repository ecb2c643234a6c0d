//! Routing outcomes
//!
//! Every scan resolves to exactly one outcome. Business-rule cases such as
//! duplicates or unknown gates are outcomes, not errors.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::lane::Lane;

/// Why a bag was sent to manual inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionReason {
    /// The bag carried no gate tag
    MissingGate,

    /// The gate tag is not in the configured allow-set
    UnknownGate,
}

impl fmt::Display for InspectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InspectionReason::MissingGate => write!(f, "missing gate"),
            InspectionReason::UnknownGate => write!(f, "unknown gate"),
        }
    }
}

/// Result of routing a single scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RoutingOutcome {
    /// The bag was already seen; nothing changed
    Duplicate,

    /// The bag could not be routed automatically
    ManualInspection { reason: InspectionReason },

    /// The destination gate was at capacity; the bag went to the overflow buffer
    Buffered,

    /// The bag was appended to a lane of its gate
    Enqueued { lane: Lane },
}

impl RoutingOutcome {
    /// Whether routing this outcome mutated router state
    pub fn changed_state(&self) -> bool {
        !matches!(self, RoutingOutcome::Duplicate)
    }

    /// Discriminant without payload
    pub fn kind(&self) -> OutcomeKind {
        match self {
            RoutingOutcome::Duplicate => OutcomeKind::Duplicate,
            RoutingOutcome::ManualInspection { .. } => OutcomeKind::ManualInspection,
            RoutingOutcome::Buffered => OutcomeKind::Buffered,
            RoutingOutcome::Enqueued { .. } => OutcomeKind::Enqueued,
        }
    }

    pub fn lane(&self) -> Option<Lane> {
        match self {
            RoutingOutcome::Enqueued { lane } => Some(*lane),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<InspectionReason> {
        match self {
            RoutingOutcome::ManualInspection { reason } => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for RoutingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingOutcome::Duplicate => write!(f, "duplicate"),
            RoutingOutcome::ManualInspection { reason } => {
                write!(f, "manual inspection ({})", reason)
            }
            RoutingOutcome::Buffered => write!(f, "buffered"),
            RoutingOutcome::Enqueued { lane } => write!(f, "enqueued ({})", lane),
        }
    }
}

/// Payload-free outcome tag, used by scan records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Duplicate,
    ManualInspection,
    Buffered,
    Enqueued,
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeKind::Duplicate => write!(f, "duplicate"),
            OutcomeKind::ManualInspection => write!(f, "manual_inspection"),
            OutcomeKind::Buffered => write!(f, "buffered"),
            OutcomeKind::Enqueued => write!(f, "enqueued"),
        }
    }
}
