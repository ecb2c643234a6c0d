//! bagrouter core routing: pure-logic gate queues and routing decisions
//!
//! # Overview
//!
//! This crate owns the entity model and the single routing decision:
//!
//! - **GateQueue**: one priority lane and one regular lane per gate, served
//!   priority-first, FIFO within a lane
//! - **Manual inspection**: bags with a missing or disallowed gate tag
//! - **Overflow buffer**: bags that arrived at a gate already at capacity
//! - **Seen set**: every bag ID ever scanned, for duplicate rejection
//!
//! It performs no locking or I/O. The root `bagrouter` crate wraps
//! [`RouterState`] in a lock and persists it after every mutation.
//!
//! ```text
//!   scan(bag, gate, priority)
//!          │
//!          ▼
//!   seen? ──yes──► Duplicate
//!          │ no (mark seen)
//!          ▼
//!   gate tag? ──no──► ManualInspection(MissingGate)
//!          │
//!          ▼
//!   allowed? ──no──► ManualInspection(UnknownGate)
//!          │
//!          ▼
//!   gate full? ──yes──► Buffered
//!          │
//!          ▼
//!   Enqueued(priority | regular)
//! ```

pub mod ids;
pub mod lane;
pub mod outcome;
pub mod policy;
pub mod state;

pub use ids::{BagId, GateId};
pub use lane::{GateQueue, Lane};
pub use outcome::{InspectionReason, OutcomeKind, RoutingOutcome};
pub use policy::{RoutingPolicy, DEFAULT_MAX_QUEUE_LENGTH};
pub use state::{OverflowEntry, RouterState};
