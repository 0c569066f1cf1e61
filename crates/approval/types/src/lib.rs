//! Approval Workflow Domain Types
//!
//! Request subsystems (facility bookings, residence bookings, device and
//! service requests, expenditure requests) all route their records through
//! the same ordered chain of reviewer stages. This crate holds the shared
//! vocabulary for that chain.
//!
//! # Key Concepts
//!
//! - **Stage**: a named point in one workflow type's progression. Terminal
//!   and placeholder status are explicit flags, never inferred.
//! - **TransitionRule**: one directed edge (forward or reject) guarded by a
//!   named capability.
//! - **WorkflowInstance**: the request record owned by a calling subsystem.
//!   Only its stage, note and modification fields belong to the engine.
//! - **AuditEvent**: an immutable record of one transition.
//!
//! # Design Principles
//!
//! 1. The transition graph is data, keyed by workflow type.
//! 2. Capabilities are names checked against an external oracle.
//! 3. Every transition produces exactly one audit event.

#![deny(unsafe_code)]

mod audit;
mod errors;
mod ids;
mod instance;
mod rule;
mod stage;

pub use audit::*;
pub use errors::*;
pub use ids::*;
pub use instance::*;
pub use rule::*;
pub use stage::*;
