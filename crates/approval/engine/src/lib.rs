//! Approval Workflow Engine
//!
//! Pure transition logic shared by every request subsystem. The engine
//! reads two pieces of immutable configuration, checks capabilities
//! against an injected oracle, mutates only the instance's own status
//! fields, and records one audit event per transition.
//!
//! # Architecture
//!
//! ```text
//! StatusCatalog ──▶ WorkflowDefinition ──▶ WorkflowEngine ──▶ AuditSink
//!  (stage rows)      (transition table)        ▲
//!                                              │
//!                                      CapabilityOracle
//! ```
//!
//! `StatusCatalog` and `WorkflowDefinition` are loaded once and shared via
//! `Arc` across all callers without synchronization. The engine holds no
//! locks: callers serialize concurrent transitions on the same instance
//! (row lock or a check on [`WorkflowInstance::version`]).
//!
//! [`WorkflowInstance::version`]: approval_types::WorkflowInstance::version

#![deny(unsafe_code)]

pub mod audit;
pub mod authorization;
pub mod catalog;
pub mod definition;
pub mod engine;

pub use audit::{AuditSink, FanoutAuditSink, InMemoryAuditLog, TracingAuditSink};
pub use authorization::{CapabilityGrants, CapabilityOracle};
pub use catalog::StatusCatalog;
pub use definition::{ChainPolicy, RejectPolicy, WorkflowDefinition, WorkflowDefinitionBuilder};
pub use engine::{AvailableActions, EngineSettings, WorkflowEngine, UNKNOWN_STATUS_LABEL};

pub use approval_types::*;
