//! Approval configuration
//!
//! Loads the stage seed and engine settings from TOML and wires up the
//! read-only catalog and definition that every engine shares. Also owns
//! the one-time logging setup for binaries embedding the engine.

#![deny(unsafe_code)]

pub mod logging;
pub mod seed;

pub use logging::{init_logging, LoggingConfig};
pub use seed::{ApprovalSetup, RuleSeed, SeedConfig, StageSeed, TerminalKind, WorkflowSeed};
