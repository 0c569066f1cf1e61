//! Error types for approval workflows

use crate::{ActorId, Capability, InstanceId, StageId, WorkflowType};

/// Errors that can occur in approval operations
#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error("Permission denied: {actor} lacks '{capability}' at stage {stage}")]
    PermissionDenied {
        actor: ActorId,
        capability: Capability,
        stage: StageId,
    },

    #[error("Invalid state: {0}")]
    InvalidState(#[from] InvalidState),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid workflow definition: {0}")]
    Definition(String),

    #[error("Audit sink error: {0}")]
    Audit(#[from] AuditError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ApprovalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Definition(_) | Self::Config(_) => ErrorKind::Configuration,
            Self::Audit(_) => ErrorKind::Audit,
        }
    }
}

/// Why a transition cannot be applied to an instance in its current state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidState {
    #[error("stage {0} is terminal")]
    TerminalStage(StageId),

    #[error("stage {stage} not found for workflow type '{workflow_type}'")]
    StageNotFound {
        workflow_type: WorkflowType,
        stage: StageId,
    },

    #[error("unknown workflow type '{0}'")]
    UnknownWorkflowType(WorkflowType),

    #[error("stage {stage} belongs to '{actual}', not '{expected}'")]
    WorkflowTypeMismatch {
        stage: StageId,
        expected: WorkflowType,
        actual: WorkflowType,
    },

    #[error("stage {0} is a placeholder and takes no part in the chain")]
    PlaceholderStage(StageId),

    #[error("stage {0} has no reject rule")]
    NoRejectRule(StageId),

    #[error("instance {instance} is stale: expected version {expected}, found {actual}")]
    StaleInstance {
        instance: InstanceId,
        expected: u64,
        actual: u64,
    },
}

/// Failure reported by an audit sink
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    #[error("audit log unavailable: {0}")]
    Unavailable(String),

    #[error("audit event rejected: {0}")]
    Rejected(String),
}

/// Error categories surfaced to calling subsystems
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    PermissionDenied,
    InvalidState,
    ValidationError,
    Configuration,
    Audit,
}

/// Result type alias for approval operations
pub type ApprovalResult<T> = Result<T, ApprovalError>;
