//! Workflow instances: the request records owned by calling subsystems
//!
//! The engine owns only the status fields below. Business data (rooms,
//! devices, budgets) lives in the subsystem's own record alongside the
//! instance.

use crate::{ActorId, ApprovalError, ApprovalResult, InstanceId, InvalidState, StageId, WorkflowType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The approval state of one request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    pub id: InstanceId,
    pub workflow_type: WorkflowType,
    pub current_stage_id: StageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: ActorId,
    pub modified_at: DateTime<Utc>,
    pub modified_by: ActorId,
    /// Incremented by one on every transition; callers use it for
    /// optimistic concurrency checks when persisting.
    #[serde(default)]
    pub version: u64,
}

impl WorkflowInstance {
    /// Create an instance sitting at `initial_stage`
    pub fn new(
        id: InstanceId,
        workflow_type: WorkflowType,
        initial_stage: StageId,
        created_by: ActorId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            workflow_type,
            current_stage_id: initial_stage,
            approval_note: None,
            rejection_note: None,
            created_at: now,
            created_by: created_by.clone(),
            modified_at: now,
            modified_by: created_by,
            version: 0,
        }
    }

    /// Fail with `StaleInstance` unless the instance is at `expected`.
    ///
    /// Callers holding a cached copy check the persisted version with
    /// this before writing a transition back.
    pub fn ensure_version(&self, expected: u64) -> ApprovalResult<()> {
        if self.version != expected {
            return Err(ApprovalError::InvalidState(InvalidState::StaleInstance {
                instance: self.id.clone(),
                expected,
                actual: self.version,
            }));
        }
        Ok(())
    }

    /// Move to `stage`, stamping modification fields and bumping the version
    pub fn record_transition(&mut self, stage: StageId, actor: &ActorId, at: DateTime<Utc>) {
        self.current_stage_id = stage;
        self.modified_at = at;
        self.modified_by = actor.clone();
        self.version += 1;
    }
}
