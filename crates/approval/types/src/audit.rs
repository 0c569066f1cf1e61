//! Audit events: one immutable record per transition

use crate::{ActorId, InstanceId, StageId, WorkflowType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the actor did
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Submit,
    Approve,
    Reject,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submit => write!(f, "submit"),
            Self::Approve => write!(f, "approve"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// A transition as seen by the audit trail
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub instance_id: InstanceId,
    pub workflow_type: WorkflowType,
    /// Stage before the transition. Equal to `to` for submissions.
    pub from: StageId,
    pub to: StageId,
    pub actor: ActorId,
    pub action: AuditAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        instance_id: InstanceId,
        workflow_type: WorkflowType,
        from: StageId,
        to: StageId,
        actor: ActorId,
        action: AuditAction,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            instance_id,
            workflow_type,
            from,
            to,
            actor,
            action,
            note: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    pub fn with_timestamp(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// Check if this event entered or left a stage
    pub fn involves_stage(&self, stage: StageId) -> bool {
        self.from == stage || self.to == stage
    }
}

impl std::fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}→{}", self.action, self.from, self.to)
    }
}
