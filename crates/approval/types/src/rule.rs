//! Transition rules: directed, capability-guarded edges

use crate::{Capability, StageId, WorkflowType};
use serde::{Deserialize, Serialize};

/// Which way a rule moves an instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Approval: on to the next stage
    Forward,
    /// Rejection: back to an earlier stage or to the terminal rejected stage
    Reject,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// One edge of a workflow type's transition graph
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRule {
    pub workflow_type: WorkflowType,
    pub from_stage: StageId,
    pub direction: Direction,
    pub to_stage: StageId,
    /// Capability the acting user must hold to fire this rule
    pub required_capability: Capability,
}

impl TransitionRule {
    pub fn forward(
        workflow_type: WorkflowType,
        from_stage: StageId,
        to_stage: StageId,
        required_capability: Capability,
    ) -> Self {
        Self {
            workflow_type,
            from_stage,
            direction: Direction::Forward,
            to_stage,
            required_capability,
        }
    }

    pub fn reject(
        workflow_type: WorkflowType,
        from_stage: StageId,
        to_stage: StageId,
        required_capability: Capability,
    ) -> Self {
        Self {
            workflow_type,
            from_stage,
            direction: Direction::Reject,
            to_stage,
            required_capability,
        }
    }
}

impl std::fmt::Display for TransitionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} {}→{} [{}]",
            self.workflow_type, self.direction, self.from_stage, self.to_stage, self.required_capability
        )
    }
}
