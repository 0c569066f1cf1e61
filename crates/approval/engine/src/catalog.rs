//! Status catalog: read-only lookup of stage rows per workflow type
//!
//! Stage ids are unique across the whole catalog. Within one workflow
//! type the chain stages (non-terminal, non-placeholder) are numbered
//! `1..=n` without gaps and the terminal approved stage sits at `n + 1`.

use approval_types::{ApprovalError, ApprovalResult, InvalidState, Stage, StageId, WorkflowType};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Immutable index of stage rows
#[derive(Clone, Debug)]
pub struct StatusCatalog {
    stages: HashMap<StageId, Stage>,
    /// Stage ids per workflow type, ordered by sequence number
    by_type: BTreeMap<WorkflowType, Vec<StageId>>,
}

impl StatusCatalog {
    /// Build a catalog, rejecting any set of rows that breaks the stage
    /// invariants.
    pub fn new(stages: impl IntoIterator<Item = Stage>) -> ApprovalResult<Self> {
        let mut index = HashMap::new();
        let mut by_type: BTreeMap<WorkflowType, Vec<StageId>> = BTreeMap::new();

        for stage in stages {
            if index.contains_key(&stage.id) {
                return Err(ApprovalError::Definition(format!(
                    "duplicate stage id {}",
                    stage.id
                )));
            }
            by_type
                .entry(stage.workflow_type.clone())
                .or_default()
                .push(stage.id);
            index.insert(stage.id, stage);
        }

        for ids in by_type.values_mut() {
            ids.sort_by_key(|id| index[id].sequence_number);
        }

        let catalog = Self {
            stages: index,
            by_type,
        };
        for workflow_type in catalog.by_type.keys() {
            catalog.validate_type(workflow_type)?;
        }

        tracing::debug!(
            stages = catalog.stages.len(),
            workflow_types = catalog.by_type.len(),
            "Status catalog loaded"
        );
        Ok(catalog)
    }

    /// Look up a stage, requiring it to belong to `workflow_type`
    pub fn get_stage(&self, workflow_type: &WorkflowType, id: StageId) -> ApprovalResult<&Stage> {
        let stage = self.stages.get(&id).ok_or_else(|| {
            InvalidState::StageNotFound {
                workflow_type: workflow_type.clone(),
                stage: id,
            }
        })?;

        if &stage.workflow_type != workflow_type {
            return Err(InvalidState::WorkflowTypeMismatch {
                stage: id,
                expected: workflow_type.clone(),
                actual: stage.workflow_type.clone(),
            }
            .into());
        }
        Ok(stage)
    }

    /// The stage with sequence number 1
    pub fn get_initial_stage(&self, workflow_type: &WorkflowType) -> ApprovalResult<&Stage> {
        self.ordered(workflow_type)?
            .find(|s| s.is_chain_stage() && s.sequence_number == 1)
            .ok_or_else(|| InvalidState::UnknownWorkflowType(workflow_type.clone()).into())
    }

    /// All user-facing stages of a workflow type in sequence order.
    ///
    /// Placeholder rows are left out.
    pub fn list_stages(&self, workflow_type: &WorkflowType) -> ApprovalResult<Vec<&Stage>> {
        Ok(self
            .ordered(workflow_type)?
            .filter(|s| !s.is_placeholder)
            .collect())
    }

    /// Look up a stage by id regardless of workflow type
    pub fn stage(&self, id: StageId) -> Option<&Stage> {
        self.stages.get(&id)
    }

    pub fn contains(&self, id: StageId) -> bool {
        self.stages.contains_key(&id)
    }

    pub fn terminal_approved(&self, workflow_type: &WorkflowType) -> ApprovalResult<&Stage> {
        self.ordered(workflow_type)?
            .find(|s| s.is_terminal_approved)
            .ok_or_else(|| InvalidState::UnknownWorkflowType(workflow_type.clone()).into())
    }

    /// The terminal rejected stage, if the workflow type has one
    pub fn terminal_rejected(&self, workflow_type: &WorkflowType) -> ApprovalResult<Option<&Stage>> {
        Ok(self.ordered(workflow_type)?.find(|s| s.is_terminal_rejected))
    }

    /// Chain stages (non-terminal, non-placeholder) in sequence order
    pub fn chain_stages(&self, workflow_type: &WorkflowType) -> ApprovalResult<Vec<&Stage>> {
        Ok(self
            .ordered(workflow_type)?
            .filter(|s| s.is_chain_stage())
            .collect())
    }

    pub fn workflow_types(&self) -> impl Iterator<Item = &WorkflowType> {
        self.by_type.keys()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    // ── Internal helpers ─────────────────────────────────────────────

    fn ordered(
        &self,
        workflow_type: &WorkflowType,
    ) -> ApprovalResult<impl Iterator<Item = &Stage> + '_> {
        let ids = self
            .by_type
            .get(workflow_type)
            .ok_or_else(|| InvalidState::UnknownWorkflowType(workflow_type.clone()))?;
        Ok(ids.iter().filter_map(|id| self.stages.get(id)))
    }

    fn validate_type(&self, workflow_type: &WorkflowType) -> ApprovalResult<()> {
        let stages: Vec<&Stage> = self.ordered(workflow_type)?.collect();
        let fail = |msg: String| Err(ApprovalError::Definition(format!("{}: {}", workflow_type, msg)));

        let mut sequences = HashSet::new();
        for stage in &stages {
            if !sequences.insert(stage.sequence_number) {
                return fail(format!(
                    "duplicate sequence number {}",
                    stage.sequence_number
                ));
            }
            if stage.is_terminal_approved && stage.is_terminal_rejected {
                return fail(format!("stage {} is both approved and rejected", stage.id));
            }
            if stage.is_placeholder && stage.is_terminal() {
                return fail(format!("placeholder stage {} cannot be terminal", stage.id));
            }
        }

        let approved: Vec<&&Stage> = stages.iter().filter(|s| s.is_terminal_approved).collect();
        if approved.len() != 1 {
            return fail(format!(
                "expected exactly one terminal approved stage, found {}",
                approved.len()
            ));
        }
        let rejected = stages.iter().filter(|s| s.is_terminal_rejected).count();
        if rejected > 1 {
            return fail(format!(
                "expected at most one terminal rejected stage, found {}",
                rejected
            ));
        }

        let chain: Vec<&&Stage> = stages.iter().filter(|s| s.is_chain_stage()).collect();
        if chain.is_empty() {
            return fail("no chain stages".into());
        }
        for (position, stage) in chain.iter().enumerate() {
            let expected = position as u32 + 1;
            if stage.sequence_number != expected {
                return fail(format!(
                    "chain stage {} has sequence number {}, expected {}",
                    stage.id, stage.sequence_number, expected
                ));
            }
        }

        let final_sequence = chain.len() as u32 + 1;
        if approved[0].sequence_number != final_sequence {
            return fail(format!(
                "terminal approved stage {} has sequence number {}, expected {}",
                approved[0].id, approved[0].sequence_number, final_sequence
            ));
        }

        Ok(())
    }
}
