//! Workflow definition: the declarative transition table
//!
//! One immutable table, keyed by workflow type, replaces the per-subsystem
//! copies of the forward/reject map. Rules are either supplied explicitly
//! through [`WorkflowDefinitionBuilder::rule`] or derived from the catalog
//! by a [`ChainPolicy`]. Either way the graph is validated before the
//! definition is handed to an engine.

use crate::catalog::StatusCatalog;
use approval_types::{
    ApprovalError, ApprovalResult, Capability, Direction, InvalidState, Stage, StageId,
    TransitionRule, WorkflowType,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Where rejection sends an instance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectPolicy {
    /// The first review stage rejects to the terminal rejected stage; every
    /// later review stage sends the request back to the first review stage
    /// so that a resubmission passes the full chain again.
    #[default]
    RestartFromFirstReviewer,
    /// The first review stage rejects to the terminal rejected stage; later
    /// review stages send the request back one stage.
    StepBack,
}

/// Derives a workflow type's rules from its catalog stages.
///
/// The acting reviewer for a stage is the owner of the next stage, so
/// both capabilities of stage `s` are named after `next(s).code`:
/// `<type>.<code>.approve` and `<type>.<code>.reject`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainPolicy {
    pub reject_policy: RejectPolicy,
}

impl ChainPolicy {
    pub fn new(reject_policy: RejectPolicy) -> Self {
        Self { reject_policy }
    }

    pub fn rules(
        &self,
        catalog: &StatusCatalog,
        workflow_type: &WorkflowType,
    ) -> ApprovalResult<Vec<TransitionRule>> {
        let chain = catalog.chain_stages(workflow_type)?;
        let approved = catalog.terminal_approved(workflow_type)?;
        let rejected = catalog.terminal_rejected(workflow_type)?;

        let mut rules = Vec::new();
        for (position, stage) in chain.iter().enumerate() {
            let next: &Stage = chain.get(position + 1).copied().unwrap_or(approved);

            rules.push(TransitionRule::forward(
                workflow_type.clone(),
                stage.id,
                next.id,
                Capability::for_stage(workflow_type, &next.code, "approve"),
            ));

            // position 0 is the initial stage, position 1 the first reviewer
            let reject_to = match (position, self.reject_policy) {
                (0, _) => None,
                (1, _) => rejected.map(|s| s.id),
                (_, RejectPolicy::RestartFromFirstReviewer) => Some(chain[1].id),
                (_, RejectPolicy::StepBack) => Some(chain[position - 1].id),
            };
            if let Some(target) = reject_to {
                rules.push(TransitionRule::reject(
                    workflow_type.clone(),
                    stage.id,
                    target,
                    Capability::for_stage(workflow_type, &next.code, "reject"),
                ));
            }
        }
        Ok(rules)
    }
}

#[derive(Clone, Debug, Default)]
struct RuleTable {
    forward: HashMap<StageId, TransitionRule>,
    reject: HashMap<StageId, TransitionRule>,
}

/// Immutable transition table shared read-only by all engines
#[derive(Clone, Debug)]
pub struct WorkflowDefinition {
    catalog: Arc<StatusCatalog>,
    tables: HashMap<WorkflowType, RuleTable>,
}

impl WorkflowDefinition {
    pub fn builder(catalog: Arc<StatusCatalog>) -> WorkflowDefinitionBuilder {
        WorkflowDefinitionBuilder::new(catalog)
    }

    /// Apply the same chain policy to every workflow type in the catalog
    pub fn from_policy(catalog: Arc<StatusCatalog>, policy: &ChainPolicy) -> ApprovalResult<Self> {
        let types: Vec<WorkflowType> = catalog.workflow_types().cloned().collect();
        let mut builder = Self::builder(catalog);
        for workflow_type in types {
            builder = builder.policy(workflow_type, policy.clone());
        }
        builder.build()
    }

    pub fn catalog(&self) -> &Arc<StatusCatalog> {
        &self.catalog
    }

    /// The stage an approval leads to; `None` iff `from` is terminal
    pub fn next_stage(&self, workflow_type: &WorkflowType, from: StageId) -> ApprovalResult<Option<&Stage>> {
        self.follow(self.forward_rule(workflow_type, from)?)
    }

    pub fn required_capability_for_forward(
        &self,
        workflow_type: &WorkflowType,
        from: StageId,
    ) -> ApprovalResult<&Capability> {
        match self.forward_rule(workflow_type, from)? {
            Some(rule) => Ok(&rule.required_capability),
            None => Err(self.no_forward_rule(workflow_type, from)),
        }
    }

    /// The stage a rejection leads to; `None` when `from` has no reject rule
    pub fn reject_target(&self, workflow_type: &WorkflowType, from: StageId) -> ApprovalResult<Option<&Stage>> {
        self.follow(self.reject_rule(workflow_type, from)?)
    }

    pub fn required_capability_for_reject(
        &self,
        workflow_type: &WorkflowType,
        from: StageId,
    ) -> ApprovalResult<Option<&Capability>> {
        Ok(self
            .reject_rule(workflow_type, from)?
            .map(|rule| &rule.required_capability))
    }

    pub fn forward_rule(
        &self,
        workflow_type: &WorkflowType,
        from: StageId,
    ) -> ApprovalResult<Option<&TransitionRule>> {
        let table = self.table(workflow_type, from)?;
        Ok(table.forward.get(&from))
    }

    pub fn reject_rule(
        &self,
        workflow_type: &WorkflowType,
        from: StageId,
    ) -> ApprovalResult<Option<&TransitionRule>> {
        let table = self.table(workflow_type, from)?;
        Ok(table.reject.get(&from))
    }

    /// All rules of a workflow type, forward rules in chain order first
    pub fn rules_for(&self, workflow_type: &WorkflowType) -> ApprovalResult<Vec<&TransitionRule>> {
        let table = self
            .tables
            .get(workflow_type)
            .ok_or_else(|| InvalidState::UnknownWorkflowType(workflow_type.clone()))?;
        let mut forward: Vec<&TransitionRule> = table.forward.values().collect();
        let mut reject: Vec<&TransitionRule> = table.reject.values().collect();
        let position = |rule: &&TransitionRule| {
            self.catalog
                .stage(rule.from_stage)
                .map(|s| s.sequence_number)
                .unwrap_or(u32::MAX)
        };
        forward.sort_by_key(position);
        reject.sort_by_key(position);
        forward.extend(reject);
        Ok(forward)
    }

    pub fn workflow_types(&self) -> impl Iterator<Item = &WorkflowType> {
        self.tables.keys()
    }

    // ── Internal helpers ─────────────────────────────────────────────

    /// Resolve the rule table for `workflow_type`, checking `from` belongs to it
    fn table(&self, workflow_type: &WorkflowType, from: StageId) -> ApprovalResult<&RuleTable> {
        self.catalog.get_stage(workflow_type, from)?;
        self.tables
            .get(workflow_type)
            .ok_or_else(|| InvalidState::UnknownWorkflowType(workflow_type.clone()).into())
    }

    fn no_forward_rule(&self, workflow_type: &WorkflowType, from: StageId) -> ApprovalError {
        match self.catalog.get_stage(workflow_type, from) {
            Ok(stage) if stage.is_placeholder => InvalidState::PlaceholderStage(from).into(),
            Ok(_) => InvalidState::TerminalStage(from).into(),
            Err(e) => e,
        }
    }

    fn follow(&self, rule: Option<&TransitionRule>) -> ApprovalResult<Option<&Stage>> {
        match rule {
            None => Ok(None),
            Some(rule) => self
                .catalog
                .get_stage(&rule.workflow_type, rule.to_stage)
                .map(Some),
        }
    }
}

/// Collects rules per workflow type and validates the resulting graph
pub struct WorkflowDefinitionBuilder {
    catalog: Arc<StatusCatalog>,
    explicit: Vec<TransitionRule>,
    policies: Vec<(WorkflowType, ChainPolicy)>,
}

impl WorkflowDefinitionBuilder {
    pub fn new(catalog: Arc<StatusCatalog>) -> Self {
        Self {
            catalog,
            explicit: Vec::new(),
            policies: Vec::new(),
        }
    }

    pub fn rule(mut self, rule: TransitionRule) -> Self {
        self.explicit.push(rule);
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = TransitionRule>) -> Self {
        self.explicit.extend(rules);
        self
    }

    /// Derive a workflow type's rules from the catalog instead of listing them
    pub fn policy(mut self, workflow_type: WorkflowType, policy: ChainPolicy) -> Self {
        self.policies.push((workflow_type, policy));
        self
    }

    pub fn build(self) -> ApprovalResult<WorkflowDefinition> {
        let mut rules = self.explicit;
        for (workflow_type, policy) in &self.policies {
            if rules.iter().any(|r| &r.workflow_type == workflow_type) {
                return Err(ApprovalError::Definition(format!(
                    "{}: both explicit rules and a chain policy given",
                    workflow_type
                )));
            }
            rules.extend(policy.rules(&self.catalog, workflow_type)?);
        }

        let mut tables: HashMap<WorkflowType, RuleTable> = HashMap::new();
        for rule in rules {
            validate_rule(&self.catalog, &rule)?;
            let table = tables.entry(rule.workflow_type.clone()).or_default();
            let slot = match rule.direction {
                Direction::Forward => &mut table.forward,
                Direction::Reject => &mut table.reject,
            };
            if slot.contains_key(&rule.from_stage) {
                return Err(ApprovalError::Definition(format!(
                    "{}: stage {} has more than one {} rule",
                    rule.workflow_type, rule.from_stage, rule.direction
                )));
            }
            slot.insert(rule.from_stage, rule);
        }

        for workflow_type in self.catalog.workflow_types() {
            let table = tables.get(workflow_type).ok_or_else(|| {
                ApprovalError::Definition(format!("{}: no transition rules", workflow_type))
            })?;
            validate_coverage(&self.catalog, workflow_type, table)?;
        }

        tracing::debug!(workflow_types = tables.len(), "Workflow definition built");
        Ok(WorkflowDefinition {
            catalog: self.catalog,
            tables,
        })
    }
}

fn validate_rule(catalog: &StatusCatalog, rule: &TransitionRule) -> ApprovalResult<()> {
    let invalid = |msg: String| Err(ApprovalError::Definition(format!("rule {}: {}", rule, msg)));

    let from = catalog
        .get_stage(&rule.workflow_type, rule.from_stage)
        .map_err(|e| ApprovalError::Definition(format!("rule {}: {}", rule, e)))?;
    let to = catalog
        .get_stage(&rule.workflow_type, rule.to_stage)
        .map_err(|e| ApprovalError::Definition(format!("rule {}: {}", rule, e)))?;

    if from.is_placeholder || to.is_placeholder {
        return invalid("placeholder stages take no part in transitions".into());
    }
    if from.is_terminal() {
        return invalid("terminal stages have no outgoing rules".into());
    }

    match rule.direction {
        Direction::Forward => {
            if to.sequence_number != from.sequence_number + 1 {
                return invalid(format!(
                    "forward target has sequence number {}, expected {}",
                    to.sequence_number,
                    from.sequence_number + 1
                ));
            }
        }
        Direction::Reject => {
            let backwards = !to.is_terminal() && to.sequence_number < from.sequence_number;
            if !to.is_terminal_rejected && !backwards {
                return invalid(
                    "reject target must be the rejected stage or an earlier stage".into(),
                );
            }
        }
    }
    Ok(())
}

fn validate_coverage(
    catalog: &StatusCatalog,
    workflow_type: &WorkflowType,
    table: &RuleTable,
) -> ApprovalResult<()> {
    for stage in catalog.chain_stages(workflow_type)? {
        if !table.forward.contains_key(&stage.id) {
            return Err(ApprovalError::Definition(format!(
                "{}: stage {} ({}) has no forward rule",
                workflow_type, stage.id, stage.code
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::standard_stages;

    fn make_definition(policy: RejectPolicy) -> WorkflowDefinition {
        let wt = WorkflowType::facility_booking();
        let catalog = Arc::new(StatusCatalog::new(standard_stages(&wt, 100)).unwrap());
        WorkflowDefinition::from_policy(catalog, &ChainPolicy::new(policy)).unwrap()
    }

    #[test]
    fn test_forward_chain() {
        let def = make_definition(RejectPolicy::default());
        let wt = WorkflowType::facility_booking();

        let mut current = StageId::new(101);
        let mut visited = vec![current];
        while let Some(next) = def.next_stage(&wt, current).unwrap() {
            current = next.id;
            visited.push(current);
        }
        let ids: Vec<u32> = visited.iter().map(|s| s.0).collect();
        assert_eq!(ids, vec![101, 102, 103, 104, 105, 106]);
    }

    #[test]
    fn test_restart_from_first_reviewer() {
        let def = make_definition(RejectPolicy::RestartFromFirstReviewer);
        let wt = WorkflowType::facility_booking();

        assert!(def.reject_target(&wt, StageId::new(101)).unwrap().is_none());
        assert_eq!(
            def.reject_target(&wt, StageId::new(102)).unwrap().map(|s| s.id),
            Some(StageId::new(107))
        );
        for from in [103, 104, 105] {
            assert_eq!(
                def.reject_target(&wt, StageId::new(from)).unwrap().map(|s| s.id),
                Some(StageId::new(102))
            );
        }
    }

    #[test]
    fn test_step_back() {
        let def = make_definition(RejectPolicy::StepBack);
        let wt = WorkflowType::facility_booking();

        assert_eq!(
            def.reject_target(&wt, StageId::new(102)).unwrap().map(|s| s.id),
            Some(StageId::new(107))
        );
        assert_eq!(
            def.reject_target(&wt, StageId::new(105)).unwrap().map(|s| s.id),
            Some(StageId::new(104))
        );
    }

    #[test]
    fn test_capability_names_follow_next_stage() {
        let def = make_definition(RejectPolicy::default());
        let wt = WorkflowType::facility_booking();

        assert_eq!(
            def.required_capability_for_forward(&wt, StageId::new(101)).unwrap().as_str(),
            "facility_booking.review_1.approve"
        );
        assert_eq!(
            def.required_capability_for_reject(&wt, StageId::new(104))
                .unwrap()
                .map(|c| c.as_str()),
            Some("facility_booking.final_review.reject")
        );
        assert_eq!(
            def.required_capability_for_forward(&wt, StageId::new(105)).unwrap().as_str(),
            "facility_booking.approved.approve"
        );
    }

    #[test]
    fn test_terminal_stages_have_no_rules() {
        let def = make_definition(RejectPolicy::default());
        let wt = WorkflowType::facility_booking();

        for terminal in [106, 107] {
            let id = StageId::new(terminal);
            assert!(def.next_stage(&wt, id).unwrap().is_none());
            assert!(def.reject_target(&wt, id).unwrap().is_none());
            assert!(def.required_capability_for_reject(&wt, id).unwrap().is_none());
            assert!(matches!(
                def.required_capability_for_forward(&wt, id),
                Err(ApprovalError::InvalidState(InvalidState::TerminalStage(_)))
            ));
        }
    }

    #[test]
    fn test_rules_for_is_ordered() {
        let def = make_definition(RejectPolicy::default());
        let rules = def.rules_for(&WorkflowType::facility_booking()).unwrap();

        // 5 forward + 4 reject (initial stage has none)
        assert_eq!(rules.len(), 9);
        assert!(rules[..5].iter().all(|r| r.direction == Direction::Forward));
        assert_eq!(rules[0].from_stage, StageId::new(101));
        assert_eq!(rules[5].from_stage, StageId::new(102));
    }

    #[test]
    fn test_unknown_stage_is_invalid_state() {
        let def = make_definition(RejectPolicy::default());
        let err = def
            .next_stage(&WorkflowType::facility_booking(), StageId::new(4242))
            .unwrap_err();
        assert!(matches!(
            err,
            ApprovalError::InvalidState(InvalidState::StageNotFound { .. })
        ));
    }

    fn explicit_builder() -> (WorkflowType, WorkflowDefinitionBuilder) {
        let wt = WorkflowType::device_request();
        let catalog = Arc::new(StatusCatalog::new(standard_stages(&wt, 300)).unwrap());
        let policy_rules = ChainPolicy::default().rules(&catalog, &wt).unwrap();
        (wt, WorkflowDefinition::builder(catalog).rules(policy_rules))
    }

    #[test]
    fn test_explicit_rules_build() {
        let (wt, builder) = explicit_builder();
        let def = builder.build().unwrap();
        assert_eq!(def.rules_for(&wt).unwrap().len(), 9);
    }

    #[test]
    fn test_rejects_skipping_forward_rule() {
        let (wt, builder) = explicit_builder();
        let err = builder
            .rule(TransitionRule::forward(
                wt,
                StageId::new(306),
                StageId::new(307),
                Capability::new("x"),
            ))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("terminal stages have no outgoing rules"));
    }

    #[test]
    fn test_rejects_duplicate_forward_rule() {
        let (wt, builder) = explicit_builder();
        let err = builder
            .rule(TransitionRule::forward(
                wt,
                StageId::new(301),
                StageId::new(302),
                Capability::new("dup"),
            ))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("more than one forward rule"));
    }

    #[test]
    fn test_rejects_forward_reject_target() {
        let wt = WorkflowType::device_request();
        let catalog = Arc::new(StatusCatalog::new(standard_stages(&wt, 300)).unwrap());
        let rules: Vec<TransitionRule> = ChainPolicy::default()
            .rules(&catalog, &wt)
            .unwrap()
            .into_iter()
            .filter(|r| !(r.direction == Direction::Reject && r.from_stage == StageId::new(303)))
            .collect();

        let err = WorkflowDefinition::builder(catalog)
            .rules(rules)
            .rule(TransitionRule::reject(
                wt,
                StageId::new(303),
                StageId::new(305),
                Capability::new("x"),
            ))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("reject target"));
    }

    #[test]
    fn test_rejects_missing_forward_rule() {
        let wt = WorkflowType::device_request();
        let catalog = Arc::new(StatusCatalog::new(standard_stages(&wt, 300)).unwrap());
        let rules: Vec<TransitionRule> = ChainPolicy::default()
            .rules(&catalog, &wt)
            .unwrap()
            .into_iter()
            .filter(|r| r.from_stage != StageId::new(304))
            .collect();

        let err = WorkflowDefinition::builder(catalog).rules(rules).build().unwrap_err();
        assert!(err.to_string().contains("has no forward rule"));
    }

    #[test]
    fn test_rejects_workflow_type_without_rules() {
        let facility = WorkflowType::facility_booking();
        let device = WorkflowType::device_request();
        let stages = standard_stages(&facility, 100)
            .into_iter()
            .chain(standard_stages(&device, 300));
        let catalog = Arc::new(StatusCatalog::new(stages).unwrap());

        let err = WorkflowDefinition::builder(catalog)
            .policy(facility, ChainPolicy::default())
            .build()
            .unwrap_err();
        assert!(matches!(err, ApprovalError::Definition(_)));
        assert!(err.to_string().contains("device_request: no transition rules"));
    }

    #[test]
    fn test_rejects_placeholder_rule() {
        let (wt, builder) = explicit_builder();
        let err = builder
            .rule(TransitionRule::reject(
                wt,
                StageId::new(399),
                StageId::new(307),
                Capability::new("x"),
            ))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("placeholder"));
    }

    #[test]
    fn test_rejects_policy_and_explicit_mix() {
        let (wt, builder) = explicit_builder();
        let err = builder.policy(wt, ChainPolicy::default()).build().unwrap_err();
        assert!(matches!(err, ApprovalError::Definition(_)));
    }
}
