//! Workflow engine: validates and applies approve/reject transitions
//!
//! Each transition is a single in-memory read-modify-write on the caller's
//! instance. Checks run first, the audit event is recorded next, and only
//! then are the stage, note and modification fields written together. A
//! failed call leaves the instance exactly as it was.

use crate::audit::AuditSink;
use crate::authorization::CapabilityOracle;
use crate::definition::WorkflowDefinition;
use approval_types::{
    ActorId, ApprovalError, ApprovalResult, AuditAction, AuditEvent, Capability, InstanceId,
    InvalidState, Stage, StageId, TransitionRule, WorkflowInstance, WorkflowType,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Label returned for stage ids absent from the catalog
pub const UNKNOWN_STATUS_LABEL: &str = "Unknown";

/// Engine behaviour that is configuration rather than code
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Locale used when a stage has no name in the requested one
    pub default_locale: String,
    /// Returned by label lookups for unknown stage ids
    pub unknown_label: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_locale: "en".to_string(),
            unknown_label: UNKNOWN_STATUS_LABEL.to_string(),
        }
    }
}

/// What an actor may currently do with an instance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableActions {
    pub approve: bool,
    pub reject: bool,
}

/// The transition engine shared by all request subsystems
#[derive(Clone)]
pub struct WorkflowEngine {
    definition: Arc<WorkflowDefinition>,
    oracle: Arc<dyn CapabilityOracle>,
    audit: Arc<dyn AuditSink>,
    settings: EngineSettings,
}

impl WorkflowEngine {
    pub fn new(
        definition: Arc<WorkflowDefinition>,
        oracle: Arc<dyn CapabilityOracle>,
        audit: Arc<dyn AuditSink>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            definition,
            oracle,
            audit,
            settings,
        }
    }

    pub fn definition(&self) -> &Arc<WorkflowDefinition> {
        &self.definition
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Create an instance at the initial stage of `workflow_type`
    pub fn submit(
        &self,
        instance_id: InstanceId,
        workflow_type: &WorkflowType,
        actor: &ActorId,
    ) -> ApprovalResult<WorkflowInstance> {
        let initial = self.definition.catalog().get_initial_stage(workflow_type)?;
        let instance =
            WorkflowInstance::new(instance_id, workflow_type.clone(), initial.id, actor.clone());

        let event = AuditEvent::new(
            instance.id.clone(),
            workflow_type.clone(),
            initial.id,
            initial.id,
            actor.clone(),
            AuditAction::Submit,
        )
        .with_timestamp(instance.created_at);
        self.audit.record(&event)?;

        tracing::info!(
            instance = %instance.id,
            workflow_type = %workflow_type,
            stage = %initial.id,
            actor = %actor,
            "Request submitted"
        );
        Ok(instance)
    }

    /// False at terminal stages; otherwise whether `actor` holds the
    /// forward capability of the current stage.
    pub fn can_approve(&self, instance: &WorkflowInstance, actor: &ActorId) -> bool {
        match self.forward_rule(instance) {
            Ok(rule) => self.oracle.has_capability(actor, &rule.required_capability),
            Err(_) => false,
        }
    }

    /// False at the terminal rejected stage or where no reject rule exists;
    /// otherwise whether `actor` holds the reject capability.
    pub fn can_reject(&self, instance: &WorkflowInstance, actor: &ActorId) -> bool {
        match self.reject_rule(instance) {
            Ok(rule) => self.oracle.has_capability(actor, &rule.required_capability),
            Err(_) => false,
        }
    }

    pub fn available_actions(&self, instance: &WorkflowInstance, actor: &ActorId) -> AvailableActions {
        AvailableActions {
            approve: self.can_approve(instance, actor),
            reject: self.can_reject(instance, actor),
        }
    }

    /// Advance the instance one stage.
    ///
    /// Fails with `InvalidState` at terminal or unknown stages and with
    /// `PermissionDenied` when the actor lacks the forward capability.
    pub fn approve(
        &self,
        instance: &mut WorkflowInstance,
        actor: &ActorId,
        note: Option<&str>,
    ) -> ApprovalResult<AuditEvent> {
        let rule = self.forward_rule(instance)?;
        self.authorize(instance, actor, &rule.required_capability)?;

        let note = note.map(str::to_string);
        let event = self.record(instance, rule, actor, AuditAction::Approve, note.clone())?;

        if note.is_some() {
            instance.approval_note = note;
        }
        instance.record_transition(rule.to_stage, actor, event.occurred_at);
        Ok(event)
    }

    /// `approve` against a copy read at `persisted_version`.
    ///
    /// Fails with `InvalidState::StaleInstance` before any other check when
    /// the copy's version differs, so a caller holding an outdated copy
    /// cannot advance the same stage twice.
    pub fn approve_at(
        &self,
        instance: &mut WorkflowInstance,
        actor: &ActorId,
        note: Option<&str>,
        persisted_version: u64,
    ) -> ApprovalResult<AuditEvent> {
        self.ensure_fresh(instance, persisted_version)?;
        self.approve(instance, actor, note)
    }

    /// `reject` with the same stale-copy check as [`Self::approve_at`]
    pub fn reject_at(
        &self,
        instance: &mut WorkflowInstance,
        actor: &ActorId,
        note: &str,
        persisted_version: u64,
    ) -> ApprovalResult<AuditEvent> {
        self.ensure_fresh(instance, persisted_version)?;
        self.reject(instance, actor, note)
    }

    /// Send the instance back along its reject rule.
    ///
    /// A blank note fails with `ValidationError` before anything else is
    /// checked.
    pub fn reject(
        &self,
        instance: &mut WorkflowInstance,
        actor: &ActorId,
        note: &str,
    ) -> ApprovalResult<AuditEvent> {
        let note = note.trim();
        if note.is_empty() {
            return Err(ApprovalError::Validation(
                "a rejection note is required".into(),
            ));
        }

        let rule = self.reject_rule(instance)?;
        self.authorize(instance, actor, &rule.required_capability)?;

        let event = self.record(instance, rule, actor, AuditAction::Reject, Some(note.to_string()))?;

        instance.rejection_note = Some(note.to_string());
        instance.record_transition(rule.to_stage, actor, event.occurred_at);
        Ok(event)
    }

    /// Display name of a stage in `locale`, falling back to the default
    /// locale and then to the stage code. Unknown stage ids yield the
    /// configured unknown label.
    pub fn get_status_label(&self, stage_id: StageId, locale: &str) -> String {
        let Some(stage) = self.definition.catalog().stage(stage_id) else {
            tracing::debug!(stage = %stage_id, "Label requested for unknown stage");
            return self.settings.unknown_label.clone();
        };

        stage
            .display_name
            .get(locale)
            .or_else(|| stage.display_name.get(&self.settings.default_locale))
            .unwrap_or(stage.code.as_str())
            .to_string()
    }

    pub fn status_label(&self, instance: &WorkflowInstance, locale: &str) -> String {
        self.get_status_label(instance.current_stage_id, locale)
    }

    pub fn current_stage<'a>(&'a self, instance: &WorkflowInstance) -> ApprovalResult<&'a Stage> {
        self.definition
            .catalog()
            .get_stage(&instance.workflow_type, instance.current_stage_id)
    }

    pub fn is_terminal(&self, instance: &WorkflowInstance) -> ApprovalResult<bool> {
        Ok(self.current_stage(instance)?.is_terminal())
    }

    // ── Internal helpers ─────────────────────────────────────────────

    fn forward_rule(&self, instance: &WorkflowInstance) -> ApprovalResult<&TransitionRule> {
        let stage = self.current_stage(instance)?;
        if stage.is_terminal() {
            return Err(InvalidState::TerminalStage(stage.id).into());
        }
        if stage.is_placeholder {
            return Err(InvalidState::PlaceholderStage(stage.id).into());
        }
        self.definition
            .forward_rule(&instance.workflow_type, stage.id)?
            .ok_or_else(|| InvalidState::TerminalStage(stage.id).into())
    }

    fn reject_rule(&self, instance: &WorkflowInstance) -> ApprovalResult<&TransitionRule> {
        let stage = self.current_stage(instance)?;
        if stage.is_terminal() {
            return Err(InvalidState::TerminalStage(stage.id).into());
        }
        if stage.is_placeholder {
            return Err(InvalidState::PlaceholderStage(stage.id).into());
        }
        self.definition
            .reject_rule(&instance.workflow_type, stage.id)?
            .ok_or_else(|| InvalidState::NoRejectRule(stage.id).into())
    }

    fn ensure_fresh(&self, instance: &WorkflowInstance, persisted_version: u64) -> ApprovalResult<()> {
        instance.ensure_version(persisted_version).inspect_err(|_| {
            tracing::warn!(
                instance = %instance.id,
                version = instance.version,
                persisted_version,
                "Transition on stale instance refused"
            );
        })
    }

    fn authorize(
        &self,
        instance: &WorkflowInstance,
        actor: &ActorId,
        capability: &Capability,
    ) -> ApprovalResult<()> {
        if self.oracle.has_capability(actor, capability) {
            return Ok(());
        }
        tracing::warn!(
            instance = %instance.id,
            workflow_type = %instance.workflow_type,
            stage = %instance.current_stage_id,
            actor = %actor,
            capability = %capability,
            "Transition denied"
        );
        Err(ApprovalError::PermissionDenied {
            actor: actor.clone(),
            capability: capability.clone(),
            stage: instance.current_stage_id,
        })
    }

    fn record(
        &self,
        instance: &WorkflowInstance,
        rule: &TransitionRule,
        actor: &ActorId,
        action: AuditAction,
        note: Option<String>,
    ) -> ApprovalResult<AuditEvent> {
        let event = AuditEvent::new(
            instance.id.clone(),
            instance.workflow_type.clone(),
            rule.from_stage,
            rule.to_stage,
            actor.clone(),
            action,
        )
        .with_note(note);

        if let Err(e) = self.audit.record(&event) {
            tracing::error!(
                instance = %instance.id,
                event = %event,
                error = %e,
                "Audit sink refused event; transition aborted"
            );
            return Err(e.into());
        }

        tracing::info!(
            instance = %instance.id,
            workflow_type = %instance.workflow_type,
            from = %rule.from_stage,
            to = %rule.to_stage,
            actor = %actor,
            action = %action,
            "Transition applied"
        );
        Ok(event)
    }
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("workflow_types", &self.definition.workflow_types().count())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
