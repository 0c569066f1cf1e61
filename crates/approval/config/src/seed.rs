//! TOML stage seed
//!
//! A seed document lists every workflow type with its stages and, for types
//! that do not follow the standard chain, explicit transition rules. Building
//! a seed validates the catalog and the rule graph once at startup; the
//! resulting [`ApprovalSetup`] is shared read-only by all engines.

use crate::logging::LoggingConfig;
use approval_engine::{
    AuditSink, CapabilityOracle, ChainPolicy, EngineSettings, RejectPolicy, StatusCatalog,
    WorkflowDefinition, WorkflowEngine,
};
use approval_types::{
    ApprovalError, ApprovalResult, Capability, Direction, Stage, StageId, TransitionRule,
    WorkflowType,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

const STANDARD_SEED: &str = include_str!("../seeds/standard.toml");

/// Root of a seed document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub settings: EngineSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub workflows: Vec<WorkflowSeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSeed {
    pub workflow_type: String,
    /// Ignored when `rules` is non-empty
    #[serde(default)]
    pub reject_policy: RejectPolicy,
    pub stages: Vec<StageSeed>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleSeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSeed {
    pub id: u32,
    pub code: String,
    pub sequence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal: Option<TerminalKind>,
    #[serde(default)]
    pub placeholder: bool,
    #[serde(default)]
    pub names: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalKind {
    Approved,
    Rejected,
}

/// An explicit transition, for chains the standard policy does not describe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSeed {
    pub from: u32,
    pub to: u32,
    pub direction: Direction,
    pub capability: String,
}

/// Validated, shareable result of building a seed
#[derive(Debug, Clone)]
pub struct ApprovalSetup {
    pub catalog: Arc<StatusCatalog>,
    pub definition: Arc<WorkflowDefinition>,
    pub settings: EngineSettings,
}

impl SeedConfig {
    pub fn from_toml_str(content: &str) -> ApprovalResult<Self> {
        toml::from_str(content)
            .map_err(|e| ApprovalError::Config(format!("Failed to parse seed: {}", e)))
    }

    /// Load a seed file. Unlike runtime settings there is no fallback: a
    /// missing seed is a configuration error.
    pub fn load(path: impl AsRef<Path>) -> ApprovalResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ApprovalError::Config(format!("Failed to read seed {}: {}", path.display(), e))
        })?;
        let seed = Self::from_toml_str(&content)?;
        tracing::info!(
            path = %path.display(),
            workflow_types = seed.workflows.len(),
            "Loaded stage seed"
        );
        Ok(seed)
    }

    /// The bundled seed for the facility, residence, device and expenditure
    /// subsystems
    pub fn standard() -> ApprovalResult<Self> {
        Self::from_toml_str(STANDARD_SEED)
    }

    pub fn to_toml_string(&self) -> ApprovalResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ApprovalError::Config(format!("Failed to serialize seed: {}", e)))
    }

    pub fn build(&self) -> ApprovalResult<ApprovalSetup> {
        let mut seen = HashSet::new();
        for workflow in &self.workflows {
            if !seen.insert(workflow.workflow_type.as_str()) {
                return Err(ApprovalError::Config(format!(
                    "workflow type {} is listed more than once",
                    workflow.workflow_type
                )));
            }
        }

        let stages = self
            .workflows
            .iter()
            .flat_map(|w| w.stages.iter().map(move |s| s.to_stage(&w.workflow_type)));
        let catalog = Arc::new(StatusCatalog::new(stages)?);

        let mut builder = WorkflowDefinition::builder(catalog.clone());
        for workflow in &self.workflows {
            let workflow_type = WorkflowType::new(workflow.workflow_type.as_str());
            if workflow.rules.is_empty() {
                builder = builder.policy(workflow_type, ChainPolicy::new(workflow.reject_policy));
            } else {
                builder = builder.rules(
                    workflow
                        .rules
                        .iter()
                        .map(|r| r.to_rule(workflow_type.clone())),
                );
            }
        }
        let definition = Arc::new(builder.build()?);

        tracing::info!(
            stages = catalog.len(),
            workflow_types = self.workflows.len(),
            "Approval setup built"
        );
        Ok(ApprovalSetup {
            catalog,
            definition,
            settings: self.settings.clone(),
        })
    }
}

impl StageSeed {
    fn to_stage(&self, workflow_type: &str) -> Stage {
        let mut stage = Stage::new(
            StageId::new(self.id),
            WorkflowType::new(workflow_type),
            self.code.as_str(),
            self.sequence,
        );
        for (locale, text) in &self.names {
            stage = stage.with_name(locale.as_str(), text.as_str());
        }
        match self.terminal {
            Some(TerminalKind::Approved) => stage = stage.terminal_approved(),
            Some(TerminalKind::Rejected) => stage = stage.terminal_rejected(),
            None => {}
        }
        if self.placeholder {
            stage = stage.placeholder();
        }
        stage
    }
}

impl RuleSeed {
    fn to_rule(&self, workflow_type: WorkflowType) -> TransitionRule {
        let from = StageId::new(self.from);
        let to = StageId::new(self.to);
        let capability = Capability::new(self.capability.as_str());
        match self.direction {
            Direction::Forward => TransitionRule::forward(workflow_type, from, to, capability),
            Direction::Reject => TransitionRule::reject(workflow_type, from, to, capability),
        }
    }
}

impl ApprovalSetup {
    /// An engine over this setup's definition and settings
    pub fn engine(
        &self,
        oracle: Arc<dyn CapabilityOracle>,
        audit: Arc<dyn AuditSink>,
    ) -> WorkflowEngine {
        WorkflowEngine::new(self.definition.clone(), oracle, audit, self.settings.clone())
    }
}
