//! Audit sinks: where transition events go
//!
//! Every transition is recorded before the instance is mutated, so a sink
//! failure aborts the transition. `InMemoryAuditLog` keeps an ordered
//! per-instance chain that can be replayed to see exactly how a request
//! moved through its reviewers.

use approval_types::{AuditError, AuditEvent, InstanceId, StageId};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Receives audit events from the engine
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Ordered audit events indexed by instance
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    events: RwLock<HashMap<InstanceId, Vec<AuditEvent>>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events for an instance, oldest first
    pub fn events_for(&self, instance_id: &InstanceId) -> Vec<AuditEvent> {
        self.read()
            .map(|events| events.get(instance_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn event_count(&self, instance_id: &InstanceId) -> usize {
        self.read()
            .map(|events| events.get(instance_id).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn latest_for(&self, instance_id: &InstanceId) -> Option<AuditEvent> {
        self.read()
            .ok()
            .and_then(|events| events.get(instance_id).and_then(|v| v.last().cloned()))
    }

    /// Events for an instance that entered or left `stage`
    pub fn events_for_stage(&self, instance_id: &InstanceId, stage: StageId) -> Vec<AuditEvent> {
        self.events_for(instance_id)
            .into_iter()
            .filter(|e| e.involves_stage(stage))
            .collect()
    }

    /// Total events across all instances
    pub fn total_events(&self) -> usize {
        self.read()
            .map(|events| events.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn clear(&self, instance_id: &InstanceId) {
        if let Ok(mut events) = self.events.write() {
            events.remove(instance_id);
        }
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<InstanceId, Vec<AuditEvent>>>, AuditError>
    {
        self.events
            .read()
            .map_err(|_| AuditError::Unavailable("audit log lock poisoned".into()))
    }
}

impl AuditSink for InMemoryAuditLog {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let mut events = self
            .events
            .write()
            .map_err(|_| AuditError::Unavailable("audit log lock poisoned".into()))?;
        tracing::trace!(
            instance = %event.instance_id,
            event = %event,
            "Audit event stored"
        );
        events
            .entry(event.instance_id.clone())
            .or_default()
            .push(event.clone());
        Ok(())
    }
}

/// Writes each event to the `tracing` pipeline under the `approval::audit`
/// target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        tracing::info!(
            target: "approval::audit",
            event_id = %event.event_id,
            instance = %event.instance_id,
            workflow_type = %event.workflow_type,
            from = %event.from,
            to = %event.to,
            actor = %event.actor,
            action = %event.action,
            note = event.note.as_deref().unwrap_or(""),
            occurred_at = %event.occurred_at,
            "Approval transition"
        );
        Ok(())
    }
}

/// Forwards each event to several sinks in order; the first failure stops
/// the fan-out and is returned.
#[derive(Clone, Default)]
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AuditSink for FanoutAuditSink {
    fn record(&self, event: &AuditEvent) -> Result<(), AuditError> {
        for sink in &self.sinks {
            sink.record(event)?;
        }
        Ok(())
    }
}
