//! Capability oracle: the external authorization predicate
//!
//! The engine never defines or stores permissions. It asks an injected
//! oracle whether an actor holds a named capability.

use approval_types::{ActorId, Capability};
use std::collections::{HashMap, HashSet};

/// Answers "does this actor hold this capability?"
pub trait CapabilityOracle: Send + Sync {
    fn has_capability(&self, actor: &ActorId, capability: &Capability) -> bool;
}

impl<F> CapabilityOracle for F
where
    F: Fn(&ActorId, &Capability) -> bool + Send + Sync,
{
    fn has_capability(&self, actor: &ActorId, capability: &Capability) -> bool {
        self(actor, capability)
    }
}

/// Static actor → capability table.
///
/// Suits tests and deployments whose grants are known at startup.
#[derive(Clone, Debug, Default)]
pub struct CapabilityGrants {
    grants: HashMap<ActorId, HashSet<Capability>>,
}

impl CapabilityGrants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, actor: ActorId, capability: Capability) -> Self {
        self.grants.entry(actor).or_default().insert(capability);
        self
    }

    pub fn grant_all(mut self, actor: ActorId, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.grants.entry(actor).or_default().extend(capabilities);
        self
    }

    pub fn capabilities_of(&self, actor: &ActorId) -> impl Iterator<Item = &Capability> {
        self.grants.get(actor).into_iter().flatten()
    }
}

impl CapabilityOracle for CapabilityGrants {
    fn has_capability(&self, actor: &ActorId, capability: &Capability) -> bool {
        self.grants
            .get(actor)
            .map(|caps| caps.contains(capability))
            .unwrap_or(false)
    }
}
