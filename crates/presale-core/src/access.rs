use crate::types::AccountId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Operation classes a caller may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Record purchases against the active stage.
    Recorder,
    /// Configure and activate stages.
    StageManager,
    /// Close the presale permanently.
    Finalizer,
    /// Pause/unpause and adjust the promo ceiling.
    Admin,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Recorder => "recorder",
            Capability::StageManager => "stage-manager",
            Capability::Finalizer => "finalizer",
            Capability::Admin => "admin",
        };
        write!(f, "{}", name)
    }
}

/// Yes/no authorization decisions for capability-gated operations.
/// Identity validation happens upstream; the engine only asks whether
/// the presented actor holds the capability.
pub trait AccessGate: Send + Sync {
    fn allows(&self, actor: &AccountId, capability: Capability) -> bool;
}

/// Grants every capability to every actor. For tests and local runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllGate;

impl AccessGate for AllowAllGate {
    fn allows(&self, _actor: &AccountId, _capability: Capability) -> bool {
        true
    }
}

/// Explicit per-actor grant table.
#[derive(Debug, Clone, Default)]
pub struct StaticAccessGate {
    grants: HashMap<AccountId, BTreeSet<Capability>>,
}

impl StaticAccessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one capability grant for the actor.
    pub fn grant(mut self, actor: impl Into<String>, capability: Capability) -> Self {
        self.grants
            .entry(AccountId::new(actor))
            .or_default()
            .insert(capability);
        self
    }
}

impl AccessGate for StaticAccessGate {
    fn allows(&self, actor: &AccountId, capability: Capability) -> bool {
        self.grants
            .get(actor)
            .map(|caps| caps.contains(&capability))
            .unwrap_or(false)
    }
}
