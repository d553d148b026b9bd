//! The set of known probes and their roles.

use super::{Probe, ProbeRole, RoleClassifier};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Known probes keyed by id. Shared between ingestion (which registers)
/// and analysis (which looks roles up).
#[derive(Clone)]
pub struct ProbeRegistry {
    classifier: Arc<dyn RoleClassifier>,
    probes: Arc<RwLock<BTreeMap<String, ProbeRole>>>,
}

impl ProbeRegistry {
    pub fn new(classifier: Arc<dyn RoleClassifier>) -> Self {
        Self {
            classifier,
            probes: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Register a probe, deriving its role on first sight. Later calls for
    /// the same id return the role fixed at first registration.
    pub fn register(&self, id: &str) -> ProbeRole {
        if let Some(role) = self.role(id) {
            return role;
        }
        let derived = self.classifier.role_for(id);
        self.insert(id, derived)
    }

    /// Register a probe with an explicit role, bypassing the classifier.
    /// An already-registered probe keeps its original role.
    pub fn register_with_role(&self, id: &str, role: ProbeRole) -> ProbeRole {
        self.insert(id, role)
    }

    fn insert(&self, id: &str, role: ProbeRole) -> ProbeRole {
        let mut probes = self.probes.write().unwrap_or_else(|e| e.into_inner());
        let role = *probes.entry(id.to_string()).or_insert_with(|| {
            info!(probe = %id, %role, "Registered probe");
            role
        });
        role
    }

    pub fn role(&self, id: &str) -> Option<ProbeRole> {
        let probes = self.probes.read().unwrap_or_else(|e| e.into_inner());
        probes.get(id).copied()
    }

    /// Snapshot of every known probe.
    pub fn probes(&self) -> Vec<Probe> {
        let probes = self.probes.read().unwrap_or_else(|e| e.into_inner());
        probes
            .iter()
            .map(|(id, role)| Probe {
                id: id.clone(),
                role: *role,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.probes.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ProbeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeRegistry")
            .field("probes", &self.probes())
            .finish()
    }
}
