//! Contract registries
//!
//! Registries are built once at startup, validated as entries are added, and
//! then shared read-only (typically behind an `Arc`). A candidate becomes
//! reachable only after it exposes every required capability.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::contracts::{missing_operations, Capability, Contract, ControllerContract, ServiceContract};
use crate::error::{AdminError, AdminResult};

/// Registry of resource services.
pub type ServiceRegistry = ContractRegistry<dyn ServiceContract>;

/// Registry of resource controllers.
pub type ControllerRegistry = ContractRegistry<dyn ControllerContract>;

/// Outcome of checking one registered entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCheck {
    /// Registration name.
    pub name: String,
    /// Whether every required operation is present.
    pub passed: bool,
    /// Missing operation names.
    pub missing: Vec<String>,
}

/// Per-name conformance report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// One entry per registered name, in name order.
    pub entries: Vec<ContractCheck>,
}

impl ValidationReport {
    /// Whether every entry passed.
    pub fn all_passed(&self) -> bool {
        self.entries.iter().all(|e| e.passed)
    }

    /// Entries that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ContractCheck> {
        self.entries.iter().filter(|e| !e.passed)
    }
}

/// Name-keyed registry of contract implementations.
pub struct ContractRegistry<C: ?Sized + Contract> {
    kind: &'static str,
    required: Vec<Capability>,
    entries: BTreeMap<String, Arc<C>>,
}

impl<C: ?Sized + Contract> std::fmt::Debug for ContractRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractRegistry")
            .field("kind", &self.kind)
            .field("required", &self.required)
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ServiceRegistry {
    /// Registry requiring the full service surface.
    pub fn for_services() -> Self {
        Self::new("service", Capability::service_surface())
    }
}

impl ControllerRegistry {
    /// Registry requiring the full controller surface.
    pub fn for_controllers() -> Self {
        Self::new("controller", Capability::controller_surface())
    }
}

impl<C: ?Sized + Contract> ContractRegistry<C> {
    /// Create a registry requiring `required` capabilities.
    pub fn new(kind: &'static str, required: Vec<Capability>) -> Self {
        Self {
            kind,
            required,
            entries: BTreeMap::new(),
        }
    }

    /// Replace the required capability set.
    pub fn with_required(mut self, required: Vec<Capability>) -> Self {
        self.required = required;
        self
    }

    /// Required capabilities.
    pub fn required(&self) -> &[Capability] {
        &self.required
    }

    /// Check a candidate without registering it.
    pub fn check(&self, name: &str, candidate: &C) -> ContractCheck {
        let missing = missing_operations(&self.required, &candidate.capabilities());
        ContractCheck {
            name: name.to_string(),
            passed: missing.is_empty(),
            missing,
        }
    }

    /// Validate and register a candidate.
    ///
    /// Fails with `ContractViolation` listing every missing operation.
    /// Re-registering a name replaces the previous entry.
    pub fn register(&mut self, name: impl Into<String>, candidate: Arc<C>) -> AdminResult<()> {
        let name = name.into();
        let check = self.check(&name, candidate.as_ref());
        if !check.passed {
            return Err(AdminError::ContractViolation {
                name,
                missing: check.missing,
            });
        }

        if self.entries.insert(name.clone(), candidate).is_some() {
            debug!(kind = self.kind, name = %name, "Replaced registration");
        } else {
            info!(kind = self.kind, name = %name, "Registered");
        }
        Ok(())
    }

    /// Register, panicking on a contract violation.
    ///
    /// For startup wiring, where a missing capability is a programming error.
    ///
    /// # Panics
    ///
    /// Panics if the candidate does not satisfy the registry's contract.
    pub fn must_register(&mut self, name: impl Into<String>, candidate: Arc<C>) {
        if let Err(err) = self.register(name, candidate) {
            error!(kind = self.kind, error = %err, "Contract registration failed");
            panic!("{} registration failed: {}", self.kind, err);
        }
    }

    /// Look up an entry.
    pub fn get(&self, name: &str) -> AdminResult<Arc<C>> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| AdminError::NotFound(format!("{} '{}' is not registered", self.kind, name)))
    }

    /// Whether a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-check every entry.
    pub fn validate_all(&self) -> ValidationReport {
        ValidationReport {
            entries: self
                .entries
                .iter()
                .map(|(name, candidate)| self.check(name, candidate.as_ref()))
                .collect(),
        }
    }
}
