//! # Permission registry
//!
//! Maps each resource to the actions it declares. The registry is the static
//! catalog the permission table is synced from: every `(resource, action)`
//! pair becomes one permission row, matched by slug.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::error;

use admin_core::{AdminError, AdminResult};

use crate::actions::Action;
use crate::slug::PermissionSlug;

/// A resource and the actions it declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// Resource name, the first half of every slug (e.g. "books").
    pub resource: String,
    /// Display label (e.g. "Books").
    pub label: String,
    /// Matrix grouping (e.g. "Content").
    pub category: String,
    /// Declared actions: the standard CRUD set plus custom ones.
    pub actions: Vec<String>,
}

impl ResourceEntry {
    /// Create an entry declaring the standard CRUD actions.
    pub fn new(
        resource: impl Into<String>,
        label: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            label: label.into(),
            category: category.into(),
            actions: Action::standard()
                .iter()
                .map(|a| a.as_str().to_string())
                .collect(),
        }
    }

    /// Declare additional known actions.
    pub fn with_actions(mut self, actions: &[Action]) -> Self {
        for action in actions {
            self = self.with_custom_action(action.as_str());
        }
        self
    }

    /// Declare a custom action by name.
    pub fn with_custom_action(mut self, action: impl Into<String>) -> Self {
        let action = action.into().trim().to_lowercase();
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
        self
    }

    /// Actions beyond the standard CRUD set.
    pub fn custom_actions(&self) -> Vec<&str> {
        self.actions
            .iter()
            .map(String::as_str)
            .filter(|a| !Action::parse(a).map_or(false, |a| a.is_standard()))
            .collect()
    }

    fn validate(&self) -> AdminResult<()> {
        if self.resource.trim().is_empty() || self.resource.contains('.') {
            return Err(AdminError::invalid_field(
                "resource",
                format!("invalid resource name '{}'", self.resource),
            ));
        }
        for action in &self.actions {
            if action.is_empty() || action.contains(|c: char| c == '.' || c == '_') {
                return Err(AdminError::invalid_field(
                    "action",
                    format!("invalid action '{}' on {}", action, self.resource),
                ));
            }
        }
        Ok(())
    }
}

/// One permission as declared by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPermission {
    /// Dotted slug.
    pub slug: String,
    /// Display name (e.g. "View Books").
    pub name: String,
    /// Matrix grouping.
    pub category: String,
    /// Resource name.
    pub resource: String,
    /// Action name.
    pub action: String,
    /// Description.
    pub description: String,
}

/// Resource → action catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRegistry {
    entries: BTreeMap<String, ResourceEntry>,
}

impl PermissionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog for the admin application's built-in resources.
    ///
    /// # Panics
    ///
    /// Panics if a built-in entry fails [`PermissionRegistry::register`]'s
    /// checks.
    pub fn default_catalog() -> Self {
        let mut registry = Self::new();
        let entries = [
            ResourceEntry::new("books", "Books", "Content")
                .with_actions(&[Action::Export, Action::Import]),
            ResourceEntry::new("users", "Users", "User Management")
                .with_actions(&[Action::Export]),
            ResourceEntry::new("roles", "Roles", "Access Control")
                .with_actions(&[Action::Assign, Action::Revoke]),
            ResourceEntry::new("permissions", "Permissions", "Access Control")
                .with_actions(&[Action::Assign, Action::Revoke, Action::Sync]),
        ];
        for entry in entries {
            registry.must_register(entry);
        }
        registry
    }

    /// Register or replace a resource.
    pub fn register(&mut self, entry: ResourceEntry) -> AdminResult<()> {
        entry.validate()?;
        self.entries.insert(entry.resource.clone(), entry);
        Ok(())
    }

    /// Register, panicking on an invalid entry.
    ///
    /// For built-in catalogs, where a bad resource or action name is a
    /// programming error.
    ///
    /// # Panics
    ///
    /// Panics if the entry fails [`PermissionRegistry::register`]'s checks.
    pub fn must_register(&mut self, entry: ResourceEntry) {
        let resource = entry.resource.clone();
        if let Err(err) = self.register(entry) {
            error!(resource = %resource, error = %err, "Catalog registration failed");
            panic!("catalog registration of '{}' failed: {}", resource, err);
        }
    }

    /// Look up a resource.
    pub fn get(&self, resource: &str) -> AdminResult<&ResourceEntry> {
        self.entries
            .get(resource)
            .ok_or_else(|| AdminError::NotFound(format!("resource '{}' is not registered", resource)))
    }

    /// Slugs a resource declares.
    pub fn permissions_for(&self, resource: &str) -> AdminResult<Vec<PermissionSlug>> {
        Ok(self
            .get(resource)?
            .actions
            .iter()
            .map(|action| PermissionSlug::new(resource, action.as_str()))
            .collect())
    }

    /// Whether a slug (either format) is declared.
    pub fn declares(&self, raw: &str) -> bool {
        PermissionSlug::parse(raw).map_or(false, |slug| {
            self.entries
                .get(&slug.resource)
                .map_or(false, |entry| entry.actions.contains(&slug.action))
        })
    }

    /// Registered resource names, sorted.
    pub fn resources(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Registered entries, sorted by resource.
    pub fn entries(&self) -> impl Iterator<Item = &ResourceEntry> {
        self.entries.values()
    }

    /// Every declared permission.
    pub fn permissions(&self) -> Vec<CatalogPermission> {
        self.entries
            .values()
            .flat_map(|entry| {
                entry.actions.iter().map(move |action| CatalogPermission {
                    slug: PermissionSlug::new(entry.resource.as_str(), action.as_str()).dotted(),
                    name: format!("{} {}", capitalize(action), entry.label),
                    category: entry.category.clone(),
                    resource: entry.resource.clone(),
                    action: action.clone(),
                    description: format!(
                        "Allows the {} action on {}",
                        action,
                        entry.label.to_lowercase()
                    ),
                })
            })
            .collect()
    }

    /// Number of declared permissions.
    pub fn permission_count(&self) -> usize {
        self.entries.values().map(|e| e.actions.len()).sum()
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
