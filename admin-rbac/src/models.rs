//! RBAC entities
//!
//! Rows of the `roles`, `permissions`, `role_permissions` and `user_roles`
//! tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use admin_core::Record;

use crate::catalog::CatalogPermission;
use crate::slug::PermissionSlug;

/// A named authority level.
///
/// `parent_role_id` records a single parent, forming a tree. The hierarchy
/// is stored for display and administration only; permission checks use a
/// role's own assignments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    /// Primary key.
    #[serde(default)]
    pub id: u64,

    /// Display name.
    pub name: String,

    /// Unique slug (e.g. "super-admin").
    #[serde(default)]
    pub slug: String,

    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Authority rank; higher means more authority.
    #[serde(default)]
    pub level: i32,

    /// Parent role.
    #[serde(default)]
    pub parent_role_id: Option<u64>,

    /// Whether the role is active.
    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Creation timestamp.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Create an active role without a parent.
    pub fn new(name: impl Into<String>, slug: impl Into<String>, level: i32) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.into(),
            slug: slug.into(),
            description: None,
            level,
            parent_role_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the parent role.
    pub fn with_parent(mut self, parent_role_id: u64) -> Self {
        self.parent_role_id = Some(parent_role_id);
        self
    }
}

impl Record for Role {
    const TABLE: &'static str = "roles";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn unique_fields() -> &'static [&'static str] {
        &["slug"]
    }
}

/// A grantable `(resource, action)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    /// Primary key.
    #[serde(default)]
    pub id: u64,

    /// Display name.
    pub name: String,

    /// Unique slug, `<resource>.<action>` or `<resource>_<action>`.
    pub slug: String,

    /// Matrix grouping.
    #[serde(default)]
    pub category: String,

    /// Resource part.
    #[serde(default)]
    pub resource: String,

    /// Action part.
    #[serde(default)]
    pub action: String,

    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether the permission is active.
    #[serde(default = "default_true")]
    pub is_active: bool,

    /// Only grants access to records the actor owns.
    #[serde(default)]
    pub requires_ownership: bool,

    /// Holders may grant it to others.
    #[serde(default)]
    pub can_delegate: bool,

    /// Creation timestamp.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    /// Create an active permission from a slug in either format.
    ///
    /// Returns `None` if the slug does not parse.
    pub fn from_slug(slug: &str, category: impl Into<String>) -> Option<Self> {
        let parsed = PermissionSlug::parse(slug)?;
        let now = Utc::now();
        Some(Self {
            id: 0,
            name: format!("{} {}", parsed.action, parsed.resource),
            slug: slug.trim().to_string(),
            category: category.into(),
            resource: parsed.resource,
            action: parsed.action,
            description: None,
            is_active: true,
            requires_ownership: false,
            can_delegate: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// Parsed slug.
    pub fn parsed_slug(&self) -> Option<PermissionSlug> {
        PermissionSlug::parse(&self.slug)
    }

    /// Overwrite catalog-owned fields, keeping identity and flags.
    pub fn apply_catalog(&mut self, entry: &CatalogPermission) {
        self.name = entry.name.clone();
        self.category = entry.category.clone();
        self.resource = entry.resource.clone();
        self.action = entry.action.clone();
        self.description = Some(entry.description.clone());
        self.is_active = true;
        self.updated_at = Utc::now();
    }
}

impl From<&CatalogPermission> for Permission {
    fn from(entry: &CatalogPermission) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: entry.name.clone(),
            slug: entry.slug.clone(),
            category: entry.category.clone(),
            resource: entry.resource.clone(),
            action: entry.action.clone(),
            description: Some(entry.description.clone()),
            is_active: true,
            requires_ownership: false,
            can_delegate: false,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Permission {
    const TABLE: &'static str = "permissions";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn unique_fields() -> &'static [&'static str] {
        &["slug"]
    }
}

/// Role ↔ permission assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolePermission {
    /// Primary key.
    #[serde(default)]
    pub id: u64,
    /// Role.
    pub role_id: u64,
    /// Permission.
    pub permission_id: u64,
    /// Whether the assignment is active.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Creation timestamp.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl RolePermission {
    /// Create an active assignment.
    pub fn new(role_id: u64, permission_id: u64) -> Self {
        Self {
            id: 0,
            role_id,
            permission_id,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

impl Record for RolePermission {
    const TABLE: &'static str = "role_permissions";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

/// User ↔ role assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRole {
    /// Primary key.
    #[serde(default)]
    pub id: u64,
    /// User.
    pub user_id: u64,
    /// Role.
    pub role_id: u64,
    /// When the role was assigned.
    #[serde(default = "Utc::now")]
    pub assigned_at: DateTime<Utc>,
    /// Whether the assignment is active.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Free-form note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl UserRole {
    /// Create an active assignment.
    pub fn new(user_id: u64, role_id: u64) -> Self {
        Self {
            id: 0,
            user_id,
            role_id,
            assigned_at: Utc::now(),
            is_active: true,
            notes: None,
        }
    }

    /// Attach a note.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

impl Record for UserRole {
    const TABLE: &'static str = "user_roles";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_defaults_from_payload() {
        let role: Role = serde_json::from_value(json!({"name": "Auditor"})).unwrap();
        assert_eq!(role.id, 0);
        assert!(role.is_active);
        assert_eq!(role.level, 0);
        assert!(role.parent_role_id.is_none());
    }

    #[test]
    fn test_permission_from_either_slug() {
        let dotted = Permission::from_slug("books.export", "Content").unwrap();
        let underscored = Permission::from_slug("books_export", "Content").unwrap();
        assert_eq!(dotted.resource, "books");
        assert_eq!(underscored.action, "export");
        assert_eq!(underscored.slug, "books_export");
        assert_eq!(dotted.parsed_slug(), underscored.parsed_slug());
        assert!(Permission::from_slug("books", "Content").is_none());
    }

    #[test]
    fn test_unique_fields() {
        assert_eq!(Role::unique_fields(), &["slug"]);
        assert_eq!(Permission::unique_fields(), &["slug"]);
        assert!(RolePermission::unique_fields().is_empty());
    }

    #[test]
    fn test_row_field_access() {
        let assignment = RolePermission::new(5, 11);
        assert_eq!(assignment.field("role_id"), Some(json!(5)));
        assert_eq!(assignment.field("is_active"), Some(json!(true)));
    }
}
