//! # Actions
//!
//! Defines the actions a permission can grant on a resource.
//! The action name is the second half of a permission slug.

use serde::{Deserialize, Serialize};

/// Actions that can be granted on resources.
///
/// - **View**: Read a record or list records
/// - **Create**: Create new records
/// - **Update**: Modify existing records
/// - **Delete**: Remove records
/// - **Export**: Download resource data
/// - **Import**: Upload resource data
/// - **Assign**: Attach a role or permission to another entity
/// - **Revoke**: Detach a role or permission
/// - **Sync**: Replace an assignment set or re-sync a catalog
///
/// Action names never contain `_` or `.`, so both slug formats split
/// unambiguously.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// View records.
    View,

    /// Create new records.
    Create,

    /// Update existing records.
    Update,

    /// Delete records.
    Delete,

    /// Export resource data.
    Export,

    /// Import resource data.
    Import,

    /// Assign to another entity.
    Assign,

    /// Revoke from another entity.
    Revoke,

    /// Replace or re-sync a set.
    Sync,
}

impl Action {
    /// Get the string representation of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Export => "export",
            Action::Import => "import",
            Action::Assign => "assign",
            Action::Revoke => "revoke",
            Action::Sync => "sync",
        }
    }

    /// Parse action from string representation.
    ///
    /// # Arguments
    ///
    /// * `s` - String to parse (case-insensitive, supports aliases)
    ///
    /// # Returns
    ///
    /// `Some(Action)` if valid, `None` otherwise
    ///
    /// # Example
    ///
    /// ```
    /// use admin_rbac::actions::Action;
    ///
    /// assert_eq!(Action::parse("view"), Some(Action::View));
    /// assert_eq!(Action::parse("read"), Some(Action::View)); // Alias
    /// assert_eq!(Action::parse("edit"), Some(Action::Update)); // Alias
    /// assert_eq!(Action::parse("invalid"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "view" | "read" | "show" | "index" | "list" => Some(Action::View),
            "create" | "store" | "add" => Some(Action::Create),
            "update" | "edit" | "write" => Some(Action::Update),
            "delete" | "destroy" | "remove" => Some(Action::Delete),
            "export" | "download" => Some(Action::Export),
            "import" | "upload" => Some(Action::Import),
            "assign" | "grant" => Some(Action::Assign),
            "revoke" => Some(Action::Revoke),
            "sync" => Some(Action::Sync),
            _ => None,
        }
    }

    /// Get all actions.
    pub fn all() -> Vec<Self> {
        vec![
            Action::View,
            Action::Create,
            Action::Update,
            Action::Delete,
            Action::Export,
            Action::Import,
            Action::Assign,
            Action::Revoke,
            Action::Sync,
        ]
    }

    /// The CRUD actions every resource declares.
    pub fn standard() -> Vec<Self> {
        vec![Action::View, Action::Create, Action::Update, Action::Delete]
    }

    /// Check if this is one of the standard CRUD actions.
    pub fn is_standard(&self) -> bool {
        matches!(
            self,
            Action::View | Action::Create | Action::Update | Action::Delete
        )
    }

    /// Check if this is a destructive action.
    ///
    /// Destructive actions permanently remove data or assignments.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Action::Delete | Action::Revoke | Action::Sync)
    }

    /// Check if this is a read-only action.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Action::View | Action::Export)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
