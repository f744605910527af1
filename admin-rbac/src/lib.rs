//! # Admin RBAC (Role-Based Access Control)
//!
//! Roles, permissions and the permission matrix for the admin application.
//!
//! ## Overview
//!
//! The admin-rbac crate handles:
//! - **Actions**: operations a permission can grant
//! - **Slugs**: `<resource>.<action>` and `<resource>_<action>`, accepted as aliases
//! - **Catalog**: the resource → action registry the permission table is synced from
//! - **Matrix engine**: role × permission grid, assignment, bulk and sync
//! - **User roles**: user → role assignment and effective permission sets
//! - **Role service**: the `roles` resource built on the base resource service
//! - **Bootstrap**: built-in roles, hierarchy and default grants
//!
//! ## Architecture
//!
//! ```text
//! Permission = Resource + Action
//!
//! Examples:
//!   "books.view"          - dotted slug
//!   "books_view"          - underscored alias of the same permission
//!   "permissions.sync"    - custom catalog action
//! ```
//!
//! ## Atomicity
//!
//! `sync_role_permissions` runs inside a transaction and restores the prior
//! assignment set on any failure. Bulk assign/revoke is sequential and
//! fail-fast: earlier iterations stay committed.
//!
//! ## Role Hierarchy
//!
//! Roles carry a single `parent_role_id`. The chain is stored for
//! administration only; permission checks use a role's own assignments.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use admin_rbac::{PermissionMatrixService, PermissionRegistry, PermissionSlug, RbacStore};
//!
//! let slug = PermissionSlug::parse("books_export").unwrap();
//! assert_eq!(slug.dotted(), "books.export");
//!
//! let engine = PermissionMatrixService::new(
//!     RbacStore::in_memory(),
//!     Arc::new(PermissionRegistry::default_catalog()),
//! );
//! # let _ = engine;
//! ```

pub mod actions;
pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod grants;
pub mod matrix;
pub mod models;
pub mod roles;
pub mod slug;
pub mod store;
pub mod user_roles;

// Re-export main types for convenience
pub use actions::Action;
pub use bootstrap::{BootstrapReport, DefaultRole};
pub use catalog::{CatalogPermission, PermissionRegistry, ResourceEntry};
pub use config::RbacConfig;
pub use grants::GrantedPermissions;
pub use matrix::{
    BulkAction, BulkAssignRequest, CatalogSyncReport, MatrixStats, PermissionMatrix,
    PermissionMatrixService, RoleWithPermissions, SyncResult,
};
pub use models::{Permission, Role, RolePermission, UserRole};
pub use roles::{slugify, RoleRules, RoleService};
pub use slug::{canonical, PermissionSlug, SlugFormat};
pub use store::RbacStore;
