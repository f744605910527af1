//! # RBAC bootstrap
//!
//! Seeds the built-in roles, links them into a hierarchy, syncs the
//! permission catalog and applies the default grants. Safe to run on every
//! startup: roles are upserted by slug and grants are applied with a sync.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use admin_core::{AdminResult, Query};

use crate::actions::Action;
use crate::catalog::CatalogPermission;
use crate::matrix::{CatalogSyncReport, PermissionMatrixService};
use crate::models::Role;

/// Built-in roles.
///
/// The hierarchy is: User < Editor < Admin < SuperAdmin. Each role except
/// `SuperAdmin` records the next one up as its parent.
///
/// # Default grants
///
/// - **SuperAdmin**: every catalog permission
/// - **Admin**: everything except permission management beyond viewing
/// - **Editor**: every book permission and viewing users
/// - **User**: viewing books
///
/// # Examples
///
/// ```
/// use admin_rbac::DefaultRole;
///
/// assert_eq!(DefaultRole::Editor.parent(), Some(DefaultRole::Admin));
/// assert_eq!(DefaultRole::parse("super_admin"), Some(DefaultRole::SuperAdmin));
/// assert!(DefaultRole::SuperAdmin.level() > DefaultRole::Admin.level());
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum DefaultRole {
    /// Everyday access.
    User,
    /// Content management.
    Editor,
    /// Application administration.
    Admin,
    /// Unrestricted.
    SuperAdmin,
}

impl DefaultRole {
    /// All built-in roles, highest authority first.
    pub fn all() -> [Self; 4] {
        [Self::SuperAdmin, Self::Admin, Self::Editor, Self::User]
    }

    /// Role slug.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Editor => "editor",
            Self::Admin => "admin",
            Self::SuperAdmin => "super-admin",
        }
    }

    /// Parse a role slug (case-insensitive, `_` accepted for `-`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "user" => Some(Self::User),
            "editor" => Some(Self::Editor),
            "admin" => Some(Self::Admin),
            "super-admin" | "superadmin" => Some(Self::SuperAdmin),
            _ => None,
        }
    }

    /// Display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Editor => "Editor",
            Self::Admin => "Admin",
            Self::SuperAdmin => "Super Admin",
        }
    }

    /// Authority level.
    pub fn level(&self) -> i32 {
        match self {
            Self::User => 10,
            Self::Editor => 50,
            Self::Admin => 80,
            Self::SuperAdmin => 100,
        }
    }

    /// Parent in the built-in hierarchy.
    pub fn parent(&self) -> Option<Self> {
        match self {
            Self::User => Some(Self::Editor),
            Self::Editor => Some(Self::Admin),
            Self::Admin => Some(Self::SuperAdmin),
            Self::SuperAdmin => None,
        }
    }

    /// Description stored on the role row.
    pub fn description(&self) -> &'static str {
        match self {
            Self::User => "Read access to published content",
            Self::Editor => "Manages books and reads user records",
            Self::Admin => "Manages users, roles and content",
            Self::SuperAdmin => "Unrestricted access",
        }
    }

    /// Whether the role receives `permission` by default.
    pub fn grants(&self, permission: &CatalogPermission) -> bool {
        match self {
            Self::SuperAdmin => true,
            Self::Admin => {
                permission.resource != "permissions"
                    || permission.action == Action::View.as_str()
            }
            Self::Editor => {
                permission.resource == "books"
                    || (permission.resource == "users"
                        && permission.action == Action::View.as_str())
            }
            Self::User => {
                permission.resource == "books" && permission.action == Action::View.as_str()
            }
        }
    }
}

/// What a bootstrap run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapReport {
    /// Roles inserted.
    pub roles_created: usize,
    /// Roles already present.
    pub roles_existing: usize,
    /// Catalog sync outcome.
    pub catalog: CatalogSyncReport,
    /// Role slug → number of permissions granted.
    pub grants: BTreeMap<String, usize>,
}

impl PermissionMatrixService {
    /// Seed built-in roles, hierarchy, catalog and default grants.
    ///
    /// Existing roles keep their name, level and activation; only a missing
    /// parent link is filled in. Each built-in role's permission set is
    /// replaced by the default grants.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> AdminResult<BootstrapReport> {
        let mut report = BootstrapReport::default();
        let mut ids: BTreeMap<DefaultRole, u64> = BTreeMap::new();

        for default in DefaultRole::all() {
            let (role, created) = self.upsert_default_role(default).await?;
            if created {
                report.roles_created += 1;
            } else {
                report.roles_existing += 1;
            }
            ids.insert(default, role.id);
        }

        for default in DefaultRole::all() {
            let (Some(parent), Some(id)) = (default.parent(), ids.get(&default)) else {
                continue;
            };
            let Some(parent_id) = ids.get(&parent) else {
                continue;
            };
            let Some(mut role) = self.store().roles.find(*id).await? else {
                continue;
            };
            if role.parent_role_id.is_none() {
                role.parent_role_id = Some(*parent_id);
                self.store().roles.update(role).await?;
                debug!(role = default.as_str(), parent = parent.as_str(), "Linked role parent");
            }
        }

        report.catalog = self.sync_permissions_from_gates().await?;

        let catalog = self.catalog().permissions();
        for default in DefaultRole::all() {
            let Some(role_id) = ids.get(&default) else {
                continue;
            };
            let mut permission_ids = Vec::new();
            for entry in catalog.iter().filter(|entry| default.grants(entry)) {
                permission_ids.push(self.find_permission_by_slug(&entry.slug).await?.id);
            }
            let result = self.sync_role_permissions(*role_id, &permission_ids).await?;
            report
                .grants
                .insert(default.as_str().to_string(), result.current.len());
        }

        info!(
            roles_created = report.roles_created,
            permissions_created = report.catalog.created,
            "RBAC bootstrap complete"
        );
        Ok(report)
    }

    async fn upsert_default_role(&self, default: DefaultRole) -> AdminResult<(Role, bool)> {
        let existing = self
            .store()
            .roles
            .find_one(&Query::new().filter_eq("slug", default.as_str()))
            .await?;
        if let Some(role) = existing {
            return Ok((role, false));
        }

        let role = Role::new(default.display_name(), default.as_str(), default.level())
            .with_description(default.description());
        let role = self.store().roles.create(role).await?;
        info!(role = default.as_str(), role_id = role.id, "Created built-in role");
        Ok((role, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use admin_core::PermissionLookup;

    use crate::catalog::PermissionRegistry;
    use crate::store::RbacStore;

    fn engine() -> PermissionMatrixService {
        PermissionMatrixService::new(
            RbacStore::in_memory(),
            Arc::new(PermissionRegistry::default_catalog()),
        )
    }

    #[test]
    fn test_default_role_parse_round_trip() {
        for role in DefaultRole::all() {
            assert_eq!(DefaultRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(DefaultRole::parse("SUPER_ADMIN"), Some(DefaultRole::SuperAdmin));
        assert_eq!(DefaultRole::parse("guest"), None);
    }

    #[tokio::test]
    async fn test_bootstrap_seeds_roles_and_hierarchy() {
        let service = engine();
        let report = service.bootstrap().await.unwrap();
        assert_eq!(report.roles_created, 4);
        assert_eq!(report.catalog.created, service.catalog().permission_count());

        let admin = service
            .store()
            .roles
            .find_one(&Query::new().filter_eq("slug", "admin"))
            .await
            .unwrap()
            .unwrap();
        let editor = service
            .store()
            .roles
            .find_one(&Query::new().filter_eq("slug", "editor"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(editor.parent_role_id, Some(admin.id));
        assert_eq!(admin.level, 80);

        assert_eq!(
            report.grants.get("super-admin").copied(),
            Some(service.catalog().permission_count())
        );
        assert_eq!(report.grants.get("user").copied(), Some(1));
        assert_eq!(report.grants.get("editor").copied(), Some(7));
    }

    #[tokio::test]
    async fn test_bootstrap_is_repeatable() {
        let service = engine();
        let first = service.bootstrap().await.unwrap();
        let second = service.bootstrap().await.unwrap();

        assert_eq!(second.roles_created, 0);
        assert_eq!(second.roles_existing, 4);
        assert_eq!(second.catalog.created, 0);
        assert_eq!(first.grants, second.grants);
    }

    #[tokio::test]
    async fn test_default_grants_through_user_roles() {
        let service = engine();
        service.bootstrap().await.unwrap();
        let editor = service
            .store()
            .roles
            .find_one(&Query::new().filter_eq("slug", "editor"))
            .await
            .unwrap()
            .unwrap();
        service.assign_role_to_user(21, editor.id, None).await.unwrap();

        let granted = service.user_permissions(21).await.unwrap();
        assert!(granted.has_permission("books_export"));
        assert!(granted.has_permission("users.view"));
        assert!(!granted.has_permission("users.delete"));
        assert!(!granted.has_permission("permissions.sync"));
    }
}
