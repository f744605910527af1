//! User ↔ role assignment and effective permission lookup.

use std::collections::BTreeSet;

use tracing::{debug, info, instrument};

use admin_core::{AdminError, AdminResult, Query, SortDirection};

use crate::grants::GrantedPermissions;
use crate::matrix::PermissionMatrixService;
use crate::models::{Role, UserRole};

impl PermissionMatrixService {
    /// Assign a role to a user.
    ///
    /// Idempotent: returns `false` when the user already holds the role
    /// actively. An inactive assignment is reactivated.
    #[instrument(skip(self, notes))]
    pub async fn assign_role_to_user(
        &self,
        user_id: u64,
        role_id: u64,
        notes: Option<String>,
    ) -> AdminResult<bool> {
        if user_id == 0 {
            return Err(AdminError::invalid_field("user_id", "user_id must be greater than 0"));
        }
        let role = self.find_role(role_id).await?;
        if !role.is_active {
            return Err(AdminError::invalid_field(
                "role_id",
                format!("role '{}' is inactive", role.slug),
            ));
        }

        let rows = self
            .store()
            .user_roles
            .find_many(&user_role_query(user_id, role_id))
            .await?;

        if rows.iter().any(|row| row.is_active) {
            debug!(user_id, role_id, "Role already assigned");
            return Ok(false);
        }

        match rows.into_iter().next() {
            Some(mut inactive) => {
                inactive.is_active = true;
                inactive.assigned_at = chrono::Utc::now();
                if notes.is_some() {
                    inactive.notes = notes;
                }
                self.store().user_roles.update(inactive).await?;
            }
            None => {
                let mut assignment = UserRole::new(user_id, role_id);
                assignment.notes = notes;
                self.store().user_roles.create(assignment).await?;
            }
        }

        info!(user_id, role = %role.slug, "Role assigned to user");
        Ok(true)
    }

    /// Remove a role from a user; `false` when there was nothing to remove.
    #[instrument(skip(self))]
    pub async fn revoke_role_from_user(&self, user_id: u64, role_id: u64) -> AdminResult<bool> {
        let removed = self
            .store()
            .user_roles
            .delete_where(&user_role_query(user_id, role_id))
            .await?;
        if removed > 0 {
            info!(user_id, role_id, "Role revoked from user");
        }
        Ok(removed > 0)
    }

    /// Active roles a user holds directly, highest level first.
    pub async fn user_roles(&self, user_id: u64) -> AdminResult<Vec<Role>> {
        let role_ids: BTreeSet<u64> = self
            .store()
            .user_roles
            .find_many(
                &Query::new()
                    .filter_eq("user_id", user_id)
                    .filter_eq("is_active", true),
            )
            .await?
            .into_iter()
            .map(|row| row.role_id)
            .collect();

        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .store()
            .roles
            .find_many(
                &Query::new()
                    .filter_in("id", role_ids)
                    .filter_eq("is_active", true)
                    .order_by("level", SortDirection::Desc)
                    .order_by("name", SortDirection::Asc),
            )
            .await?)
    }

    /// Effective permissions of a user.
    ///
    /// The union of the active permissions of the user's active roles.
    /// Parent roles contribute nothing.
    pub async fn user_permissions(&self, user_id: u64) -> AdminResult<GrantedPermissions> {
        let mut granted = GrantedPermissions::new();
        for role in self.user_roles(user_id).await? {
            let permissions = self.role_permissions(role.id).await?;
            granted.extend(&GrantedPermissions::from_permissions(&permissions));
        }
        Ok(granted)
    }
}

fn user_role_query(user_id: u64, role_id: u64) -> Query {
    Query::new()
        .filter_eq("user_id", user_id)
        .filter_eq("role_id", role_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use admin_core::PermissionLookup;

    use crate::catalog::PermissionRegistry;
    use crate::store::RbacStore;

    async fn engine() -> PermissionMatrixService {
        let service = PermissionMatrixService::new(
            RbacStore::in_memory(),
            Arc::new(PermissionRegistry::default_catalog()),
        );
        service.sync_permissions_from_gates().await.unwrap();
        service
    }

    #[tokio::test]
    async fn test_assign_role_is_idempotent() {
        let service = engine().await;
        let role = service
            .store()
            .roles
            .create(Role::new("Editor", "editor", 50))
            .await
            .unwrap();

        assert!(service
            .assign_role_to_user(7, role.id, Some("onboarding".into()))
            .await
            .unwrap());
        assert!(!service.assign_role_to_user(7, role.id, None).await.unwrap());

        let roles = service.user_roles(7).await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].slug, "editor");

        assert!(service.revoke_role_from_user(7, role.id).await.unwrap());
        assert!(!service.revoke_role_from_user(7, role.id).await.unwrap());
        assert!(service.user_roles(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_assign_rejects_unknown_or_inactive_role() {
        let service = engine().await;
        let err = service.assign_role_to_user(7, 42, None).await.unwrap_err();
        assert!(matches!(err, AdminError::NotFound(_)));

        let mut role = Role::new("Retired", "retired", 1);
        role.is_active = false;
        let role = service.store().roles.create(role).await.unwrap();
        let err = service.assign_role_to_user(7, role.id, None).await.unwrap_err();
        assert_eq!(err.field(), Some("role_id"));

        let err = service.assign_role_to_user(0, role.id, None).await.unwrap_err();
        assert_eq!(err.field(), Some("user_id"));
    }

    #[tokio::test]
    async fn test_user_permissions_ignore_parent_roles() {
        let service = engine().await;
        let admin = service
            .store()
            .roles
            .create(Role::new("Admin", "admin", 80))
            .await
            .unwrap();
        let editor = service
            .store()
            .roles
            .create(Role::new("Editor", "editor", 50).with_parent(admin.id))
            .await
            .unwrap();

        let delete = service.find_permission_by_slug("books.delete").await.unwrap();
        let view = service.find_permission_by_slug("books_view").await.unwrap();
        service.assign_permission_to_role(admin.id, delete.id).await.unwrap();
        service.assign_permission_to_role(editor.id, view.id).await.unwrap();
        service.assign_role_to_user(3, editor.id, None).await.unwrap();

        let granted = service.user_permissions(3).await.unwrap();
        assert!(granted.has_permission("books_view"));
        assert!(!granted.has_permission("books.delete"));
        assert_eq!(granted.len(), 1);
    }
}
