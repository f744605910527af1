//! RBAC table bundle.

use std::sync::Arc;

use admin_core::{MemoryRepository, Repository};

use crate::models::{Permission, Role, RolePermission, UserRole};

/// Repositories for the four RBAC tables.
#[derive(Clone)]
pub struct RbacStore {
    /// `roles`
    pub roles: Arc<dyn Repository<Role>>,
    /// `permissions`
    pub permissions: Arc<dyn Repository<Permission>>,
    /// `role_permissions`
    pub role_permissions: Arc<dyn Repository<RolePermission>>,
    /// `user_roles`
    pub user_roles: Arc<dyn Repository<UserRole>>,
}

impl std::fmt::Debug for RbacStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RbacStore").finish_non_exhaustive()
    }
}

impl RbacStore {
    /// Bundle existing repositories.
    pub fn new(
        roles: Arc<dyn Repository<Role>>,
        permissions: Arc<dyn Repository<Permission>>,
        role_permissions: Arc<dyn Repository<RolePermission>>,
        user_roles: Arc<dyn Repository<UserRole>>,
    ) -> Self {
        Self {
            roles,
            permissions,
            role_permissions,
            user_roles,
        }
    }

    /// Fresh in-memory tables.
    pub fn in_memory() -> Self {
        Self {
            roles: MemoryRepository::<Role>::shared(),
            permissions: MemoryRepository::<Permission>::shared(),
            role_permissions: MemoryRepository::<RolePermission>::shared(),
            user_roles: MemoryRepository::<UserRole>::shared(),
        }
    }

    /// Replace the `role_permissions` repository.
    pub fn with_role_permissions(mut self, repo: Arc<dyn Repository<RolePermission>>) -> Self {
        self.role_permissions = repo;
        self
    }
}
