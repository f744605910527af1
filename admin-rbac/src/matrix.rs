//! # Permission matrix engine
//!
//! The authoritative view and mutator of role → permission assignment.
//!
//! ## Atomicity
//!
//! | Operation                      | Transactional |
//! |--------------------------------|---------------|
//! | `assign_permission_to_role`    | single write  |
//! | `revoke_permission_from_role`  | single write  |
//! | `bulk_assign_permissions`      | no            |
//! | `sync_role_permissions`        | yes           |
//!
//! A bulk request that fails part-way leaves earlier iterations committed
//! and reports how many succeeded. A sync that fails at any step restores
//! the role's previous assignment set.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use admin_core::{validate_bulk_ids, AdminError, AdminResult, BulkSummary, Query, SortDirection};

use crate::catalog::{CatalogPermission, PermissionRegistry};
use crate::config::RbacConfig;
use crate::models::{Permission, Role, RolePermission};
use crate::slug::PermissionSlug;
use crate::store::RbacStore;

/// A role with the ids of its active permissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleWithPermissions {
    /// The role.
    pub role: Role,
    /// Assigned permission ids, ascending.
    pub permission_ids: Vec<u64>,
}

/// Aggregate counts over the RBAC tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixStats {
    /// All roles.
    pub total_roles: u64,
    /// Active roles.
    pub active_roles: u64,
    /// All permissions.
    pub total_permissions: u64,
    /// Active permissions.
    pub active_permissions: u64,
    /// All assignment rows.
    pub total_assignments: u64,
    /// Active assignment rows.
    pub active_assignments: u64,
    /// Distinct categories among active permissions.
    pub categories: usize,
}

/// The complete role × permission grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionMatrix {
    /// Active roles ordered by level descending, then name.
    pub roles: Vec<RoleWithPermissions>,
    /// Active permissions ordered by category, then action.
    pub permissions: Vec<Permission>,
    /// Role id → assigned permission ids.
    pub matrix: BTreeMap<u64, Vec<u64>>,
    /// Category → permission ids, in permission order.
    pub categories: BTreeMap<String, Vec<u64>>,
    /// Aggregate counts.
    pub stats: MatrixStats,
}

impl PermissionMatrix {
    /// Whether a role holds a permission.
    pub fn has(&self, role_id: u64, permission_id: u64) -> bool {
        self.matrix
            .get(&role_id)
            .map_or(false, |ids| ids.contains(&permission_id))
    }

    /// Permission ids of a role (empty for unknown roles).
    pub fn permissions_of(&self, role_id: u64) -> &[u64] {
        self.matrix.get(&role_id).map_or(&[], Vec::as_slice)
    }
}

/// Direction of a bulk request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    /// Assign every listed permission.
    Assign,
    /// Revoke every listed permission.
    Revoke,
}

impl BulkAction {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Assign => "assign",
            BulkAction::Revoke => "revoke",
        }
    }
}

/// Bulk assign/revoke request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAssignRequest {
    /// Target role.
    pub role_id: u64,
    /// Permissions to assign or revoke, processed in order.
    pub permission_ids: Vec<u64>,
    /// Direction.
    pub action: BulkAction,
}

impl BulkAssignRequest {
    /// Assign `permission_ids` to `role_id`.
    pub fn assign(role_id: u64, permission_ids: Vec<u64>) -> Self {
        Self {
            role_id,
            permission_ids,
            action: BulkAction::Assign,
        }
    }

    /// Revoke `permission_ids` from `role_id`.
    pub fn revoke(role_id: u64, permission_ids: Vec<u64>) -> Self {
        Self {
            role_id,
            permission_ids,
            action: BulkAction::Revoke,
        }
    }
}

/// Outcome of a whole-role sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Role synced.
    pub role_id: u64,
    /// Permission ids before the sync.
    pub previous: Vec<u64>,
    /// Permission ids after the sync.
    pub current: Vec<u64>,
    /// Newly granted ids.
    pub added: Vec<u64>,
    /// Removed ids.
    pub removed: Vec<u64>,
}

/// Outcome of a catalog sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSyncReport {
    /// Rows inserted.
    pub created: usize,
    /// Rows rewritten from the catalog.
    pub updated: usize,
    /// Rows already matching the catalog.
    pub unchanged: usize,
}

/// Role → permission assignment engine.
#[derive(Debug, Clone)]
pub struct PermissionMatrixService {
    store: RbacStore,
    catalog: Arc<PermissionRegistry>,
    config: RbacConfig,
}

impl PermissionMatrixService {
    /// Create an engine over `store`, syncing from `catalog`.
    pub fn new(store: RbacStore, catalog: Arc<PermissionRegistry>) -> Self {
        Self {
            store,
            catalog,
            config: RbacConfig::default(),
        }
    }

    /// Use a specific configuration.
    pub fn with_config(mut self, config: RbacConfig) -> Self {
        self.config = config;
        self
    }

    /// Underlying tables.
    pub fn store(&self) -> &RbacStore {
        &self.store
    }

    /// Permission catalog.
    pub fn catalog(&self) -> &PermissionRegistry {
        &self.catalog
    }

    /// Build the full matrix.
    ///
    /// Re-syncs the catalog first (unless disabled). Fails as a whole if any
    /// load fails.
    #[instrument(skip(self))]
    pub async fn get_permission_matrix(&self) -> AdminResult<PermissionMatrix> {
        if self.config.sync_catalog_on_read {
            self.sync_permissions_from_gates().await?;
        }

        let roles = self
            .store
            .roles
            .find_many(
                &Query::new()
                    .filter_eq("is_active", true)
                    .order_by("level", SortDirection::Desc)
                    .order_by("name", SortDirection::Asc),
            )
            .await?;

        let permissions = self
            .store
            .permissions
            .find_many(
                &Query::new()
                    .filter_eq("is_active", true)
                    .order_by("category", SortDirection::Asc)
                    .order_by("action", SortDirection::Asc),
            )
            .await?;

        let assignments = self
            .store
            .role_permissions
            .find_many(
                &Query::new()
                    .filter_eq("is_active", true)
                    .order_by("permission_id", SortDirection::Asc),
            )
            .await?;

        let active_permissions: HashSet<u64> = permissions.iter().map(|p| p.id).collect();
        let mut matrix: BTreeMap<u64, Vec<u64>> =
            roles.iter().map(|r| (r.id, Vec::new())).collect();
        for assignment in &assignments {
            if !active_permissions.contains(&assignment.permission_id) {
                continue;
            }
            if let Some(ids) = matrix.get_mut(&assignment.role_id) {
                if !ids.contains(&assignment.permission_id) {
                    ids.push(assignment.permission_id);
                }
            }
        }

        let mut categories: BTreeMap<String, Vec<u64>> = BTreeMap::new();
        for permission in &permissions {
            categories
                .entry(permission.category.clone())
                .or_default()
                .push(permission.id);
        }

        let stats = MatrixStats {
            total_roles: self.store.roles.count(&Query::new()).await?,
            active_roles: roles.len() as u64,
            total_permissions: self.store.permissions.count(&Query::new()).await?,
            active_permissions: permissions.len() as u64,
            total_assignments: self.store.role_permissions.count(&Query::new()).await?,
            active_assignments: assignments.len() as u64,
            categories: categories.len(),
        };

        let roles = roles
            .into_iter()
            .map(|role| RoleWithPermissions {
                permission_ids: matrix.get(&role.id).cloned().unwrap_or_default(),
                role,
            })
            .collect();

        debug!(
            roles = stats.active_roles,
            permissions = stats.active_permissions,
            assignments = stats.active_assignments,
            "Built permission matrix"
        );

        Ok(PermissionMatrix {
            roles,
            permissions,
            matrix,
            categories,
            stats,
        })
    }

    /// Assign a permission to a role.
    ///
    /// Idempotent: returns `false` without writing when an active
    /// assignment already exists.
    #[instrument(skip(self))]
    pub async fn assign_permission_to_role(
        &self,
        role_id: u64,
        permission_id: u64,
    ) -> AdminResult<bool> {
        self.validate_permission_assignment(role_id, permission_id)
            .await?;

        let rows = self
            .store
            .role_permissions
            .find_many(&assignment_query(role_id, permission_id))
            .await?;

        if rows.iter().any(|row| row.is_active) {
            debug!(role_id, permission_id, "Permission already assigned");
            return Ok(false);
        }

        match rows.into_iter().next() {
            Some(mut inactive) => {
                inactive.is_active = true;
                self.store.role_permissions.update(inactive).await?;
            }
            None => {
                self.store
                    .role_permissions
                    .create(RolePermission::new(role_id, permission_id))
                    .await?;
            }
        }

        info!(role_id, permission_id, "Permission assigned");
        Ok(true)
    }

    /// Revoke a permission from a role.
    ///
    /// Returns `false` when there was nothing to revoke.
    #[instrument(skip(self))]
    pub async fn revoke_permission_from_role(
        &self,
        role_id: u64,
        permission_id: u64,
    ) -> AdminResult<bool> {
        let removed = self
            .store
            .role_permissions
            .delete_where(&assignment_query(role_id, permission_id))
            .await?;

        if removed == 0 {
            debug!(role_id, permission_id, "Nothing to revoke");
            return Ok(false);
        }

        info!(role_id, permission_id, "Permission revoked");
        Ok(true)
    }

    /// Assign or revoke a list of permissions, one at a time.
    ///
    /// Not transactional: on failure, earlier iterations stay committed and
    /// the error is a `PartialFailure` carrying the success count.
    #[instrument(skip(self, request), fields(role_id = request.role_id, action = request.action.as_str()))]
    pub async fn bulk_assign_permissions(
        &self,
        request: &BulkAssignRequest,
    ) -> AdminResult<BulkSummary> {
        validate_bulk_ids(&request.permission_ids, self.config.max_bulk_size)?;
        self.find_role(request.role_id).await?;

        let total = request.permission_ids.len();
        let mut ids = Vec::with_capacity(total);

        for permission_id in &request.permission_ids {
            let result = match request.action {
                BulkAction::Assign => {
                    self.assign_permission_to_role(request.role_id, *permission_id)
                        .await
                }
                BulkAction::Revoke => {
                    self.revoke_permission_from_role(request.role_id, *permission_id)
                        .await
                }
            };

            if let Err(err) = result {
                warn!(
                    permission_id,
                    succeeded = ids.len(),
                    total,
                    error = %err,
                    "Bulk permission update stopped part-way"
                );
                return Err(AdminError::partial(ids.len(), total, err));
            }
            ids.push(*permission_id);
        }

        info!(total, "Bulk permission update complete");
        Ok(BulkSummary {
            total,
            succeeded: ids.len(),
            ids,
        })
    }

    /// Replace a role's permission set atomically.
    ///
    /// The role is checked before the transaction opens; each permission is
    /// checked inside it. Any failure rolls the role's assignments back to
    /// their state before the call and returns `TransactionFailure`.
    /// Assignments of other roles are outside the transaction.
    #[instrument(skip(self, permission_ids), fields(count = permission_ids.len()))]
    pub async fn sync_role_permissions(
        &self,
        role_id: u64,
        permission_ids: &[u64],
    ) -> AdminResult<SyncResult> {
        let role = self.find_role(role_id).await?;
        if !role.is_active {
            return Err(AdminError::invalid_field(
                "role_id",
                format!("role '{}' is inactive", role.slug),
            ));
        }
        if !permission_ids.is_empty() {
            validate_bulk_ids(permission_ids, self.config.max_bulk_size)?;
        }

        let previous = self.role_permission_ids(role_id).await?;

        let repo = &self.store.role_permissions;
        let tx = repo
            .begin(&Query::new().filter_eq("role_id", role_id))
            .await?;

        if let Err(err) = self.replace_assignments(role_id, permission_ids).await {
            if let Err(rollback_err) = repo.rollback(tx).await {
                error!(role_id, error = %rollback_err, "Rollback failed");
            }
            warn!(role_id, error = %err, "Permission sync rolled back");
            return Err(AdminError::TransactionFailure(err.to_string()));
        }

        repo.commit(tx).await.map_err(|err| {
            error!(role_id, error = %err, "Commit failed");
            AdminError::TransactionFailure(err.to_string())
        })?;

        let current = self.role_permission_ids(role_id).await?;
        let before: BTreeSet<u64> = previous.iter().copied().collect();
        let after: BTreeSet<u64> = current.iter().copied().collect();

        let result = SyncResult {
            role_id,
            added: after.difference(&before).copied().collect(),
            removed: before.difference(&after).copied().collect(),
            previous,
            current,
        };

        info!(
            role_id,
            added = result.added.len(),
            removed = result.removed.len(),
            "Role permissions synced"
        );
        Ok(result)
    }

    async fn replace_assignments(&self, role_id: u64, permission_ids: &[u64]) -> AdminResult<()> {
        self.store
            .role_permissions
            .delete_where(&Query::new().filter_eq("role_id", role_id))
            .await?;

        for permission_id in permission_ids {
            let permission = self.find_permission(*permission_id).await?;
            if !permission.is_active {
                return Err(AdminError::invalid_field(
                    "permission_ids",
                    format!("permission '{}' is inactive", permission.slug),
                ));
            }
            self.store
                .role_permissions
                .create(RolePermission::new(role_id, *permission_id))
                .await?;
        }
        Ok(())
    }

    /// Upsert the permission table from the catalog, matched by slug.
    ///
    /// A stored row matches a catalog entry under either slug format, so a
    /// row seeded as `books_view` is updated in place rather than
    /// duplicated by `books.view`.
    #[instrument(skip(self))]
    pub async fn sync_permissions_from_gates(&self) -> AdminResult<CatalogSyncReport> {
        let mut report = CatalogSyncReport::default();

        for entry in self.catalog.permissions() {
            let slug = PermissionSlug::new(entry.resource.as_str(), entry.action.as_str());
            let existing = self
                .store
                .permissions
                .find_one(&Query::new().filter_in("slug", slug.aliases()))
                .await?;

            match existing {
                Some(permission) if !catalog_differs(&permission, &entry) => {
                    report.unchanged += 1;
                }
                Some(mut permission) => {
                    permission.apply_catalog(&entry);
                    self.store.permissions.update(permission).await?;
                    report.updated += 1;
                }
                None => {
                    self.store
                        .permissions
                        .create(Permission::from(&entry))
                        .await?;
                    report.created += 1;
                }
            }
        }

        debug!(
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            "Permission catalog synced"
        );
        Ok(report)
    }

    /// Check that both the role and the permission exist and are active.
    pub async fn validate_permission_assignment(
        &self,
        role_id: u64,
        permission_id: u64,
    ) -> AdminResult<(Role, Permission)> {
        let role = self.find_role(role_id).await?;
        if !role.is_active {
            return Err(AdminError::invalid_field(
                "role_id",
                format!("role '{}' is inactive", role.slug),
            ));
        }

        let permission = self.find_permission(permission_id).await?;
        if !permission.is_active {
            return Err(AdminError::invalid_field(
                "permission_id",
                format!("permission '{}' is inactive", permission.slug),
            ));
        }

        Ok((role, permission))
    }

    /// Active permission ids of a role, ascending.
    pub async fn role_permission_ids(&self, role_id: u64) -> AdminResult<Vec<u64>> {
        let rows = self
            .store
            .role_permissions
            .find_many(
                &Query::new()
                    .filter_eq("role_id", role_id)
                    .filter_eq("is_active", true)
                    .order_by("permission_id", SortDirection::Asc),
            )
            .await?;

        let mut ids: Vec<u64> = rows.into_iter().map(|row| row.permission_id).collect();
        ids.dedup();
        Ok(ids)
    }

    /// Active permissions of a role.
    pub async fn role_permissions(&self, role_id: u64) -> AdminResult<Vec<Permission>> {
        let ids = self.role_permission_ids(role_id).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .store
            .permissions
            .find_many(
                &Query::new()
                    .filter_in("id", ids)
                    .filter_eq("is_active", true)
                    .order_by("id", SortDirection::Asc),
            )
            .await?)
    }

    /// Look up a permission by slug in either format.
    pub async fn find_permission_by_slug(&self, raw: &str) -> AdminResult<Permission> {
        let slug = PermissionSlug::parse(raw).ok_or_else(|| {
            AdminError::invalid_field("slug", format!("'{}' is not a permission slug", raw))
        })?;
        self.store
            .permissions
            .find_one(&Query::new().filter_in("slug", slug.aliases()))
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("permission '{}' not found", slug)))
    }

    pub(crate) async fn find_role(&self, role_id: u64) -> AdminResult<Role> {
        self.store
            .roles
            .find(role_id)
            .await?
            .ok_or_else(|| AdminError::not_found("Role", role_id))
    }

    pub(crate) async fn find_permission(&self, permission_id: u64) -> AdminResult<Permission> {
        self.store
            .permissions
            .find(permission_id)
            .await?
            .ok_or_else(|| AdminError::not_found("Permission", permission_id))
    }
}

fn assignment_query(role_id: u64, permission_id: u64) -> Query {
    Query::new()
        .filter_eq("role_id", role_id)
        .filter_eq("permission_id", permission_id)
}

fn catalog_differs(permission: &Permission, entry: &CatalogPermission) -> bool {
    permission.name != entry.name
        || permission.category != entry.category
        || permission.resource != entry.resource
        || permission.action != entry.action
        || permission.description.as_deref() != Some(entry.description.as_str())
        || !permission.is_active
}
