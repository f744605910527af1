//! Integration tests for the permission matrix engine.
//!
//! Covered flows:
//! 1. Bulk assign followed by a whole-role sync
//! 2. Idempotent assignment
//! 3. Rollback when a write fails after the delete step, keeping other
//!    roles' assignments written while the sync was open
//! 4. Catalog upsert across slug formats
//! 5. Matrix assembly after bootstrap

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use admin_core::{
    AdminError, MemoryRepository, Query, Repository, StoreError, StoreResult, TxHandle,
};
use admin_rbac::{
    BulkAssignRequest, Permission, PermissionMatrixService, PermissionRegistry, RbacConfig,
    RbacStore, Role, RolePermission,
};

/// Assignment table that fails every insert of one permission id.
///
/// An optional interleaved row is written just before the first failure,
/// standing in for another request that commits while a sync is open.
struct FlakyAssignments {
    inner: MemoryRepository<RolePermission>,
    poisoned_permission: u64,
    failures: AtomicUsize,
    interleaved: Mutex<Option<RolePermission>>,
}

impl FlakyAssignments {
    fn new(poisoned_permission: u64) -> Self {
        Self {
            inner: MemoryRepository::new(),
            poisoned_permission,
            failures: AtomicUsize::new(0),
            interleaved: Mutex::new(None),
        }
    }

    fn interleave(self, row: RolePermission) -> Self {
        *self.interleaved.lock().unwrap() = Some(row);
        self
    }
}

#[async_trait]
impl Repository<RolePermission> for FlakyAssignments {
    async fn find(&self, id: u64) -> StoreResult<Option<RolePermission>> {
        self.inner.find(id).await
    }

    async fn find_many(&self, query: &Query) -> StoreResult<Vec<RolePermission>> {
        self.inner.find_many(query).await
    }

    async fn count(&self, query: &Query) -> StoreResult<u64> {
        self.inner.count(query).await
    }

    async fn create(&self, record: RolePermission) -> StoreResult<RolePermission> {
        if record.permission_id == self.poisoned_permission {
            let interleaved = self.interleaved.lock().unwrap().take();
            if let Some(row) = interleaved {
                self.inner.create(row).await?;
            }
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Backend("connection reset".to_string()));
        }
        self.inner.create(record).await
    }

    async fn update(&self, record: RolePermission) -> StoreResult<RolePermission> {
        self.inner.update(record).await
    }

    async fn delete(&self, id: u64) -> StoreResult<bool> {
        self.inner.delete(id).await
    }

    async fn delete_where(&self, query: &Query) -> StoreResult<u64> {
        self.inner.delete_where(query).await
    }

    async fn begin(&self, scope: &Query) -> StoreResult<TxHandle> {
        self.inner.begin(scope).await
    }

    async fn commit(&self, tx: TxHandle) -> StoreResult<()> {
        self.inner.commit(tx).await
    }

    async fn rollback(&self, tx: TxHandle) -> StoreResult<()> {
        self.inner.rollback(tx).await
    }
}

/// Role 5 and permissions 10, 11, 12 at fixed ids.
async fn seeded_store() -> RbacStore {
    let store = RbacStore::in_memory();
    seed(&store).await;
    store
}

async fn seed(store: &RbacStore) {
    let mut role = Role::new("Reviewer", "reviewer", 40);
    role.id = 5;
    store.roles.create(role).await.unwrap();
    let mut role = Role::new("Auditor", "auditor", 30);
    role.id = 6;
    store.roles.create(role).await.unwrap();

    for (id, slug) in [(10, "books.view"), (11, "books.update"), (12, "users.view")] {
        let mut permission = Permission::from_slug(slug, "Seeded").unwrap();
        permission.id = id;
        store.permissions.create(permission).await.unwrap();
    }
}

fn engine(store: RbacStore) -> PermissionMatrixService {
    PermissionMatrixService::new(store, Arc::new(PermissionRegistry::default_catalog()))
        .with_config(RbacConfig::default().without_read_sync())
}

#[tokio::test]
async fn test_bulk_assign_then_sync_leaves_exact_set() {
    let service = engine(seeded_store().await);

    let summary = service
        .bulk_assign_permissions(&BulkAssignRequest::assign(5, vec![10, 11]))
        .await
        .unwrap();
    assert_eq!(summary.succeeded, 2);
    assert_eq!(service.role_permission_ids(5).await.unwrap(), vec![10, 11]);

    let result = service.sync_role_permissions(5, &[11]).await.unwrap();
    assert_eq!(result.previous, vec![10, 11]);
    assert_eq!(result.current, vec![11]);
    assert_eq!(result.removed, vec![10]);
    assert!(result.added.is_empty());

    let matrix = service.get_permission_matrix().await.unwrap();
    assert_eq!(matrix.permissions_of(5), &[11]);
    assert!(!matrix.has(5, 10));
}

#[tokio::test]
async fn test_assign_twice_keeps_one_active_row() {
    let service = engine(seeded_store().await);

    assert!(service.assign_permission_to_role(5, 10).await.unwrap());
    assert!(!service.assign_permission_to_role(5, 10).await.unwrap());

    let active = service
        .store()
        .role_permissions
        .count(
            &Query::new()
                .filter_eq("role_id", 5)
                .filter_eq("permission_id", 10)
                .filter_eq("is_active", true),
        )
        .await
        .unwrap();
    assert_eq!(active, 1);
}

#[tokio::test]
async fn test_sync_rolls_back_after_failed_insert() {
    let flaky = Arc::new(FlakyAssignments::new(12));
    let store = RbacStore::in_memory().with_role_permissions(flaky.clone());
    seed(&store).await;
    let service = engine(store);

    service
        .bulk_assign_permissions(&BulkAssignRequest::assign(5, vec![10, 11]))
        .await
        .unwrap();

    // 12 fails after the delete step and after 11 was re-inserted.
    let err = service
        .sync_role_permissions(5, &[11, 12])
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::TransactionFailure(_)));
    assert!(err.to_string().contains("connection reset"));
    assert_eq!(flaky.failures.load(Ordering::SeqCst), 1);
    assert_eq!(service.role_permission_ids(5).await.unwrap(), vec![10, 11]);
}

#[tokio::test]
async fn test_sync_rollback_keeps_other_roles_writes() {
    let flaky = Arc::new(FlakyAssignments::new(12).interleave(RolePermission::new(6, 10)));
    let store = RbacStore::in_memory().with_role_permissions(flaky.clone());
    seed(&store).await;
    let service = engine(store);

    service.assign_permission_to_role(5, 10).await.unwrap();

    let err = service
        .sync_role_permissions(5, &[11, 12])
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::TransactionFailure(_)));
    assert_eq!(service.role_permission_ids(5).await.unwrap(), vec![10]);
    assert_eq!(service.role_permission_ids(6).await.unwrap(), vec![10]);

    // The table is free for the next sync.
    service.sync_role_permissions(6, &[11]).await.unwrap();
    assert_eq!(service.role_permission_ids(6).await.unwrap(), vec![11]);
}

#[tokio::test]
async fn test_bulk_assign_reports_progress_on_store_failure() {
    let flaky = Arc::new(FlakyAssignments::new(12));
    let store = RbacStore::in_memory().with_role_permissions(flaky);
    seed(&store).await;
    let service = engine(store);

    let err = service
        .bulk_assign_permissions(&BulkAssignRequest::assign(5, vec![10, 11, 12]))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "2 of 3 succeeded: Store error: Backend error: connection reset");
    assert_eq!(service.role_permission_ids(5).await.unwrap(), vec![10, 11]);
}

#[tokio::test]
async fn test_catalog_sync_reuses_underscored_rows() {
    let store = RbacStore::in_memory();
    let legacy = store
        .permissions
        .create(Permission::from_slug("roles_assign", "Legacy").unwrap())
        .await
        .unwrap();
    let service = PermissionMatrixService::new(
        store,
        Arc::new(PermissionRegistry::default_catalog()),
    );

    let report = service.sync_permissions_from_gates().await.unwrap();
    let catalog_size = service.catalog().permission_count();
    assert_eq!(report.created + report.updated + report.unchanged, catalog_size);
    assert_eq!(report.updated, 1);

    let total = service.store().permissions.count(&Query::new()).await.unwrap();
    assert_eq!(total as usize, catalog_size);

    let found = service.find_permission_by_slug("roles.assign").await.unwrap();
    assert_eq!(found.id, legacy.id);
    assert_eq!(found.category, "Access Control");
}

#[tokio::test]
async fn test_matrix_after_bootstrap() {
    let service = PermissionMatrixService::new(
        RbacStore::in_memory(),
        Arc::new(PermissionRegistry::default_catalog()),
    );
    service.bootstrap().await.unwrap();

    let matrix = service.get_permission_matrix().await.unwrap();
    let slugs: Vec<&str> = matrix.roles.iter().map(|r| r.role.slug.as_str()).collect();
    assert_eq!(slugs, vec!["super-admin", "admin", "editor", "user"]);

    let super_admin = &matrix.roles[0];
    assert_eq!(super_admin.permission_ids.len(), matrix.permissions.len());
    assert_eq!(matrix.stats.categories, matrix.categories.len());
    assert_eq!(
        matrix.categories.values().map(Vec::len).sum::<usize>(),
        matrix.permissions.len()
    );
}
