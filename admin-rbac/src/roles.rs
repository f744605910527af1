//! # Role service
//!
//! The `roles` resource: base CRUD, listing and bulk semantics plus role
//! administration (rename, level, activation, parent).

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use admin_core::{
    AdminError, AdminResult, AuthorizationContract, BaseResourceService, BulkContract, BulkSummary,
    CrudContract, FilteringContract, PaginationContract, RecordRules, Repository,
    ResourceConfig, ResourceDescriptor, ServiceContract, ServiceMetadata, SortingContract,
};

use crate::models::Role;

/// Turn a display name into a role slug ("Super Admin" → "super-admin").
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Field rules for roles.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleRules;

impl RoleRules {
    fn validate(&self, role: &Role) -> AdminResult<()> {
        if role.name.trim().is_empty() {
            return Err(AdminError::invalid_field("name", "name is required"));
        }
        if role.slug.is_empty() {
            return Err(AdminError::invalid_field("slug", "slug is required"));
        }
        if !role
            .slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(AdminError::invalid_field(
                "slug",
                format!("slug '{}' may only contain a-z, 0-9 and '-'", role.slug),
            ));
        }
        if role.level < 0 {
            return Err(AdminError::invalid_field("level", "level must not be negative"));
        }
        if let Some(parent) = role.parent_role_id {
            if parent == 0 || parent == role.id {
                return Err(AdminError::invalid_field(
                    "parent_role_id",
                    "a role cannot be its own parent",
                ));
            }
        }
        Ok(())
    }
}

impl RecordRules<Role> for RoleRules {
    fn validate_create(&self, role: &Role) -> AdminResult<()> {
        self.validate(role)
    }

    fn validate_update(&self, role: &Role) -> AdminResult<()> {
        self.validate(role)
    }

    fn prepare_create(&self, mut role: Role) -> Role {
        role.name = role.name.trim().to_string();
        if role.slug.trim().is_empty() {
            role.slug = slugify(&role.name);
        }
        let now = Utc::now();
        role.created_at = now;
        role.updated_at = now;
        role
    }

    fn prepare_update(&self, existing: &Role, mut role: Role) -> Role {
        role.name = role.name.trim().to_string();
        if role.slug.trim().is_empty() {
            role.slug = existing.slug.clone();
        }
        role.created_at = existing.created_at;
        role.updated_at = Utc::now();
        role
    }

    fn validation_rules(&self) -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([
            ("name".to_string(), vec!["required".to_string(), "string".to_string()]),
            ("slug".to_string(), vec!["slug".to_string(), "unique:roles".to_string()]),
            ("level".to_string(), vec!["integer".to_string(), "min:0".to_string()]),
            (
                "parent_role_id".to_string(),
                vec!["nullable".to_string(), "exists:roles".to_string()],
            ),
        ])
    }
}

/// Resource service for roles.
#[derive(Debug)]
pub struct RoleService {
    base: BaseResourceService<Role>,
}

impl RoleService {
    /// Resource descriptor for roles.
    pub fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::new("roles", "Role")
            .sortable(&["name", "slug", "level", "created_at"])
            .filterable(&["is_active", "level", "parent_role_id"])
            .searchable(&["name", "slug", "description"])
            .standard_permissions()
            .permission("assign", "roles.assign")
            .permission("revoke", "roles.revoke")
    }

    /// Create a role service over `repository`.
    pub fn new(repository: Arc<dyn Repository<Role>>) -> Self {
        Self {
            base: BaseResourceService::new(Self::descriptor(), repository)
                .with_rules(Arc::new(RoleRules)),
        }
    }

    /// Use a specific configuration.
    pub fn with_config(mut self, config: ResourceConfig) -> Self {
        self.base = self.base.with_config(config);
        self
    }

    /// The shared resource machinery.
    pub fn base(&self) -> &BaseResourceService<Role> {
        &self.base
    }

    /// Find a role.
    pub async fn find(&self, id: u64) -> AdminResult<Role> {
        self.base.find(id).await
    }

    /// Find a role by slug.
    pub async fn find_by_slug(&self, slug: &str) -> AdminResult<Role> {
        self.base
            .repository()
            .find_one(&admin_core::Query::new().filter_eq("slug", slug))
            .await?
            .ok_or_else(|| AdminError::NotFound(format!("Role '{}' not found", slug)))
    }

    /// Create a role; the parent, if any, must exist.
    pub async fn create(&self, role: Role) -> AdminResult<Role> {
        if let Some(parent) = role.parent_role_id {
            self.check_parent_exists(parent).await?;
        }
        self.base.create(role).await
    }

    /// Replace a role; the parent, if any, must exist.
    pub async fn update(&self, role: Role) -> AdminResult<Role> {
        if let Some(parent) = role.parent_role_id {
            if parent != role.id {
                self.check_parent_exists(parent).await?;
            }
        }
        self.base.update(role).await
    }

    /// Change a role's display name. The slug is kept.
    pub async fn rename(&self, id: u64, name: &str) -> AdminResult<Role> {
        let mut role = self.find(id).await?;
        role.name = name.to_string();
        let role = self.base.update(role).await?;
        info!(role_id = id, name = %role.name, "Role renamed");
        Ok(role)
    }

    /// Change a role's authority level.
    pub async fn set_level(&self, id: u64, level: i32) -> AdminResult<Role> {
        let mut role = self.find(id).await?;
        role.level = level;
        let role = self.base.update(role).await?;
        info!(role_id = id, level, "Role level changed");
        Ok(role)
    }

    /// Activate or deactivate a role.
    pub async fn set_active(&self, id: u64, active: bool) -> AdminResult<Role> {
        let mut role = self.find(id).await?;
        role.is_active = active;
        let role = self.base.update(role).await?;
        info!(role_id = id, active, "Role activation changed");
        Ok(role)
    }

    /// Set or clear a role's parent.
    ///
    /// Only rejects a role naming itself; longer cycles are not detected
    /// because the chain is never walked.
    pub async fn set_parent(&self, id: u64, parent_role_id: Option<u64>) -> AdminResult<Role> {
        let mut role = self.find(id).await?;
        if let Some(parent) = parent_role_id {
            if parent == id {
                return Err(AdminError::invalid_field(
                    "parent_role_id",
                    "a role cannot be its own parent",
                ));
            }
            self.check_parent_exists(parent).await?;
        }
        role.parent_role_id = parent_role_id;
        let role = self.base.update(role).await?;
        info!(role_id = id, parent = ?parent_role_id, "Role parent changed");
        Ok(role)
    }

    async fn check_parent_exists(&self, parent: u64) -> AdminResult<()> {
        if parent == 0 || !self.base.repository().exists(parent).await? {
            return Err(AdminError::invalid_field(
                "parent_role_id",
                format!("parent role {} does not exist", parent),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CrudContract for RoleService {
    async fn find(&self, id: u64) -> AdminResult<Value> {
        let role = RoleService::find(self, id).await?;
        self.base.encode(&role)
    }

    async fn create(&self, payload: Value) -> AdminResult<Value> {
        let mut role = self.base.decode(payload)?;
        role.id = 0;
        let created = RoleService::create(self, role).await?;
        self.base.encode(&created)
    }

    async fn update(&self, id: u64, payload: Value) -> AdminResult<Value> {
        let mut role = self.base.decode(payload)?;
        role.id = id;
        let updated = RoleService::update(self, role).await?;
        self.base.encode(&updated)
    }

    async fn delete(&self, id: u64) -> AdminResult<()> {
        self.base.delete(id).await
    }
}

#[async_trait]
impl BulkContract for RoleService {
    fn validate_bulk_operation(&self, ids: &[u64]) -> AdminResult<()> {
        self.base.validate_bulk_operation(ids)
    }

    async fn bulk_create(&self, payloads: Vec<Value>) -> AdminResult<BulkSummary> {
        self.base.bulk_create_via(self, payloads).await
    }

    async fn bulk_update(&self, payloads: Vec<Value>) -> AdminResult<BulkSummary> {
        self.base.bulk_update_via(self, payloads).await
    }

    async fn bulk_delete(&self, ids: Vec<u64>) -> AdminResult<BulkSummary> {
        self.base.bulk_delete_via(self, ids).await
    }
}

impl ServiceContract for RoleService {
    fn metadata(&self) -> ServiceMetadata {
        ServiceContract::metadata(&self.base)
    }

    fn crud(&self) -> Option<&dyn CrudContract> {
        Some(self)
    }

    fn pagination(&self) -> Option<&dyn PaginationContract> {
        self.base.pagination()
    }

    fn sorting(&self) -> Option<&dyn SortingContract> {
        self.base.sorting()
    }

    fn filtering(&self) -> Option<&dyn FilteringContract> {
        self.base.filtering()
    }

    fn bulk(&self) -> Option<&dyn BulkContract> {
        Some(self)
    }

    fn authorization(&self) -> Option<&dyn AuthorizationContract> {
        self.base.authorization()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_core::MemoryRepository;
    use serde_json::json;

    fn service() -> RoleService {
        RoleService::new(MemoryRepository::<Role>::shared())
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Super Admin"), "super-admin");
        assert_eq!(slugify("  Content -- Editor! "), "content-editor");
        assert_eq!(slugify("QA"), "qa");
    }

    #[tokio::test]
    async fn test_create_derives_slug() {
        let service = service();
        let role = service.create(Role::new("Support Lead", "", 30)).await.unwrap();
        assert_eq!(role.slug, "support-lead");
        assert_eq!(service.find_by_slug("support-lead").await.unwrap().id, role.id);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_fields() {
        let service = service();
        let err = service.create(Role::new("  ", "blank", 1)).await.unwrap_err();
        assert_eq!(err.field(), Some("name"));

        let err = service.create(Role::new("Neg", "neg", -1)).await.unwrap_err();
        assert_eq!(err.field(), Some("level"));

        let err = service
            .create(Role::new("Orphan", "orphan", 1).with_parent(99))
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("parent_role_id"));

        service.create(Role::new("Dup", "dup", 1)).await.unwrap();
        let err = service.create(Role::new("Dup 2", "dup", 1)).await.unwrap_err();
        assert!(matches!(err, AdminError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_role_administration() {
        let service = service();
        let admin = service.create(Role::new("Admin", "admin", 80)).await.unwrap();
        let editor = service.create(Role::new("Editor", "editor", 50)).await.unwrap();

        let renamed = service.rename(editor.id, "Content Editor").await.unwrap();
        assert_eq!(renamed.name, "Content Editor");
        assert_eq!(renamed.slug, "editor");

        assert_eq!(service.set_level(editor.id, 55).await.unwrap().level, 55);
        assert!(!service.set_active(editor.id, false).await.unwrap().is_active);

        let child = service.set_parent(editor.id, Some(admin.id)).await.unwrap();
        assert_eq!(child.parent_role_id, Some(admin.id));
        let err = service.set_parent(editor.id, Some(editor.id)).await.unwrap_err();
        assert_eq!(err.field(), Some("parent_role_id"));
        let err = service.set_parent(editor.id, Some(404)).await.unwrap_err();
        assert_eq!(err.field(), Some("parent_role_id"));
        assert_eq!(service.set_parent(editor.id, None).await.unwrap().parent_role_id, None);
    }

    #[tokio::test]
    async fn test_contract_surface() {
        let service = service();
        assert!(service.crud().is_some());
        assert!(service.bulk().is_some());
        assert_eq!(service.metadata().name, "roles");

        let crud = service.crud().unwrap();
        let created = crud
            .create(json!({"name": "Auditor", "level": 20}))
            .await
            .unwrap();
        assert_eq!(created["slug"], "auditor");

        let id = created["id"].as_u64().unwrap();
        let err = crud
            .update(id, json!({"name": "Auditor", "parent_role_id": id}))
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("parent_role_id"));

        let required = service.authorization().unwrap().required_permissions();
        assert_eq!(required.get("assign").map(String::as_str), Some("roles.assign"));
    }

    #[tokio::test]
    async fn test_bulk_checks_parent_per_item() {
        let service = service();
        let bulk = service.bulk().unwrap();

        let err = bulk
            .bulk_create(vec![
                json!({"name": "Support", "level": 20}),
                json!({"name": "Orphan", "parent_role_id": 999}),
            ])
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "1 of 2 succeeded: parent role 999 does not exist"
        );
        assert!(service.find_by_slug("orphan").await.is_err());

        let support = service.find_by_slug("support").await.unwrap();
        let err = bulk
            .bulk_update(vec![json!({
                "id": support.id,
                "name": "Support",
                "parent_role_id": 404
            })])
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::PartialFailure { succeeded: 0, .. }));
        assert_eq!(service.find(support.id).await.unwrap().parent_role_id, None);
    }
}
