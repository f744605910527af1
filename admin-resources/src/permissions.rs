//! Permissions resource.
//!
//! CRUD over the `permissions` table. Catalog-owned rows are normally
//! maintained by the matrix engine's catalog sync; this service covers
//! listing and manual administration.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

use admin_core::{
    AdminError, AdminResult, BaseResourceService, RecordRules, Repository, ResourceConfig,
    ResourceDescriptor,
};
use admin_rbac::{Permission, PermissionSlug};

/// Field rules for permissions.
///
/// `resource` and `action` are always derived from the slug.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionRules;

impl PermissionRules {
    fn derive(&self, mut permission: Permission) -> Permission {
        permission.slug = permission.slug.trim().to_lowercase();
        if let Some(parsed) = PermissionSlug::parse(&permission.slug) {
            permission.resource = parsed.resource;
            permission.action = parsed.action;
        }
        if permission.category.trim().is_empty() {
            permission.category = "General".to_string();
        }
        permission
    }

    fn validate(&self, permission: &Permission) -> AdminResult<()> {
        if permission.name.trim().is_empty() {
            return Err(AdminError::invalid_field("name", "name is required"));
        }
        if PermissionSlug::parse(&permission.slug).is_none() {
            return Err(AdminError::invalid_field(
                "slug",
                format!(
                    "'{}' must look like <resource>.<action> or <resource>_<action>",
                    permission.slug
                ),
            ));
        }
        Ok(())
    }
}

impl RecordRules<Permission> for PermissionRules {
    fn validate_create(&self, permission: &Permission) -> AdminResult<()> {
        self.validate(permission)
    }

    fn validate_update(&self, permission: &Permission) -> AdminResult<()> {
        self.validate(permission)
    }

    fn prepare_create(&self, permission: Permission) -> Permission {
        let mut permission = self.derive(permission);
        let now = Utc::now();
        permission.created_at = now;
        permission.updated_at = now;
        permission
    }

    fn prepare_update(&self, existing: &Permission, permission: Permission) -> Permission {
        let mut permission = self.derive(permission);
        permission.created_at = existing.created_at;
        permission.updated_at = Utc::now();
        permission
    }

    fn validation_rules(&self) -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([
            ("name".to_string(), vec!["required".to_string()]),
            (
                "slug".to_string(),
                vec![
                    "required".to_string(),
                    "permission_slug".to_string(),
                    "unique:permissions".to_string(),
                ],
            ),
            ("category".to_string(), vec!["string".to_string()]),
        ])
    }
}

/// Permission resource descriptor.
pub fn permission_descriptor() -> ResourceDescriptor {
    ResourceDescriptor::new("permissions", "Permission")
        .sortable(&["name", "slug", "category", "resource", "action"])
        .filterable(&["category", "resource", "action", "is_active"])
        .searchable(&["name", "slug", "description"])
        .standard_permissions()
        .permission("assign", "permissions.assign")
        .permission("revoke", "permissions.revoke")
        .permission("sync", "permissions.sync")
}

/// Build the permissions resource service.
pub fn permission_service(
    repository: Arc<dyn Repository<Permission>>,
    config: ResourceConfig,
) -> BaseResourceService<Permission> {
    BaseResourceService::new(permission_descriptor(), repository)
        .with_config(config)
        .with_rules(Arc::new(PermissionRules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_core::{CrudContract, ListRequest, MemoryRepository};
    use serde_json::json;

    fn service() -> BaseResourceService<Permission> {
        permission_service(MemoryRepository::<Permission>::shared(), ResourceConfig::default())
    }

    #[tokio::test]
    async fn test_resource_and_action_follow_slug() {
        let service = service();
        let created = CrudContract::create(
            &service,
            json!({"name": "Archive Books", "slug": "Books_Archive", "resource": "x"}),
        )
        .await
        .unwrap();
        assert_eq!(created["slug"], "books_archive");
        assert_eq!(created["resource"], "books");
        assert_eq!(created["action"], "archive");
        assert_eq!(created["category"], "General");
    }

    #[tokio::test]
    async fn test_rejects_malformed_slug() {
        let service = service();
        let err = CrudContract::create(&service, json!({"name": "Broken", "slug": "books"}))
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("slug"));
    }

    #[tokio::test]
    async fn test_filter_by_category() {
        let service = service();
        for slug in ["books.view", "users.view", "books.export"] {
            let mut permission = Permission::from_slug(slug, "Seed").unwrap();
            if slug.starts_with("users") {
                permission.category = "User Management".to_string();
            }
            service.create(permission).await.unwrap();
        }

        let page = service
            .list(ListRequest::new(1, 20).with_filter("category", json!("Seed")))
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert!(page.data.iter().all(|p| p.resource == "books"));
    }
}
