//! # Permission matrix controller
//!
//! Request handlers for the role × permission grid and user role
//! assignment. Every handler returns an [`ApiResponse`]; failures go
//! through the shared error mapping.
//!
//! | Handler            | Route params          | Body                                    | Permission           |
//! |--------------------|-----------------------|-----------------------------------------|----------------------|
//! | `matrix`           |                       |                                         | `permissions.view`   |
//! | `assign`           | `role_id`             | `{permission_id}`                       | `permissions.assign` |
//! | `revoke`           | `role_id`, `permission_id` |                                    | `permissions.revoke` |
//! | `bulk`             | `role_id`             | `{permission_ids, action}`              | assign or revoke     |
//! | `sync`             | `role_id`             | `{permission_ids}`                      | `permissions.sync`   |
//! | `sync_catalog`     |                       |                                         | `permissions.sync`   |
//! | `assign_user_role` | `user_id`             | `{role_id, notes?}`                     | `roles.assign`       |
//! | `revoke_user_role` | `user_id`, `role_id`  |                                         | `roles.revoke`       |

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use admin_core::{
    AdminError, AdminResult, ApiResponse, BaseResourceController, PermissionLookup,
    ResourceConfig, ResourceRequest,
};
use admin_rbac::{BulkAction, BulkAssignRequest, PermissionMatrixService};

#[derive(Debug, Deserialize)]
struct AssignBody {
    permission_id: u64,
}

#[derive(Debug, Deserialize)]
struct BulkBody {
    permission_ids: Vec<u64>,
    #[serde(default = "default_bulk_action")]
    action: BulkAction,
}

fn default_bulk_action() -> BulkAction {
    BulkAction::Assign
}

#[derive(Debug, Deserialize)]
struct SyncBody {
    #[serde(default)]
    permission_ids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct UserRoleBody {
    role_id: u64,
    #[serde(default)]
    notes: Option<String>,
}

/// Controller over the permission matrix engine.
#[derive(Debug, Clone)]
pub struct PermissionMatrixController {
    base: BaseResourceController,
    engine: Arc<PermissionMatrixService>,
}

impl PermissionMatrixController {
    /// Wrap an engine.
    pub fn new(engine: Arc<PermissionMatrixService>) -> Self {
        Self {
            base: BaseResourceController::new("permissions", "Permission"),
            engine,
        }
    }

    /// Use a specific configuration for request parsing.
    pub fn with_config(mut self, config: ResourceConfig) -> Self {
        self.base = self.base.with_config(config);
        self
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &Arc<PermissionMatrixService> {
        &self.engine
    }

    /// Full role × permission grid.
    pub async fn matrix(&self, request: &ResourceRequest) -> ApiResponse {
        self.respond("matrix", async {
            authorize(request, "permissions.view")?;
            let matrix = self.engine.get_permission_matrix().await?;
            let stats = json!(matrix.stats);
            Ok(ApiResponse::ok(json!(matrix)).with_meta(stats))
        })
        .await
    }

    /// Assign one permission to a role.
    pub async fn assign(&self, request: &ResourceRequest) -> ApiResponse {
        self.respond("assign", async {
            authorize(request, "permissions.assign")?;
            let role_id = self.base.validate_id(request, "role_id")?;
            let body: AssignBody = parse_body(request)?;
            let changed = self
                .engine
                .assign_permission_to_role(role_id, body.permission_id)
                .await?;
            let message = if changed {
                "Permission assigned successfully"
            } else {
                "Permission already assigned"
            };
            Ok(ApiResponse::ok_with_message(
                json!({"role_id": role_id, "permission_id": body.permission_id, "changed": changed}),
                message,
            ))
        })
        .await
    }

    /// Revoke one permission from a role.
    pub async fn revoke(&self, request: &ResourceRequest) -> ApiResponse {
        self.respond("revoke", async {
            authorize(request, "permissions.revoke")?;
            let role_id = self.base.validate_id(request, "role_id")?;
            let permission_id = self.base.validate_id(request, "permission_id")?;
            let changed = self
                .engine
                .revoke_permission_from_role(role_id, permission_id)
                .await?;
            Ok(ApiResponse::ok_with_message(
                json!({"role_id": role_id, "permission_id": permission_id, "changed": changed}),
                "Permission revoked successfully",
            ))
        })
        .await
    }

    /// Assign or revoke a list of permissions.
    pub async fn bulk(&self, request: &ResourceRequest) -> ApiResponse {
        self.respond("bulk", async {
            let role_id = self.base.validate_id(request, "role_id")?;
            let body: BulkBody = parse_body(request)?;
            let slug = match body.action {
                BulkAction::Assign => "permissions.assign",
                BulkAction::Revoke => "permissions.revoke",
            };
            authorize(request, slug)?;

            let bulk = BulkAssignRequest {
                role_id,
                permission_ids: body.permission_ids,
                action: body.action,
            };
            let summary = self.engine.bulk_assign_permissions(&bulk).await?;
            let verb = match bulk.action {
                BulkAction::Assign => "assigned",
                BulkAction::Revoke => "revoked",
            };
            Ok(ApiResponse::ok_with_message(
                json!(summary),
                format!("{} of {} permissions {}", summary.succeeded, summary.total, verb),
            ))
        })
        .await
    }

    /// Replace a role's permission set.
    pub async fn sync(&self, request: &ResourceRequest) -> ApiResponse {
        self.respond("sync", async {
            authorize(request, "permissions.sync")?;
            let role_id = self.base.validate_id(request, "role_id")?;
            let body: SyncBody = parse_body(request)?;
            let result = self
                .engine
                .sync_role_permissions(role_id, &body.permission_ids)
                .await?;
            Ok(ApiResponse::ok_with_message(
                json!(result),
                "Role permissions synced successfully",
            ))
        })
        .await
    }

    /// Re-sync the permission table from the catalog.
    pub async fn sync_catalog(&self, request: &ResourceRequest) -> ApiResponse {
        self.respond("sync_catalog", async {
            authorize(request, "permissions.sync")?;
            let report = self.engine.sync_permissions_from_gates().await?;
            Ok(ApiResponse::ok(json!(report)))
        })
        .await
    }

    /// Give a user a role.
    pub async fn assign_user_role(&self, request: &ResourceRequest) -> ApiResponse {
        self.respond("assign_user_role", async {
            authorize(request, "roles.assign")?;
            let user_id = self.base.validate_id(request, "user_id")?;
            let body: UserRoleBody = parse_body(request)?;
            let changed = self
                .engine
                .assign_role_to_user(user_id, body.role_id, body.notes)
                .await?;
            Ok(ApiResponse::ok(
                json!({"user_id": user_id, "role_id": body.role_id, "changed": changed}),
            ))
        })
        .await
    }

    /// Take a role from a user.
    pub async fn revoke_user_role(&self, request: &ResourceRequest) -> ApiResponse {
        self.respond("revoke_user_role", async {
            authorize(request, "roles.revoke")?;
            let user_id = self.base.validate_id(request, "user_id")?;
            let role_id = self.base.validate_id(request, "role_id")?;
            let changed = self.engine.revoke_role_from_user(user_id, role_id).await?;
            Ok(ApiResponse::ok(
                json!({"user_id": user_id, "role_id": role_id, "changed": changed}),
            ))
        })
        .await
    }

    async fn respond<F>(&self, action: &str, handler: F) -> ApiResponse
    where
        F: std::future::Future<Output = AdminResult<ApiResponse>>,
    {
        match handler.await {
            Ok(response) => response,
            Err(err) => {
                debug!(action, error = %err, "Matrix request rejected");
                ApiResponse::from_error(&err)
            }
        }
    }
}

/// Requests without an actor are trusted internal calls.
fn authorize(request: &ResourceRequest, slug: &str) -> AdminResult<()> {
    match &request.actor {
        Some(actor) if !actor.has_permission(slug) => Err(AdminError::Forbidden {
            permission: slug.to_string(),
        }),
        _ => Ok(()),
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(request: &ResourceRequest) -> AdminResult<T> {
    let body = request
        .body
        .clone()
        .unwrap_or(Value::Object(Default::default()));
    serde_json::from_value(body).map_err(|e| AdminError::invalid(format!("invalid request body: {}", e)))
}
