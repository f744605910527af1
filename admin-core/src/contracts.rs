//! Capability contracts
//!
//! A resource implementation exposes its operations through named capability
//! traits. Services and controllers advertise each capability through a typed
//! accessor that returns `Some(&dyn Trait)` when the capability is present, so
//! the registry can check the full surface without reflection.
//!
//! Records cross the contract boundary as `serde_json::Value`, which lets one
//! registry hold books, users and roles side by side.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::controller::ResourceRequest;
use crate::error::AdminResult;
use crate::response::ApiResponse;
use crate::types::{
    BulkSummary, ControllerMetadata, ListRequest, PaginatedResult, ServiceMetadata, SortDirection,
};

/// Named capability groups.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Service: find/create/update/delete single records.
    Crud,
    /// Service: paged listing.
    Pagination,
    /// Service: sort field and direction handling.
    Sorting,
    /// Service: filter and search handling.
    Filtering,
    /// Service: bulk create/update/delete.
    BulkOperations,
    /// Service: permission requirements and checks.
    Authorization,
    /// Controller: list endpoint.
    Listing,
    /// Controller: show/store/update/destroy endpoints.
    CrudActions,
    /// Controller: bulk endpoints.
    BulkActions,
    /// Controller: metadata endpoint.
    Discovery,
}

impl Capability {
    /// Get the string representation of the capability.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Crud => "crud",
            Capability::Pagination => "pagination",
            Capability::Sorting => "sorting",
            Capability::Filtering => "filtering",
            Capability::BulkOperations => "bulk_operations",
            Capability::Authorization => "authorization",
            Capability::Listing => "listing",
            Capability::CrudActions => "crud_actions",
            Capability::BulkActions => "bulk_actions",
            Capability::Discovery => "discovery",
        }
    }

    /// Operation names making up this capability.
    ///
    /// These are the names reported when a registration is rejected.
    pub fn operations(&self) -> &'static [&'static str] {
        match self {
            Capability::Crud => &["find", "create", "update", "delete"],
            Capability::Pagination => &[
                "list",
                "count",
                "validate_pagination_params",
                "sanitize_list_request",
            ],
            Capability::Sorting => &["sortable_fields", "default_sort", "validate_sort"],
            Capability::Filtering => &[
                "filterable_fields",
                "searchable_fields",
                "validate_filter_value",
                "validate_filters",
            ],
            Capability::BulkOperations => &[
                "validate_bulk_operation",
                "bulk_create",
                "bulk_update",
                "bulk_delete",
            ],
            Capability::Authorization => &["required_permissions", "authorize"],
            Capability::Listing => &["index"],
            Capability::CrudActions => &["show", "store", "update", "destroy"],
            Capability::BulkActions => &["bulk_store", "bulk_destroy"],
            Capability::Discovery => &["metadata"],
        }
    }

    /// Full surface required of a resource service.
    pub fn service_surface() -> Vec<Self> {
        vec![
            Capability::Crud,
            Capability::Pagination,
            Capability::Sorting,
            Capability::Filtering,
            Capability::BulkOperations,
            Capability::Authorization,
        ]
    }

    /// Full surface required of a resource controller.
    pub fn controller_surface() -> Vec<Self> {
        vec![
            Capability::Listing,
            Capability::CrudActions,
            Capability::BulkActions,
            Capability::Discovery,
        ]
    }
}

/// Single-record operations.
#[async_trait]
pub trait CrudContract: Send + Sync {
    /// Find a record by id.
    async fn find(&self, id: u64) -> AdminResult<Value>;

    /// Create a record from a payload.
    async fn create(&self, payload: Value) -> AdminResult<Value>;

    /// Replace the record `id` with a payload.
    async fn update(&self, id: u64, payload: Value) -> AdminResult<Value>;

    /// Delete a record by id.
    async fn delete(&self, id: u64) -> AdminResult<()>;
}

/// Paged listing.
#[async_trait]
pub trait PaginationContract: Send + Sync {
    /// Validate the request and return one page.
    async fn list(&self, request: ListRequest) -> AdminResult<PaginatedResult<Value>>;

    /// Count rows matching the request's filters and search.
    async fn count(&self, request: &ListRequest) -> AdminResult<u64>;

    /// Check page and page size bounds.
    fn validate_pagination_params(&self, page: i64, page_size: i64) -> AdminResult<()>;

    /// Coerce a request into valid bounds.
    fn sanitize_list_request(&self, request: ListRequest) -> ListRequest;
}

/// Sort handling.
pub trait SortingContract: Send + Sync {
    /// Fields accepted as sort keys.
    fn sortable_fields(&self) -> Vec<String>;

    /// Sort used when the request names none.
    fn default_sort(&self) -> (String, SortDirection);

    /// Check a sort field and raw direction.
    fn validate_sort(&self, field: &str, direction: &str) -> AdminResult<()>;
}

/// Filter and search handling.
pub trait FilteringContract: Send + Sync {
    /// Fields accepted as filter keys.
    fn filterable_fields(&self) -> Vec<String>;

    /// Fields matched by free-text search.
    fn searchable_fields(&self) -> Vec<String>;

    /// Check one filter value.
    fn validate_filter_value(&self, field: &str, value: &Value) -> AdminResult<()>;

    /// Check every filter key and value.
    fn validate_filters(&self, filters: &BTreeMap<String, Value>) -> AdminResult<()>;
}

/// Bulk operations.
///
/// Bulk loops are sequential and not transactional; a failure part-way
/// through is reported as "N of M succeeded".
#[async_trait]
pub trait BulkContract: Send + Sync {
    /// Check a bulk id list.
    fn validate_bulk_operation(&self, ids: &[u64]) -> AdminResult<()>;

    /// Create records one by one.
    async fn bulk_create(&self, payloads: Vec<Value>) -> AdminResult<BulkSummary>;

    /// Update records one by one; each payload carries its `id`.
    async fn bulk_update(&self, payloads: Vec<Value>) -> AdminResult<BulkSummary>;

    /// Delete records one by one.
    async fn bulk_delete(&self, ids: Vec<u64>) -> AdminResult<BulkSummary>;
}

/// Permissions held by an actor.
///
/// Implemented by the RBAC layer; resource code only asks yes/no questions.
pub trait PermissionLookup: Send + Sync {
    /// Check whether the actor holds the permission `slug`.
    fn has_permission(&self, slug: &str) -> bool;
}

/// Permission requirements and checks.
pub trait AuthorizationContract: Send + Sync {
    /// Permission slug required for each action.
    fn required_permissions(&self) -> BTreeMap<String, String>;

    /// Decide whether `actor` may perform `action`.
    fn authorize(&self, action: &str, actor: &dyn PermissionLookup) -> AdminResult<()>;
}

/// A resource service as seen by the registry.
pub trait ServiceContract: Send + Sync {
    /// Service self-description.
    fn metadata(&self) -> ServiceMetadata;

    /// Single-record operations.
    fn crud(&self) -> Option<&dyn CrudContract> {
        None
    }

    /// Paged listing.
    fn pagination(&self) -> Option<&dyn PaginationContract> {
        None
    }

    /// Sort handling.
    fn sorting(&self) -> Option<&dyn SortingContract> {
        None
    }

    /// Filter handling.
    fn filtering(&self) -> Option<&dyn FilteringContract> {
        None
    }

    /// Bulk operations.
    fn bulk(&self) -> Option<&dyn BulkContract> {
        None
    }

    /// Authorization.
    fn authorization(&self) -> Option<&dyn AuthorizationContract> {
        None
    }
}

/// List endpoint.
#[async_trait]
pub trait ListingAction: Send + Sync {
    /// `GET /resource`
    async fn index(&self, request: &ResourceRequest) -> ApiResponse;
}

/// Single-record endpoints.
#[async_trait]
pub trait CrudActions: Send + Sync {
    /// `GET /resource/:id`
    async fn show(&self, request: &ResourceRequest) -> ApiResponse;

    /// `POST /resource`
    async fn store(&self, request: &ResourceRequest) -> ApiResponse;

    /// `PUT /resource/:id`
    async fn update(&self, request: &ResourceRequest) -> ApiResponse;

    /// `DELETE /resource/:id`
    async fn destroy(&self, request: &ResourceRequest) -> ApiResponse;
}

/// Bulk endpoints.
#[async_trait]
pub trait BulkActions: Send + Sync {
    /// `POST /resource/bulk`
    async fn bulk_store(&self, request: &ResourceRequest) -> ApiResponse;

    /// `DELETE /resource/bulk`
    async fn bulk_destroy(&self, request: &ResourceRequest) -> ApiResponse;
}

/// Metadata endpoint.
pub trait DiscoveryAction: Send + Sync {
    /// Describe the controller for capability discovery.
    fn metadata(&self) -> ControllerMetadata;
}

/// A resource controller as seen by the registry.
pub trait ControllerContract: Send + Sync {
    /// Resource name served by this controller.
    fn resource(&self) -> String;

    /// List endpoint.
    fn listing(&self) -> Option<&dyn ListingAction> {
        None
    }

    /// Single-record endpoints.
    fn crud_actions(&self) -> Option<&dyn CrudActions> {
        None
    }

    /// Bulk endpoints.
    fn bulk_actions(&self) -> Option<&dyn BulkActions> {
        None
    }

    /// Metadata endpoint.
    fn discovery(&self) -> Option<&dyn DiscoveryAction> {
        None
    }
}

/// Something whose capability surface can be checked.
pub trait Contract: Send + Sync {
    /// Capabilities currently exposed.
    fn capabilities(&self) -> Vec<Capability>;
}

impl Contract for dyn ServiceContract {
    fn capabilities(&self) -> Vec<Capability> {
        let mut present = Vec::new();
        if self.crud().is_some() {
            present.push(Capability::Crud);
        }
        if self.pagination().is_some() {
            present.push(Capability::Pagination);
        }
        if self.sorting().is_some() {
            present.push(Capability::Sorting);
        }
        if self.filtering().is_some() {
            present.push(Capability::Filtering);
        }
        if self.bulk().is_some() {
            present.push(Capability::BulkOperations);
        }
        if self.authorization().is_some() {
            present.push(Capability::Authorization);
        }
        present
    }
}

impl Contract for dyn ControllerContract {
    fn capabilities(&self) -> Vec<Capability> {
        let mut present = Vec::new();
        if self.listing().is_some() {
            present.push(Capability::Listing);
        }
        if self.crud_actions().is_some() {
            present.push(Capability::CrudActions);
        }
        if self.bulk_actions().is_some() {
            present.push(Capability::BulkActions);
        }
        if self.discovery().is_some() {
            present.push(Capability::Discovery);
        }
        present
    }
}

/// Operation names of `required` capabilities absent from `present`.
pub fn missing_operations(required: &[Capability], present: &[Capability]) -> Vec<String> {
    required
        .iter()
        .filter(|capability| !present.contains(capability))
        .flat_map(|capability| capability.operations().iter().map(|op| op.to_string()))
        .collect()
}
