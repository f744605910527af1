//! Base resource controller
//!
//! Translates raw request parameters into validated inputs for a resource
//! service and turns service results into [`ApiResponse`] envelopes. The
//! transport layer is out of scope: a [`ResourceRequest`] carries the
//! already-decoded query string, route parameters and JSON body.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::ResourceConfig;
use crate::contracts::{
    BulkActions, Capability, ControllerContract, CrudActions, DiscoveryAction, ListingAction,
    PermissionLookup, ServiceContract,
};
use crate::error::{AdminError, AdminResult};
use crate::response::ApiResponse;
use crate::types::{ControllerMetadata, ListRequest, PaginationConfig, SortDirection};

/// Query keys accepted for the page size.
const PAGE_SIZE_KEYS: [&str; 3] = ["page_size", "pageSize", "per_page"];

/// A decoded inbound request.
#[derive(Clone, Default)]
pub struct ResourceRequest {
    /// Query string parameters.
    pub query: BTreeMap<String, String>,
    /// Route parameters (e.g. `id`).
    pub params: BTreeMap<String, String>,
    /// JSON body.
    pub body: Option<Value>,
    /// Caller's granted permissions; `None` for trusted internal calls.
    pub actor: Option<Arc<dyn PermissionLookup>>,
}

impl std::fmt::Debug for ResourceRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRequest")
            .field("query", &self.query)
            .field("params", &self.params)
            .field("body", &self.body)
            .field("actor", &self.actor.is_some())
            .finish()
    }
}

impl ResourceRequest {
    /// Create an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Add a route parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set the JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the acting principal.
    pub fn with_actor(mut self, actor: Arc<dyn PermissionLookup>) -> Self {
        self.actor = Some(actor);
        self
    }

    fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Request parsing and metadata shared by resource controllers.
#[derive(Debug, Clone)]
pub struct BaseResourceController {
    resource: String,
    record_type: String,
    config: ResourceConfig,
}

impl BaseResourceController {
    /// Create a controller base for a resource.
    pub fn new(resource: impl Into<String>, record_type: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            record_type: record_type.into(),
            config: ResourceConfig::default(),
        }
    }

    /// Use a specific configuration.
    pub fn with_config(mut self, config: ResourceConfig) -> Self {
        self.config = config;
        self
    }

    /// Resource name.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Record display name.
    pub fn record_type(&self) -> &str {
        &self.record_type
    }

    /// Pagination configuration.
    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// Parse the query string into a list request.
    ///
    /// A missing or non-positive `page` is rejected; a page size that is not
    /// a number or not in the allowed set silently becomes the default.
    /// `filter[<key>]` parameters are collected into filters.
    pub fn validate_pagination_request(&self, request: &ResourceRequest) -> AdminResult<ListRequest> {
        let page = match request.query_value("page") {
            None => 1,
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                AdminError::invalid_field("page", format!("page must be an integer, got '{}'", raw))
            })?,
        };
        if page <= 0 {
            return Err(AdminError::invalid_field(
                "page",
                "page must be greater than 0",
            ));
        }

        let page_size = PAGE_SIZE_KEYS
            .iter()
            .find_map(|key| request.query_value(key))
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|size| self.config.is_allowed_page_size(*size))
            .unwrap_or(self.config.default_page_size);

        let direction = SortDirection::normalize(
            request.query_value("direction").unwrap_or_default(),
            self.config.default_direction,
        );

        let mut list = ListRequest::new(page, page_size).with_direction(direction.as_str());
        if list.checked_offset().is_none() {
            return Err(AdminError::invalid_field(
                "page",
                format!("page {} is out of range", page),
            ));
        }
        if let Some(sort) = request.query_value("sort") {
            list.sort = Some(sort.to_string());
        }
        if let Some(search) = request.query_value("search") {
            list.search = Some(search.to_string());
        }

        for (key, raw) in &request.query {
            if let Some(field) = key
                .strip_prefix("filter[")
                .and_then(|rest| rest.strip_suffix(']'))
            {
                list.filters.insert(field.to_string(), filter_value(raw));
            }
        }

        Ok(list)
    }

    /// Parse a route parameter as a non-zero id.
    pub fn validate_id(&self, request: &ResourceRequest, name: &str) -> AdminResult<u64> {
        let raw = request
            .params
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AdminError::invalid_field(name, format!("{} is required", name)))?;

        match raw.parse::<u64>() {
            Ok(0) => Err(AdminError::invalid_field(
                name,
                format!("{} must be greater than 0", name),
            )),
            Ok(id) => Ok(id),
            Err(_) => Err(AdminError::invalid_field(
                name,
                format!("{} must be a positive integer, got '{}'", name, raw),
            )),
        }
    }

    /// Describe the controller for capability discovery.
    pub fn generate_metadata(
        &self,
        actions: Vec<String>,
        permissions: BTreeMap<String, String>,
        validation_rules: BTreeMap<String, Vec<String>>,
    ) -> ControllerMetadata {
        ControllerMetadata {
            resource: self.resource.clone(),
            actions,
            permissions,
            validation_rules,
            pagination: PaginationConfig::from(&self.config),
        }
    }
}

/// Query strings are untyped; numbers and booleans are recovered so they
/// compare equal to typed columns. Digits that do not round-trip, like
/// `007`, stay strings.
fn filter_value(raw: &str) -> Value {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        if n.to_string() == raw {
            return Value::from(n);
        }
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// The service-level action guarding a controller action.
fn guarding_action(action: &str) -> &'static str {
    match action {
        "store" | "bulk_store" => "create",
        "update" => "update",
        "destroy" | "bulk_destroy" => "delete",
        _ => "view",
    }
}

/// Controller exposing a registered service over the standard actions.
///
/// Each controller capability is present only when the service provides
/// what it needs, so a controller wrapping a partial service fails
/// controller registration instead of failing at request time.
pub struct ResourceController {
    base: BaseResourceController,
    service: Arc<dyn ServiceContract>,
    validation_rules: BTreeMap<String, Vec<String>>,
}

impl std::fmt::Debug for ResourceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceController")
            .field("base", &self.base)
            .finish()
    }
}

impl ResourceController {
    /// Wrap a service.
    pub fn new(service: Arc<dyn ServiceContract>) -> Self {
        let metadata = service.metadata();
        Self {
            base: BaseResourceController::new(metadata.name, metadata.record_type),
            service,
            validation_rules: BTreeMap::new(),
        }
    }

    /// Use a specific configuration for request parsing.
    pub fn with_config(mut self, config: ResourceConfig) -> Self {
        self.base = self.base.with_config(config);
        self
    }

    /// Advertise validation rules in metadata.
    pub fn with_validation_rules(mut self, rules: BTreeMap<String, Vec<String>>) -> Self {
        self.validation_rules = rules;
        self
    }

    /// Shared request parsing.
    pub fn base(&self) -> &BaseResourceController {
        &self.base
    }

    /// Wrapped service.
    pub fn service(&self) -> &Arc<dyn ServiceContract> {
        &self.service
    }

    /// Authorize the request's actor for a controller action.
    ///
    /// Requests without an actor, or services without the authorization
    /// capability, pass unchecked.
    pub fn authorize(&self, request: &ResourceRequest, action: &str) -> AdminResult<()> {
        match (&request.actor, self.service.authorization()) {
            (Some(actor), Some(authorization)) => {
                authorization.authorize(guarding_action(action), actor.as_ref())
            }
            _ => Ok(()),
        }
    }

    fn supported_actions(&self) -> Vec<String> {
        let mut actions = Vec::new();
        if self.service.pagination().is_some() {
            actions.push("index");
        }
        if self.service.crud().is_some() {
            actions.extend(["show", "store", "update", "destroy"]);
        }
        if self.service.bulk().is_some() {
            actions.extend(["bulk_store", "bulk_destroy"]);
        }
        actions.push("metadata");
        actions.into_iter().map(String::from).collect()
    }

    fn body<'a>(&self, request: &'a ResourceRequest) -> AdminResult<&'a Value> {
        request
            .body
            .as_ref()
            .ok_or_else(|| AdminError::invalid("request body is required"))
    }

    fn unsupported(&self, capability: Capability) -> AdminError {
        AdminError::Internal(format!(
            "{} does not provide {}",
            self.base.resource,
            capability.as_str()
        ))
    }

    async fn run_index(&self, request: &ResourceRequest) -> AdminResult<ApiResponse> {
        self.authorize(request, "index")?;
        let list = self.base.validate_pagination_request(request)?;
        let pagination = self
            .service
            .pagination()
            .ok_or_else(|| self.unsupported(Capability::Pagination))?;
        let page = pagination.list(list).await?;
        Ok(ApiResponse::paginated(page))
    }

    async fn run_show(&self, request: &ResourceRequest) -> AdminResult<ApiResponse> {
        self.authorize(request, "show")?;
        let id = self.base.validate_id(request, "id")?;
        let crud = self
            .service
            .crud()
            .ok_or_else(|| self.unsupported(Capability::Crud))?;
        Ok(ApiResponse::ok(crud.find(id).await?))
    }

    async fn run_store(&self, request: &ResourceRequest) -> AdminResult<ApiResponse> {
        self.authorize(request, "store")?;
        let body = self.body(request)?.clone();
        let crud = self
            .service
            .crud()
            .ok_or_else(|| self.unsupported(Capability::Crud))?;
        let created = crud.create(body).await?;
        Ok(ApiResponse::created(
            created,
            format!("{} created successfully", self.base.record_type),
        ))
    }

    async fn run_update(&self, request: &ResourceRequest) -> AdminResult<ApiResponse> {
        self.authorize(request, "update")?;
        let id = self.base.validate_id(request, "id")?;
        let body = self.body(request)?.clone();
        let crud = self
            .service
            .crud()
            .ok_or_else(|| self.unsupported(Capability::Crud))?;
        let updated = crud.update(id, body).await?;
        Ok(ApiResponse::ok_with_message(
            updated,
            format!("{} updated successfully", self.base.record_type),
        ))
    }

    async fn run_destroy(&self, request: &ResourceRequest) -> AdminResult<ApiResponse> {
        self.authorize(request, "destroy")?;
        let id = self.base.validate_id(request, "id")?;
        let crud = self
            .service
            .crud()
            .ok_or_else(|| self.unsupported(Capability::Crud))?;
        crud.delete(id).await?;
        Ok(ApiResponse::no_content())
    }

    async fn run_bulk_store(&self, request: &ResourceRequest) -> AdminResult<ApiResponse> {
        self.authorize(request, "bulk_store")?;
        let items = match self.body(request)? {
            Value::Array(items) => items.clone(),
            Value::Object(map) => match map.get("items") {
                Some(Value::Array(items)) => items.clone(),
                _ => return Err(AdminError::invalid_field("items", "items must be an array")),
            },
            _ => return Err(AdminError::invalid("request body must be an array")),
        };
        let bulk = self
            .service
            .bulk()
            .ok_or_else(|| self.unsupported(Capability::BulkOperations))?;
        let summary = bulk.bulk_create(items).await?;
        Ok(ApiResponse::created(
            json!(summary),
            format!("{} {} records created", summary.succeeded, self.base.record_type),
        ))
    }

    async fn run_bulk_destroy(&self, request: &ResourceRequest) -> AdminResult<ApiResponse> {
        self.authorize(request, "bulk_destroy")?;
        let ids = self
            .body(request)?
            .get("ids")
            .cloned()
            .ok_or_else(|| AdminError::invalid_field("ids", "ids is required"))?;
        let ids: Vec<u64> = serde_json::from_value(ids).map_err(|_| {
            AdminError::invalid_field("ids", "ids must be an array of positive integers")
        })?;
        let bulk = self
            .service
            .bulk()
            .ok_or_else(|| self.unsupported(Capability::BulkOperations))?;
        bulk.validate_bulk_operation(&ids)?;
        let summary = bulk.bulk_delete(ids).await?;
        Ok(ApiResponse::ok_with_message(
            json!(summary),
            format!("{} {} records deleted", summary.succeeded, self.base.record_type),
        ))
    }
}

fn respond(resource: &str, action: &str, result: AdminResult<ApiResponse>) -> ApiResponse {
    match result {
        Ok(response) => response,
        Err(err) => {
            debug!(resource, action, error = %err, "Request rejected");
            ApiResponse::from_error(&err)
        }
    }
}

#[async_trait]
impl ListingAction for ResourceController {
    async fn index(&self, request: &ResourceRequest) -> ApiResponse {
        respond(&self.base.resource, "index", self.run_index(request).await)
    }
}

#[async_trait]
impl CrudActions for ResourceController {
    async fn show(&self, request: &ResourceRequest) -> ApiResponse {
        respond(&self.base.resource, "show", self.run_show(request).await)
    }

    async fn store(&self, request: &ResourceRequest) -> ApiResponse {
        respond(&self.base.resource, "store", self.run_store(request).await)
    }

    async fn update(&self, request: &ResourceRequest) -> ApiResponse {
        respond(&self.base.resource, "update", self.run_update(request).await)
    }

    async fn destroy(&self, request: &ResourceRequest) -> ApiResponse {
        respond(&self.base.resource, "destroy", self.run_destroy(request).await)
    }
}

#[async_trait]
impl BulkActions for ResourceController {
    async fn bulk_store(&self, request: &ResourceRequest) -> ApiResponse {
        respond(&self.base.resource, "bulk_store", self.run_bulk_store(request).await)
    }

    async fn bulk_destroy(&self, request: &ResourceRequest) -> ApiResponse {
        respond(
            &self.base.resource,
            "bulk_destroy",
            self.run_bulk_destroy(request).await,
        )
    }
}

impl DiscoveryAction for ResourceController {
    fn metadata(&self) -> ControllerMetadata {
        let actions = self.supported_actions();
        let required = self
            .service
            .authorization()
            .map(|a| a.required_permissions())
            .unwrap_or_default();

        let permissions = actions
            .iter()
            .filter_map(|action| {
                required
                    .get(guarding_action(action))
                    .map(|slug| (action.clone(), slug.clone()))
            })
            .collect();

        self.base
            .generate_metadata(actions, permissions, self.validation_rules.clone())
    }
}

impl ControllerContract for ResourceController {
    fn resource(&self) -> String {
        self.base.resource.clone()
    }

    fn listing(&self) -> Option<&dyn ListingAction> {
        self.service.pagination().map(|_| self as &dyn ListingAction)
    }

    fn crud_actions(&self) -> Option<&dyn CrudActions> {
        self.service.crud().map(|_| self as &dyn CrudActions)
    }

    fn bulk_actions(&self) -> Option<&dyn BulkActions> {
        self.service.bulk().map(|_| self as &dyn BulkActions)
    }

    fn discovery(&self) -> Option<&dyn DiscoveryAction> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> BaseResourceController {
        BaseResourceController::new("books", "Book")
    }

    #[test]
    fn test_pagination_request_defaults() {
        let list = base()
            .validate_pagination_request(&ResourceRequest::new())
            .unwrap();
        assert_eq!(list.page, 1);
        assert_eq!(list.page_size, 20);
        assert_eq!(list.direction, "DESC");
        assert!(list.sort.is_none());
        assert!(list.filters.is_empty());
    }

    #[test]
    fn test_pagination_request_rejects_bad_page() {
        for raw in ["0", "-4"] {
            let err = base()
                .validate_pagination_request(&ResourceRequest::new().with_query("page", raw))
                .unwrap_err();
            assert_eq!(err.to_string(), "page must be greater than 0");
        }
        let err = base()
            .validate_pagination_request(&ResourceRequest::new().with_query("page", "two"))
            .unwrap_err();
        assert_eq!(err.field(), Some("page"));
    }

    #[test]
    fn test_page_size_outside_allowed_set_falls_back() {
        for raw in ["7", "0", "-5", "101", "9999", "lots"] {
            let list = base()
                .validate_pagination_request(&ResourceRequest::new().with_query("page_size", raw))
                .unwrap();
            assert_eq!(list.page_size, 20, "page_size={raw}");
        }
        for size in [5, 10, 20, 30, 50, 100] {
            let list = base()
                .validate_pagination_request(
                    &ResourceRequest::new().with_query("pageSize", size.to_string()),
                )
                .unwrap();
            assert_eq!(list.page_size, size);
        }
        let list = base()
            .validate_pagination_request(&ResourceRequest::new().with_query("per_page", "50"))
            .unwrap();
        assert_eq!(list.page_size, 50);
    }

    #[test]
    fn test_pagination_request_parses_sort_search_and_filters() {
        let request = ResourceRequest::new()
            .with_query("page", "3")
            .with_query("sort", "title")
            .with_query("direction", "asc")
            .with_query("search", "  dune ")
            .with_query("filter[genre]", "scifi")
            .with_query("filter[year]", "1965")
            .with_query("filter[available]", "true");
        let list = base().validate_pagination_request(&request).unwrap();
        assert_eq!(list.page, 3);
        assert_eq!(list.sort.as_deref(), Some("title"));
        assert_eq!(list.direction, "ASC");
        assert_eq!(list.search.as_deref(), Some("dune"));
        assert_eq!(list.filters["genre"], json!("scifi"));
        assert_eq!(list.filters["year"], json!(1965));
        assert_eq!(list.filters["available"], json!(true));

        let list = base()
            .validate_pagination_request(&ResourceRequest::new().with_query("filter[code]", "007"))
            .unwrap();
        assert_eq!(list.filters["code"], json!("007"));

        let list = base()
            .validate_pagination_request(&ResourceRequest::new().with_query("direction", "up"))
            .unwrap();
        assert_eq!(list.direction, "DESC");
    }

    #[test]
    fn test_pagination_request_rejects_unreachable_page() {
        let request = ResourceRequest::new()
            .with_query("page", i64::MAX.to_string())
            .with_query("page_size", "100");
        let err = base().validate_pagination_request(&request).unwrap_err();
        assert!(matches!(err, AdminError::InvalidArgument { .. }));
        assert_eq!(err.field(), Some("page"));
    }

    #[test]
    fn test_validate_id() {
        let controller = base();
        let request = ResourceRequest::new().with_param("id", "42");
        assert_eq!(controller.validate_id(&request, "id").unwrap(), 42);

        let err = controller
            .validate_id(&ResourceRequest::new(), "id")
            .unwrap_err();
        assert_eq!(err.to_string(), "id is required");

        for raw in ["0", "abc", "-1", "4.5"] {
            let request = ResourceRequest::new().with_param("id", raw);
            assert!(controller.validate_id(&request, "id").is_err(), "id={raw}");
        }
    }

    #[test]
    fn test_generate_metadata() {
        let mut permissions = BTreeMap::new();
        permissions.insert("index".to_string(), "books.view".to_string());
        let metadata = base().generate_metadata(
            vec!["index".to_string()],
            permissions,
            BTreeMap::new(),
        );
        assert_eq!(metadata.resource, "books");
        assert_eq!(metadata.pagination.allowed_page_sizes, vec![5, 10, 20, 30, 50, 100]);
        assert_eq!(metadata.permissions["index"], "books.view");
    }

    #[test]
    fn test_guarding_action() {
        assert_eq!(guarding_action("index"), "view");
        assert_eq!(guarding_action("show"), "view");
        assert_eq!(guarding_action("bulk_store"), "create");
        assert_eq!(guarding_action("bulk_destroy"), "delete");
    }
}
