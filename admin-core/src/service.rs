//! Base resource service
//!
//! Default pagination, sorting, filtering and bulk semantics shared by every
//! resource. Concrete services hold a [`BaseResourceService`] and delegate to
//! it; per-resource validation is plugged in through [`RecordRules`].

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::config::ResourceConfig;
use crate::contracts::{
    AuthorizationContract, BulkContract, Capability, CrudContract, FilteringContract,
    PaginationContract, PermissionLookup, ServiceContract, SortingContract,
};
use crate::error::{AdminError, AdminResult};
use crate::store::{Query, Record, Repository};
use crate::types::{
    BulkSummary, ListRequest, PaginatedResult, PaginationConfig, ServiceMetadata, SortDirection,
};

/// Check a bulk id list against `max` and for zero or repeated ids.
///
/// Single pass with a seen-set; the error cites the first offending id.
pub fn validate_bulk_ids(ids: &[u64], max: usize) -> AdminResult<()> {
    if ids.is_empty() {
        return Err(AdminError::invalid_field("ids", "no ids provided"));
    }
    if ids.len() > max {
        return Err(AdminError::invalid_field(
            "ids",
            format!("too many ids: {} exceeds the limit of {}", ids.len(), max),
        ));
    }

    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if *id == 0 {
            return Err(AdminError::invalid_field("ids", "invalid id 0"));
        }
        if !seen.insert(*id) {
            return Err(AdminError::Conflict(format!("duplicate id {}", id)));
        }
    }
    Ok(())
}

/// Static description of a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    /// Resource name, used in permission slugs and registry keys (e.g. "books").
    pub name: String,
    /// Display name of one record (e.g. "Book").
    pub record_type: String,
    /// Fields accepted as sort keys.
    pub sortable_fields: Vec<String>,
    /// Fields accepted as filter keys.
    pub filterable_fields: Vec<String>,
    /// Fields matched by free-text search.
    pub searchable_fields: Vec<String>,
    /// Permission slug required for each action.
    pub permissions: BTreeMap<String, String>,
}

impl ResourceDescriptor {
    /// Create a descriptor; `id` is always sortable.
    pub fn new(name: impl Into<String>, record_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record_type: record_type.into(),
            sortable_fields: vec!["id".to_string()],
            filterable_fields: Vec::new(),
            searchable_fields: Vec::new(),
            permissions: BTreeMap::new(),
        }
    }

    /// Add sortable fields.
    pub fn sortable(mut self, fields: &[&str]) -> Self {
        for field in fields {
            if !self.sortable_fields.iter().any(|f| f == field) {
                self.sortable_fields.push(field.to_string());
            }
        }
        self
    }

    /// Add filterable fields.
    pub fn filterable(mut self, fields: &[&str]) -> Self {
        self.filterable_fields
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    /// Add searchable fields.
    pub fn searchable(mut self, fields: &[&str]) -> Self {
        self.searchable_fields
            .extend(fields.iter().map(|f| f.to_string()));
        self
    }

    /// Require `slug` for `action`.
    pub fn permission(mut self, action: impl Into<String>, slug: impl Into<String>) -> Self {
        self.permissions.insert(action.into(), slug.into());
        self
    }

    /// Require `<name>.<action>` for the standard CRUD actions.
    pub fn standard_permissions(mut self) -> Self {
        for action in ["view", "create", "update", "delete"] {
            let slug = format!("{}.{}", self.name, action);
            self.permissions.insert(action.to_string(), slug);
        }
        self
    }
}

/// Per-resource record validation.
///
/// Every method has a permissive default, so a resource overrides only
/// what it needs.
pub trait RecordRules<R>: Send + Sync {
    /// Check a record before insert.
    fn validate_create(&self, _record: &R) -> AdminResult<()> {
        Ok(())
    }

    /// Check a record before update.
    fn validate_update(&self, _record: &R) -> AdminResult<()> {
        Ok(())
    }

    /// Fill derived fields before insert (timestamps, slugs).
    fn prepare_create(&self, record: R) -> R {
        record
    }

    /// Fill derived fields before update, given the stored version.
    fn prepare_update(&self, _existing: &R, record: R) -> R {
        record
    }

    /// Validation rules advertised in controller metadata.
    fn validation_rules(&self) -> BTreeMap<String, Vec<String>> {
        BTreeMap::new()
    }
}

/// Rules that accept every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRules;

impl<R> RecordRules<R> for NoRules {}

/// Default resource service.
pub struct BaseResourceService<R: Record> {
    descriptor: ResourceDescriptor,
    config: ResourceConfig,
    repository: Arc<dyn Repository<R>>,
    rules: Arc<dyn RecordRules<R>>,
}

impl<R: Record> std::fmt::Debug for BaseResourceService<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseResourceService")
            .field("resource", &self.descriptor.name)
            .field("config", &self.config)
            .finish()
    }
}

impl<R: Record> BaseResourceService<R> {
    /// Create a service with default configuration and no record rules.
    pub fn new(descriptor: ResourceDescriptor, repository: Arc<dyn Repository<R>>) -> Self {
        Self {
            descriptor,
            config: ResourceConfig::default(),
            repository,
            rules: Arc::new(NoRules),
        }
    }

    /// Use a specific configuration.
    pub fn with_config(mut self, config: ResourceConfig) -> Self {
        self.config = config;
        self
    }

    /// Use per-resource record rules.
    pub fn with_rules(mut self, rules: Arc<dyn RecordRules<R>>) -> Self {
        self.rules = rules;
        self
    }

    /// Resource description.
    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// Pagination and bulk configuration.
    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// Underlying repository.
    pub fn repository(&self) -> &Arc<dyn Repository<R>> {
        &self.repository
    }

    /// Record rules.
    pub fn rules(&self) -> &Arc<dyn RecordRules<R>> {
        &self.rules
    }

    // ------------------------------------------------------------------
    // Validation and sanitization
    // ------------------------------------------------------------------

    /// Check page and page size bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use admin_core::{BaseResourceService, MemoryRepository, ResourceDescriptor};
    /// # use admin_core::store::Record;
    /// # #[derive(Clone, serde::Serialize, serde::Deserialize)]
    /// # struct Note { id: u64 }
    /// # impl Record for Note {
    /// #     const TABLE: &'static str = "notes";
    /// #     fn id(&self) -> u64 { self.id }
    /// #     fn set_id(&mut self, id: u64) { self.id = id }
    /// # }
    /// let service: BaseResourceService<Note> = BaseResourceService::new(
    ///     ResourceDescriptor::new("notes", "Note"),
    ///     MemoryRepository::<Note>::shared(),
    /// );
    /// let err = service.validate_pagination_params(0, 20).unwrap_err();
    /// assert_eq!(err.to_string(), "page must be greater than 0");
    /// assert!(service.validate_pagination_params(1, 100).is_ok());
    /// ```
    pub fn validate_pagination_params(&self, page: i64, page_size: i64) -> AdminResult<()> {
        if page <= 0 {
            return Err(AdminError::invalid_field(
                "page",
                "page must be greater than 0",
            ));
        }
        if page_size <= 0 {
            return Err(AdminError::invalid_field(
                "page_size",
                "page size must be greater than 0",
            ));
        }
        if page_size > self.config.max_page_size {
            return Err(AdminError::invalid_field(
                "page_size",
                format!(
                    "page size must not exceed {}",
                    self.config.max_page_size
                ),
            ));
        }
        if ListRequest::new(page, page_size).checked_offset().is_none() {
            return Err(AdminError::invalid_field(
                "page",
                format!("page {} is out of range", page),
            ));
        }
        Ok(())
    }

    /// Check a sort field against the sortable set.
    pub fn validate_sort_field(&self, field: &str) -> AdminResult<()> {
        if self.descriptor.sortable_fields.iter().any(|f| f == field) {
            Ok(())
        } else {
            Err(AdminError::invalid_field(
                "sort",
                format!(
                    "cannot sort {} by '{}', allowed: {}",
                    self.descriptor.name,
                    field,
                    self.descriptor.sortable_fields.join(", ")
                ),
            ))
        }
    }

    /// Check a raw sort direction.
    pub fn validate_sort_direction(&self, direction: &str) -> AdminResult<SortDirection> {
        SortDirection::parse(direction).ok_or_else(|| {
            AdminError::invalid_field(
                "direction",
                format!("direction must be ASC or DESC, got '{}'", direction),
            )
        })
    }

    /// Apply defaults, then validate pagination, sort and filters.
    ///
    /// Returns the defaulted request; errors name the offending field.
    pub fn validate_list_request(&self, mut request: ListRequest) -> AdminResult<ListRequest> {
        request.apply_defaults(&self.config);

        self.validate_pagination_params(request.page, request.page_size)
            .map_err(|e| {
                let field = e.field().unwrap_or("page").to_string();
                e.in_field(&field)
            })?;
        self.validate_sort_direction(&request.direction)
            .map_err(|e| e.in_field("direction"))?;
        if let Some(ref sort) = request.sort {
            self.validate_sort_field(sort)
                .map_err(|e| e.in_field("sort"))?;
        }
        self.validate_filters(&request.filters)?;

        Ok(request)
    }

    /// Coerce a request into valid bounds.
    ///
    /// - `page` is clamped to at least 1
    /// - `page_size` falls back to the default when ≤ 0 or unrecognized,
    ///   and is clamped to the maximum when too large
    /// - `direction` becomes `ASC`/`DESC`, defaulting on anything else
    /// - `search` is trimmed
    pub fn sanitize_list_request(&self, mut request: ListRequest) -> ListRequest {
        if request.page < 1 {
            request.page = 1;
        }

        request.page_size = if request.page_size <= 0 {
            self.config.default_page_size
        } else if request.page_size > self.config.max_page_size {
            self.config.max_page_size
        } else if !self.config.is_allowed_page_size(request.page_size) {
            self.config.default_page_size
        } else {
            request.page_size
        };

        request.direction =
            SortDirection::normalize(&request.direction, self.config.default_direction)
                .as_str()
                .to_string();

        request.search = request
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        request
    }

    /// Check one filter value.
    ///
    /// Accepts non-empty strings (after trimming), numbers and booleans.
    pub fn validate_filter_value(&self, field: &str, value: &Value) -> AdminResult<()> {
        match value {
            Value::Null => Err(AdminError::invalid_field(
                field,
                format!("filter '{}' must not be null", field),
            )),
            Value::String(s) if s.trim().is_empty() => Err(AdminError::invalid_field(
                field,
                format!("filter '{}' must not be empty", field),
            )),
            Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(()),
            Value::Array(_) | Value::Object(_) => Err(AdminError::invalid_field(
                field,
                format!("filter '{}' has an unsupported type", field),
            )),
        }
    }

    /// Check every filter key and value.
    pub fn validate_filters(&self, filters: &BTreeMap<String, Value>) -> AdminResult<()> {
        for (field, value) in filters {
            if !self.descriptor.filterable_fields.iter().any(|f| f == field) {
                return Err(AdminError::invalid_field(
                    field.as_str(),
                    format!("cannot filter {} by '{}'", self.descriptor.name, field),
                ));
            }
            self.validate_filter_value(field, value)?;
        }
        Ok(())
    }

    /// Check a bulk id list.
    ///
    /// Rejects empty lists, lists above the bulk ceiling, the zero id and
    /// duplicates; the error cites the offending id.
    pub fn validate_bulk_operation(&self, ids: &[u64]) -> AdminResult<()> {
        validate_bulk_ids(ids, self.config.max_bulk_size)
    }

    /// Translate a validated request into a store query.
    pub fn build_query(&self, request: &ListRequest) -> Query {
        let mut query = Query::new();

        for (field, value) in &request.filters {
            query = query.filter_eq(field.clone(), value.clone());
        }

        if let Some(ref term) = request.search {
            if !self.descriptor.searchable_fields.is_empty() {
                let fields: Vec<&str> = self
                    .descriptor
                    .searchable_fields
                    .iter()
                    .map(String::as_str)
                    .collect();
                query = query.search(&fields, term.clone());
            }
        }

        let sort = request
            .sort
            .clone()
            .unwrap_or_else(|| self.config.default_sort_field.clone());
        let direction = request
            .sort_direction()
            .unwrap_or(self.config.default_direction);
        query = query.order_by(sort.clone(), direction);
        if sort != "id" {
            query = query.order_by("id", SortDirection::Asc);
        }

        query
            .offset(request.offset())
            .limit(request.page_size.max(1) as u64)
    }

    // ------------------------------------------------------------------
    // Typed operations
    // ------------------------------------------------------------------

    /// Validate the request and return one page of records.
    #[instrument(skip(self, request), fields(resource = %self.descriptor.name))]
    pub async fn list(&self, request: ListRequest) -> AdminResult<PaginatedResult<R>> {
        let request = self.validate_list_request(request)?;
        let query = self.build_query(&request);

        let total = self.repository.count(&query).await?;
        let data = self.repository.find_many(&query).await?;

        debug!(total, page = request.page, "Listed records");
        Ok(PaginatedResult::new(
            data,
            total,
            request.page as u64,
            request.page_size as u64,
        ))
    }

    /// Count records matching the request's filters and search.
    pub async fn count(&self, request: &ListRequest) -> AdminResult<u64> {
        self.validate_filters(&request.filters)?;
        let mut request = request.clone();
        request.apply_defaults(&self.config);
        let query = self.build_query(&request).unpaged();
        Ok(self.repository.count(&query).await?)
    }

    /// Find a record or fail with `NotFound`.
    pub async fn find(&self, id: u64) -> AdminResult<R> {
        if id == 0 {
            return Err(AdminError::invalid_field("id", "invalid id 0"));
        }
        self.repository
            .find(id)
            .await?
            .ok_or_else(|| AdminError::not_found(&self.descriptor.record_type, id))
    }

    /// Validate and insert a record.
    pub async fn create(&self, record: R) -> AdminResult<R> {
        let record = self.rules.prepare_create(record);
        self.rules.validate_create(&record)?;
        let created = self.repository.create(record).await?;
        debug!(resource = %self.descriptor.name, id = created.id(), "Record created");
        Ok(created)
    }

    /// Validate and replace an existing record.
    pub async fn update(&self, record: R) -> AdminResult<R> {
        let existing = self.find(record.id()).await?;
        let record = self.rules.prepare_update(&existing, record);
        self.rules.validate_update(&record)?;
        let updated = self.repository.update(record).await?;
        debug!(resource = %self.descriptor.name, id = updated.id(), "Record updated");
        Ok(updated)
    }

    /// Delete a record or fail with `NotFound`.
    pub async fn delete(&self, id: u64) -> AdminResult<()> {
        if !self.repository.delete(id).await? {
            return Err(AdminError::not_found(&self.descriptor.record_type, id));
        }
        debug!(resource = %self.descriptor.name, id, "Record deleted");
        Ok(())
    }

    /// Create records one by one; stops at the first failure.
    pub async fn bulk_create_records(&self, records: Vec<R>) -> AdminResult<BulkSummary> {
        let total = records.len();
        self.check_bulk_size(total)?;

        let mut ids = Vec::with_capacity(total);
        for record in records {
            match self.create(record).await {
                Ok(created) => ids.push(created.id()),
                Err(e) => return Err(self.partial_failure("bulk_create", ids.len(), total, e)),
            }
        }
        Ok(BulkSummary {
            total,
            succeeded: ids.len(),
            ids,
        })
    }

    /// Update records one by one; stops at the first failure.
    pub async fn bulk_update_records(&self, records: Vec<R>) -> AdminResult<BulkSummary> {
        let requested: Vec<u64> = records.iter().map(R::id).collect();
        self.validate_bulk_operation(&requested)?;

        let total = records.len();
        let mut ids = Vec::with_capacity(total);
        for record in records {
            match self.update(record).await {
                Ok(updated) => ids.push(updated.id()),
                Err(e) => return Err(self.partial_failure("bulk_update", ids.len(), total, e)),
            }
        }
        Ok(BulkSummary {
            total,
            succeeded: ids.len(),
            ids,
        })
    }

    /// Delete records one by one; stops at the first failure.
    pub async fn bulk_delete_records(&self, requested: Vec<u64>) -> AdminResult<BulkSummary> {
        self.validate_bulk_operation(&requested)?;

        let total = requested.len();
        let mut ids = Vec::with_capacity(total);
        for id in requested {
            match self.delete(id).await {
                Ok(()) => ids.push(id),
                Err(e) => return Err(self.partial_failure("bulk_delete", ids.len(), total, e)),
            }
        }
        Ok(BulkSummary {
            total,
            succeeded: ids.len(),
            ids,
        })
    }

    /// Create payloads one by one through `crud`; stops at the first failure.
    ///
    /// A service wrapping the base passes itself, so its own per-record
    /// checks run for every item. Every payload is decoded before the first
    /// write.
    pub async fn bulk_create_via(
        &self,
        crud: &dyn CrudContract,
        payloads: Vec<Value>,
    ) -> AdminResult<BulkSummary> {
        let total = payloads.len();
        self.check_bulk_size(total)?;
        for payload in &payloads {
            self.decode(payload.clone())?;
        }

        let mut ids = Vec::with_capacity(total);
        for payload in payloads {
            let created = crud
                .create(payload)
                .await
                .and_then(|value| self.decode(value));
            match created {
                Ok(created) => ids.push(created.id()),
                Err(e) => return Err(self.partial_failure("bulk_create", ids.len(), total, e)),
            }
        }
        Ok(BulkSummary {
            total,
            succeeded: ids.len(),
            ids,
        })
    }

    /// Update payloads one by one through `crud`; each payload carries its
    /// `id`. Stops at the first failure.
    pub async fn bulk_update_via(
        &self,
        crud: &dyn CrudContract,
        payloads: Vec<Value>,
    ) -> AdminResult<BulkSummary> {
        let mut requested = Vec::with_capacity(payloads.len());
        for payload in &payloads {
            requested.push(self.decode(payload.clone())?.id());
        }
        self.validate_bulk_operation(&requested)?;

        let total = payloads.len();
        let mut ids = Vec::with_capacity(total);
        for (id, payload) in requested.into_iter().zip(payloads) {
            match crud.update(id, payload).await {
                Ok(_) => ids.push(id),
                Err(e) => return Err(self.partial_failure("bulk_update", ids.len(), total, e)),
            }
        }
        Ok(BulkSummary {
            total,
            succeeded: ids.len(),
            ids,
        })
    }

    /// Delete ids one by one through `crud`; stops at the first failure.
    pub async fn bulk_delete_via(
        &self,
        crud: &dyn CrudContract,
        requested: Vec<u64>,
    ) -> AdminResult<BulkSummary> {
        self.validate_bulk_operation(&requested)?;

        let total = requested.len();
        let mut ids = Vec::with_capacity(total);
        for id in requested {
            match crud.delete(id).await {
                Ok(()) => ids.push(id),
                Err(e) => return Err(self.partial_failure("bulk_delete", ids.len(), total, e)),
            }
        }
        Ok(BulkSummary {
            total,
            succeeded: ids.len(),
            ids,
        })
    }

    fn check_bulk_size(&self, count: usize) -> AdminResult<()> {
        if count == 0 {
            return Err(AdminError::invalid_field("items", "no items provided"));
        }
        if count > self.config.max_bulk_size {
            return Err(AdminError::invalid_field(
                "items",
                format!(
                    "too many items: {} exceeds the limit of {}",
                    count, self.config.max_bulk_size
                ),
            ));
        }
        Ok(())
    }

    fn partial_failure(
        &self,
        operation: &str,
        succeeded: usize,
        total: usize,
        source: AdminError,
    ) -> AdminError {
        warn!(
            resource = %self.descriptor.name,
            operation,
            succeeded,
            total,
            error = %source,
            "Bulk operation stopped part-way"
        );
        AdminError::partial(succeeded, total, source)
    }

    // ------------------------------------------------------------------
    // Payload conversion
    // ------------------------------------------------------------------

    /// Decode a JSON payload into a record.
    pub fn decode(&self, payload: Value) -> AdminResult<R> {
        serde_json::from_value(payload).map_err(|e| {
            AdminError::invalid(format!(
                "invalid {} payload: {}",
                self.descriptor.record_type, e
            ))
        })
    }

    /// Encode a record as JSON.
    pub fn encode(&self, record: &R) -> AdminResult<Value> {
        Ok(record.to_row()?)
    }

    /// Service self-description.
    pub fn service_metadata(&self, capabilities: &[Capability]) -> ServiceMetadata {
        ServiceMetadata {
            name: self.descriptor.name.clone(),
            record_type: self.descriptor.record_type.clone(),
            capabilities: capabilities.iter().map(|c| c.as_str().to_string()).collect(),
            sortable_fields: self.descriptor.sortable_fields.clone(),
            filterable_fields: self.descriptor.filterable_fields.clone(),
            searchable_fields: self.descriptor.searchable_fields.clone(),
            pagination: PaginationConfig::from(&self.config),
        }
    }
}

#[async_trait]
impl<R: Record> CrudContract for BaseResourceService<R> {
    async fn find(&self, id: u64) -> AdminResult<Value> {
        let record = BaseResourceService::find(self, id).await?;
        self.encode(&record)
    }

    async fn create(&self, payload: Value) -> AdminResult<Value> {
        let mut record = self.decode(payload)?;
        record.set_id(0);
        let created = BaseResourceService::create(self, record).await?;
        self.encode(&created)
    }

    async fn update(&self, id: u64, payload: Value) -> AdminResult<Value> {
        let mut record = self.decode(payload)?;
        record.set_id(id);
        let updated = BaseResourceService::update(self, record).await?;
        self.encode(&updated)
    }

    async fn delete(&self, id: u64) -> AdminResult<()> {
        BaseResourceService::delete(self, id).await
    }
}

#[async_trait]
impl<R: Record> PaginationContract for BaseResourceService<R> {
    async fn list(&self, request: ListRequest) -> AdminResult<PaginatedResult<Value>> {
        let page = BaseResourceService::list(self, request).await?;
        let mut rows = Vec::with_capacity(page.data.len());
        for record in &page.data {
            rows.push(self.encode(record)?);
        }
        let page = page.map(|_| Value::Null);
        Ok(PaginatedResult { data: rows, ..page })
    }

    async fn count(&self, request: &ListRequest) -> AdminResult<u64> {
        BaseResourceService::count(self, request).await
    }

    fn validate_pagination_params(&self, page: i64, page_size: i64) -> AdminResult<()> {
        BaseResourceService::validate_pagination_params(self, page, page_size)
    }

    fn sanitize_list_request(&self, request: ListRequest) -> ListRequest {
        BaseResourceService::sanitize_list_request(self, request)
    }
}

impl<R: Record> SortingContract for BaseResourceService<R> {
    fn sortable_fields(&self) -> Vec<String> {
        self.descriptor.sortable_fields.clone()
    }

    fn default_sort(&self) -> (String, SortDirection) {
        (
            self.config.default_sort_field.clone(),
            self.config.default_direction,
        )
    }

    fn validate_sort(&self, field: &str, direction: &str) -> AdminResult<()> {
        self.validate_sort_field(field)?;
        self.validate_sort_direction(direction)?;
        Ok(())
    }
}

impl<R: Record> FilteringContract for BaseResourceService<R> {
    fn filterable_fields(&self) -> Vec<String> {
        self.descriptor.filterable_fields.clone()
    }

    fn searchable_fields(&self) -> Vec<String> {
        self.descriptor.searchable_fields.clone()
    }

    fn validate_filter_value(&self, field: &str, value: &Value) -> AdminResult<()> {
        BaseResourceService::validate_filter_value(self, field, value)
    }

    fn validate_filters(&self, filters: &BTreeMap<String, Value>) -> AdminResult<()> {
        BaseResourceService::validate_filters(self, filters)
    }
}

#[async_trait]
impl<R: Record> BulkContract for BaseResourceService<R> {
    fn validate_bulk_operation(&self, ids: &[u64]) -> AdminResult<()> {
        BaseResourceService::validate_bulk_operation(self, ids)
    }

    async fn bulk_create(&self, payloads: Vec<Value>) -> AdminResult<BulkSummary> {
        self.bulk_create_via(self, payloads).await
    }

    async fn bulk_update(&self, payloads: Vec<Value>) -> AdminResult<BulkSummary> {
        self.bulk_update_via(self, payloads).await
    }

    async fn bulk_delete(&self, ids: Vec<u64>) -> AdminResult<BulkSummary> {
        self.bulk_delete_via(self, ids).await
    }
}

impl<R: Record> AuthorizationContract for BaseResourceService<R> {
    fn required_permissions(&self) -> BTreeMap<String, String> {
        self.descriptor.permissions.clone()
    }

    fn authorize(&self, action: &str, actor: &dyn PermissionLookup) -> AdminResult<()> {
        let slug = self.descriptor.permissions.get(action).ok_or_else(|| {
            AdminError::invalid_field(
                "action",
                format!("{} has no action '{}'", self.descriptor.name, action),
            )
        })?;

        if actor.has_permission(slug) {
            Ok(())
        } else {
            debug!(resource = %self.descriptor.name, action, permission = %slug, "Authorization denied");
            Err(AdminError::Forbidden {
                permission: slug.clone(),
            })
        }
    }
}

impl<R: Record> ServiceContract for BaseResourceService<R> {
    fn metadata(&self) -> ServiceMetadata {
        self.service_metadata(&Capability::service_surface())
    }

    fn crud(&self) -> Option<&dyn CrudContract> {
        Some(self)
    }

    fn pagination(&self) -> Option<&dyn PaginationContract> {
        Some(self)
    }

    fn sorting(&self) -> Option<&dyn SortingContract> {
        Some(self)
    }

    fn filtering(&self) -> Option<&dyn FilteringContract> {
        Some(self)
    }

    fn bulk(&self) -> Option<&dyn BulkContract> {
        Some(self)
    }

    fn authorization(&self) -> Option<&dyn AuthorizationContract> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRepository;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Article {
        #[serde(default)]
        id: u64,
        title: String,
        status: String,
        views: i64,
    }

    impl Article {
        fn new(title: &str, status: &str, views: i64) -> Self {
            Self {
                id: 0,
                title: title.to_string(),
                status: status.to_string(),
                views,
            }
        }
    }

    impl Record for Article {
        const TABLE: &'static str = "articles";

        fn id(&self) -> u64 {
            self.id
        }

        fn set_id(&mut self, id: u64) {
            self.id = id;
        }
    }

    struct TitleRequired;

    impl RecordRules<Article> for TitleRequired {
        fn validate_create(&self, record: &Article) -> AdminResult<()> {
            if record.title.trim().is_empty() {
                return Err(AdminError::invalid_field("title", "title is required"));
            }
            Ok(())
        }
    }

    fn service() -> BaseResourceService<Article> {
        BaseResourceService::new(
            ResourceDescriptor::new("articles", "Article")
                .sortable(&["title", "views"])
                .filterable(&["status"])
                .searchable(&["title"])
                .standard_permissions(),
            MemoryRepository::<Article>::shared(),
        )
        .with_rules(Arc::new(TitleRequired))
    }

    struct Granted(Vec<&'static str>);

    impl PermissionLookup for Granted {
        fn has_permission(&self, slug: &str) -> bool {
            self.0.contains(&slug)
        }
    }

    #[test]
    fn test_validate_pagination_params() {
        let svc = service();
        for page in [0, -1, -100] {
            let err = svc.validate_pagination_params(page, 20).unwrap_err();
            assert!(matches!(err, AdminError::InvalidArgument { .. }));
        }
        assert_eq!(
            svc.validate_pagination_params(0, 20).unwrap_err().to_string(),
            "page must be greater than 0"
        );
        assert!(svc.validate_pagination_params(1, 0).is_err());
        assert!(svc.validate_pagination_params(1, 101).is_err());
        assert!(svc.validate_pagination_params(3, 100).is_ok());
    }

    #[test]
    fn test_validate_list_request_names_field() {
        let svc = service();

        let err = svc
            .validate_list_request(ListRequest::new(-1, 20))
            .unwrap_err();
        assert_eq!(err.field(), Some("page"));
        assert_eq!(err.to_string(), "invalid page: page must be greater than 0");

        let err = svc
            .validate_list_request(ListRequest::new(1, 500))
            .unwrap_err();
        assert_eq!(err.field(), Some("page_size"));

        let err = svc
            .validate_list_request(ListRequest::new(1, 20).with_direction("sideways"))
            .unwrap_err();
        assert_eq!(err.field(), Some("direction"));

        let err = svc
            .validate_list_request(ListRequest::new(1, 20).with_sort("secret", SortDirection::Asc))
            .unwrap_err();
        assert_eq!(err.field(), Some("sort"));

        let err = svc
            .validate_list_request(ListRequest::new(1, 20).with_filter("views", json!(3)))
            .unwrap_err();
        assert_eq!(err.field(), Some("views"));
    }

    #[test]
    fn test_validate_list_request_applies_defaults() {
        let svc = service();
        let request = svc
            .validate_list_request(ListRequest {
                page: 0,
                page_size: 0,
                direction: String::new(),
                ..ListRequest::default()
            })
            .unwrap();
        assert_eq!(request.page, 1);
        assert_eq!(request.page_size, 20);
        assert_eq!(request.sort.as_deref(), Some("id"));
        assert_eq!(request.direction, "DESC");
    }

    #[test]
    fn test_sanitize_list_request() {
        let svc = service();
        let sanitized = svc.sanitize_list_request(ListRequest {
            page: -1,
            page_size: 9999,
            direction: "sideways".to_string(),
            search: Some("  rust  ".to_string()),
            ..ListRequest::default()
        });
        assert_eq!(sanitized.page, 1);
        assert_eq!(sanitized.page_size, 100);
        assert_eq!(sanitized.direction, "DESC");
        assert_eq!(sanitized.search.as_deref(), Some("rust"));

        let sanitized = svc.sanitize_list_request(ListRequest::new(2, 0).with_direction("asc"));
        assert_eq!(sanitized.page, 2);
        assert_eq!(sanitized.page_size, 20);
        assert_eq!(sanitized.direction, "ASC");

        let sanitized = svc.sanitize_list_request(ListRequest::new(1, 7));
        assert_eq!(sanitized.page_size, 20);

        let sanitized = svc.sanitize_list_request(ListRequest::new(1, 50));
        assert_eq!(sanitized.page_size, 50);
    }

    #[test]
    fn test_validate_filter_value() {
        let svc = service();
        assert!(svc.validate_filter_value("status", &json!(null)).is_err());
        assert!(svc.validate_filter_value("status", &json!("")).is_err());
        assert!(svc.validate_filter_value("status", &json!("   ")).is_err());
        assert!(svc.validate_filter_value("status", &json!([1, 2])).is_err());
        assert!(svc.validate_filter_value("status", &json!({"a": 1})).is_err());
        assert!(svc.validate_filter_value("status", &json!("draft")).is_ok());
        assert!(svc.validate_filter_value("status", &json!(3)).is_ok());
        assert!(svc.validate_filter_value("status", &json!(2.5)).is_ok());
        assert!(svc.validate_filter_value("status", &json!(false)).is_ok());
    }

    #[test]
    fn test_validate_bulk_operation() {
        let svc = service();

        assert!(svc.validate_bulk_operation(&[]).is_err());

        let err = svc.validate_bulk_operation(&[1, 2, 2]).unwrap_err();
        assert!(matches!(err, AdminError::Conflict(_)));
        assert_eq!(err.to_string(), "duplicate id 2");

        let err = svc.validate_bulk_operation(&[4, 0, 5]).unwrap_err();
        assert_eq!(err.to_string(), "invalid id 0");

        let too_many: Vec<u64> = (1..=1001).collect();
        assert!(svc.validate_bulk_operation(&too_many).is_err());

        let at_limit: Vec<u64> = (1..=1000).collect();
        assert!(svc.validate_bulk_operation(&at_limit).is_ok());
    }

    #[tokio::test]
    async fn test_list_filters_searches_and_pages() {
        let svc = service();
        for (title, status, views) in [
            ("Rust ownership", "published", 10),
            ("Rust traits", "draft", 5),
            ("Go channels", "published", 7),
            ("Rust async", "published", 1),
        ] {
            svc.create(Article::new(title, status, views)).await.unwrap();
        }

        let page = svc
            .list(
                ListRequest::new(1, 5)
                    .with_search("rust")
                    .with_filter("status", json!("published"))
                    .with_sort("views", SortDirection::Asc),
            )
            .await
            .unwrap();
        let titles: Vec<&str> = page.data.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Rust async", "Rust ownership"]);
        assert_eq!(page.total, 2);
        assert_eq!(page.last_page, 1);

        let page = svc.list(ListRequest::new(2, 5)).await;
        assert!(page.is_ok());

        let first = svc
            .list(ListRequest::new(1, 5).with_sort("id", SortDirection::Desc))
            .await
            .unwrap();
        assert_eq!(first.data[0].id, 4);
    }

    #[tokio::test]
    async fn test_crud_and_not_found() {
        let svc = service();
        let created = svc.create(Article::new("Draft", "draft", 0)).await.unwrap();
        assert_eq!(created.id, 1);

        let mut changed = created.clone();
        changed.status = "published".to_string();
        let updated = svc.update(changed).await.unwrap();
        assert_eq!(updated.status, "published");

        svc.delete(1).await.unwrap();
        let err = svc.find(1).await.unwrap_err();
        assert_eq!(err.to_string(), "Article with ID 1 not found");
        assert!(svc.delete(1).await.is_err());

        let err = svc.create(Article::new(" ", "draft", 0)).await.unwrap_err();
        assert_eq!(err.field(), Some("title"));
    }

    #[tokio::test]
    async fn test_bulk_delete_reports_partial_success() {
        let svc = service();
        for n in 0..3 {
            svc.create(Article::new(&format!("a{}", n), "draft", n))
                .await
                .unwrap();
        }

        let err = svc.bulk_delete_records(vec![1, 2, 9, 3]).await.unwrap_err();
        match err {
            AdminError::PartialFailure {
                succeeded, total, ..
            } => {
                assert_eq!(succeeded, 2);
                assert_eq!(total, 4);
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
        // Earlier deletions stay committed, later ids are untouched.
        assert!(svc.find(1).await.is_err());
        assert!(svc.find(3).await.is_ok());
    }

    #[tokio::test]
    async fn test_bulk_create_through_contract() {
        let svc = service();
        let summary = BulkContract::bulk_create(
            &svc,
            vec![
                json!({"title": "One", "status": "draft", "views": 0}),
                json!({"title": "Two", "status": "draft", "views": 0}),
            ],
        )
        .await
        .unwrap();
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.ids, vec![1, 2]);

        let err = BulkContract::bulk_create(
            &svc,
            vec![
                json!({"title": "Three", "status": "draft", "views": 0}),
                json!({"title": "", "status": "draft", "views": 0}),
            ],
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 succeeded: title is required");
    }

    #[tokio::test]
    async fn test_erased_list_keeps_pagination() {
        let svc = service();
        for n in 0..25 {
            svc.create(Article::new(&format!("t{}", n), "draft", n))
                .await
                .unwrap();
        }
        let page = PaginationContract::list(&svc, ListRequest::new(2, 10))
            .await
            .unwrap();
        assert_eq!(page.data.len(), 10);
        assert_eq!(page.total, 25);
        assert_eq!(page.from, 11);
        assert_eq!(page.to, 20);
        assert!(page.data[0].get("title").is_some());
    }

    #[test]
    fn test_authorize() {
        let svc = service();
        let actor = Granted(vec!["articles.view"]);
        assert!(svc.authorize("view", &actor).is_ok());

        let err = svc.authorize("delete", &actor).unwrap_err();
        assert!(matches!(err, AdminError::Forbidden { ref permission } if permission == "articles.delete"));

        assert!(svc.authorize("launch", &actor).is_err());
    }

    #[test]
    fn test_full_surface() {
        let svc: Arc<dyn ServiceContract> = Arc::new(service());
        use crate::contracts::Contract;
        assert_eq!(svc.capabilities(), Capability::service_surface());
        assert_eq!(svc.metadata().name, "articles");
    }
}
