//! Value types
//!
//! Plain data carriers exchanged between controllers, services and the
//! registries: list requests, paginated results, bulk summaries and the
//! metadata documents used for capability discovery.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ResourceConfig;

/// Sort direction for list queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    #[default]
    Desc,
}

impl SortDirection {
    /// Get the string representation (`ASC` / `DESC`).
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Parse direction from string representation.
    ///
    /// # Examples
    ///
    /// ```
    /// use admin_core::SortDirection;
    ///
    /// assert_eq!(SortDirection::parse("asc"), Some(SortDirection::Asc));
    /// assert_eq!(SortDirection::parse(" DESC "), Some(SortDirection::Desc));
    /// assert_eq!(SortDirection::parse("sideways"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ASC" => Some(SortDirection::Asc),
            "DESC" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    /// Parse, falling back to `default` on anything unrecognized.
    pub fn normalize(s: &str, default: SortDirection) -> Self {
        Self::parse(s).unwrap_or(default)
    }
}

impl std::fmt::Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A list request as received from a caller.
///
/// Fields carry raw caller input; use
/// [`BaseResourceService::sanitize_list_request`](crate::service::BaseResourceService::sanitize_list_request)
/// or [`BaseResourceService::validate_list_request`](crate::service::BaseResourceService::validate_list_request)
/// before querying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRequest {
    /// 1-based page number.
    #[serde(default)]
    pub page: i64,

    /// Requested page size.
    #[serde(default, alias = "pageSize", alias = "per_page")]
    pub page_size: i64,

    /// Sort field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,

    /// Sort direction as sent by the caller (`ASC` / `DESC`).
    #[serde(default)]
    pub direction: String,

    /// Free-text search term.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,

    /// Field filters; keys are validated per resource.
    #[serde(default)]
    pub filters: BTreeMap<String, serde_json::Value>,
}

impl Default for ListRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: crate::config::DEFAULT_PAGE_SIZE,
            sort: None,
            direction: SortDirection::Desc.as_str().to_string(),
            search: None,
            filters: BTreeMap::new(),
        }
    }
}

impl ListRequest {
    /// Create a request for a page.
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page,
            page_size,
            ..Self::default()
        }
    }

    /// Set the sort field and direction.
    pub fn with_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(field.into());
        self.direction = direction.as_str().to_string();
        self
    }

    /// Set the raw direction string.
    pub fn with_direction(mut self, direction: impl Into<String>) -> Self {
        self.direction = direction.into();
        self
    }

    /// Set the search term.
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Add a filter.
    pub fn with_filter(mut self, field: impl Into<String>, value: serde_json::Value) -> Self {
        self.filters.insert(field.into(), value);
        self
    }

    /// Fill unset (zero / empty) fields from configuration.
    ///
    /// Negative values are left alone so that validation can reject them.
    pub fn apply_defaults(&mut self, config: &ResourceConfig) {
        if self.page == 0 {
            self.page = 1;
        }
        if self.page_size == 0 {
            self.page_size = config.default_page_size;
        }
        if self.direction.trim().is_empty() {
            self.direction = config.default_direction.as_str().to_string();
        }
        if self.sort.as_deref().map_or(true, |s| s.trim().is_empty()) {
            self.sort = Some(config.default_sort_field.clone());
        }
        if let Some(ref search) = self.search {
            if search.trim().is_empty() {
                self.search = None;
            }
        }
    }

    /// The parsed sort direction, if the raw value is recognized.
    pub fn sort_direction(&self) -> Option<SortDirection> {
        SortDirection::parse(&self.direction)
    }

    /// Row offset of the first item on this page, or `None` when it does
    /// not fit in a `u64`.
    pub fn checked_offset(&self) -> Option<u64> {
        let skipped_pages = self.page.max(1).unsigned_abs() - 1;
        skipped_pages.checked_mul(self.page_size.max(0).unsigned_abs())
    }

    /// Row offset of the first item on this page, saturating at `u64::MAX`.
    pub fn offset(&self) -> u64 {
        self.checked_offset().unwrap_or(u64::MAX)
    }
}

/// Pagination block of a paginated response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    /// Current page (1-based).
    pub current_page: u64,
    /// Last page (at least 1).
    pub last_page: u64,
    /// Page size.
    pub per_page: u64,
    /// Total matching rows.
    pub total: u64,
    /// 1-based index of the first row on the page (0 when empty).
    pub from: u64,
    /// 1-based index of the last row on the page (0 when empty).
    pub to: u64,
    /// Whether a next page exists.
    pub has_next: bool,
    /// Whether a previous page exists.
    pub has_prev: bool,
}

/// One page of results with derived pagination fields.
///
/// All fields besides `data` are computed in [`PaginatedResult::new`] and
/// never set independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    /// Rows on this page.
    pub data: Vec<T>,
    /// Total matching rows.
    pub total: u64,
    /// Page size.
    pub per_page: u64,
    /// Current page (1-based).
    pub current_page: u64,
    /// Last page (at least 1).
    pub last_page: u64,
    /// 1-based index of the first row on the page (0 when empty).
    pub from: u64,
    /// 1-based index of the last row on the page (0 when empty).
    pub to: u64,
    /// Whether a next page exists.
    pub has_next: bool,
    /// Whether a previous page exists.
    pub has_prev: bool,
}

impl<T> PaginatedResult<T> {
    /// Build a page, deriving every pagination field.
    ///
    /// # Examples
    ///
    /// ```
    /// use admin_core::PaginatedResult;
    ///
    /// let page = PaginatedResult::new(vec![21, 22, 23], 23, 2, 20);
    /// assert_eq!(page.last_page, 2);
    /// assert_eq!(page.from, 21);
    /// assert_eq!(page.to, 23);
    /// assert!(!page.has_next);
    /// assert!(page.has_prev);
    /// ```
    pub fn new(data: Vec<T>, total: u64, page: u64, per_page: u64) -> Self {
        let current_page = page.max(1);
        let per_page = per_page.max(1);
        let last_page = total.div_ceil(per_page).max(1);
        let (from, to) = if data.is_empty() {
            (0, 0)
        } else {
            let from = (current_page - 1).saturating_mul(per_page).saturating_add(1);
            (from, from.saturating_add(data.len() as u64 - 1))
        };

        Self {
            data,
            total,
            per_page,
            current_page,
            last_page,
            from,
            to,
            has_next: current_page < last_page,
            has_prev: current_page > 1,
        }
    }

    /// Convert the rows, keeping pagination fields.
    pub fn map<U, F>(self, f: F) -> PaginatedResult<U>
    where
        F: FnMut(T) -> U,
    {
        PaginatedResult {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            per_page: self.per_page,
            current_page: self.current_page,
            last_page: self.last_page,
            from: self.from,
            to: self.to,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }

    /// Extract the pagination block.
    pub fn meta(&self) -> PaginationMeta {
        PaginationMeta {
            current_page: self.current_page,
            last_page: self.last_page,
            per_page: self.per_page,
            total: self.total,
            from: self.from,
            to: self.to,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}

/// Outcome of a fully successful bulk operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSummary {
    /// Items requested.
    pub total: usize,
    /// Items processed.
    pub succeeded: usize,
    /// Ids touched, in processing order.
    pub ids: Vec<u64>,
}

/// Pagination configuration as advertised to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Default page size.
    pub default_page_size: i64,
    /// Largest page size.
    pub max_page_size: i64,
    /// Page sizes controllers accept.
    pub allowed_page_sizes: Vec<i64>,
    /// Default sort field.
    pub default_sort: String,
    /// Default sort direction.
    pub default_direction: SortDirection,
}

impl From<&ResourceConfig> for PaginationConfig {
    fn from(config: &ResourceConfig) -> Self {
        Self {
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
            allowed_page_sizes: config.allowed_page_sizes.clone(),
            default_sort: config.default_sort_field.clone(),
            default_direction: config.default_direction,
        }
    }
}

/// Service self-description used by the registry and for discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceMetadata {
    /// Service name (usually the resource's plural name).
    pub name: String,
    /// Singular display name of the record type (e.g. "Book").
    pub record_type: String,
    /// Capabilities the service exposes.
    pub capabilities: Vec<String>,
    /// Fields accepted as sort keys.
    pub sortable_fields: Vec<String>,
    /// Fields accepted as filter keys.
    pub filterable_fields: Vec<String>,
    /// Fields matched by free-text search.
    pub searchable_fields: Vec<String>,
    /// Pagination configuration.
    pub pagination: PaginationConfig,
}

/// Controller self-description used for capability discovery.
///
/// Not used for authorization decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerMetadata {
    /// Resource name.
    pub resource: String,
    /// Supported controller actions.
    pub actions: Vec<String>,
    /// Permission slug required for each action.
    pub permissions: BTreeMap<String, String>,
    /// Validation rules per field.
    pub validation_rules: BTreeMap<String, Vec<String>>,
    /// Pagination configuration.
    pub pagination: PaginationConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_direction_normalize() {
        assert_eq!(SortDirection::normalize("asc", SortDirection::Desc), SortDirection::Asc);
        assert_eq!(
            SortDirection::normalize("sideways", SortDirection::Desc),
            SortDirection::Desc
        );
        assert_eq!(SortDirection::default(), SortDirection::Desc);
    }

    #[test]
    fn test_list_request_defaults() {
        let mut req = ListRequest {
            page: 0,
            page_size: 0,
            sort: None,
            direction: String::new(),
            search: Some("   ".to_string()),
            filters: BTreeMap::new(),
        };
        req.apply_defaults(&ResourceConfig::default());
        assert_eq!(req.page, 1);
        assert_eq!(req.page_size, 20);
        assert_eq!(req.sort.as_deref(), Some("id"));
        assert_eq!(req.direction, "DESC");
        assert!(req.search.is_none());
    }

    #[test]
    fn test_list_request_defaults_keep_negative_values() {
        let mut req = ListRequest::new(-3, -1);
        req.apply_defaults(&ResourceConfig::default());
        assert_eq!(req.page, -3);
        assert_eq!(req.page_size, -1);
    }

    #[test]
    fn test_list_request_deserialize_aliases() {
        let req: ListRequest =
            serde_json::from_str(r#"{"page": 2, "pageSize": 50, "direction": "asc"}"#).unwrap();
        assert_eq!(req.page_size, 50);
        assert_eq!(req.sort_direction(), Some(SortDirection::Asc));
        assert_eq!(req.offset(), 50);
    }

    #[test]
    fn test_list_request_offset_overflow() {
        let req = ListRequest::new(i64::MAX, 100);
        assert_eq!(req.checked_offset(), None);
        assert_eq!(req.offset(), u64::MAX);
        assert_eq!(ListRequest::new(3, 25).checked_offset(), Some(50));
    }

    #[test]
    fn test_paginated_result_empty() {
        let page: PaginatedResult<u64> = PaginatedResult::new(vec![], 0, 1, 20);
        assert_eq!(page.last_page, 1);
        assert_eq!(page.from, 0);
        assert_eq!(page.to, 0);
        assert!(!page.has_next);
        assert!(!page.has_prev);
    }

    #[test]
    fn test_paginated_result_first_page() {
        let page = PaginatedResult::new((1..=20).collect::<Vec<u64>>(), 45, 1, 20);
        assert_eq!(page.last_page, 3);
        assert_eq!(page.from, 1);
        assert_eq!(page.to, 20);
        assert!(page.has_next);
        assert!(!page.has_prev);

        let meta = page.meta();
        assert_eq!(meta.total, 45);
        assert_eq!(meta.current_page, 1);
    }

    #[test]
    fn test_paginated_result_map_keeps_meta() {
        let page = PaginatedResult::new(vec![1u64, 2], 12, 2, 10).map(|n| n.to_string());
        assert_eq!(page.data, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(page.from, 11);
        assert_eq!(page.to, 12);
        assert_eq!(page.last_page, 2);
    }
}
