//! Resource configuration.
//!
//! Pagination and bulk limits shared by every resource service and
//! controller. Configuration is loaded from environment variables with
//! defaults matching the admin application.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SortDirection;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Default largest page a list request may ask for.
pub const DEFAULT_MAX_PAGE_SIZE: i64 = 100;

/// Default page size when none (or an invalid one) is requested.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Default page sizes accepted by controllers.
pub const DEFAULT_ALLOWED_PAGE_SIZES: [i64; 6] = [5, 10, 20, 30, 50, 100];

/// Default ceiling on ids per bulk request.
pub const DEFAULT_MAX_BULK_SIZE: usize = 1000;

/// Pagination, sorting and bulk configuration for a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Largest accepted page size.
    pub max_page_size: i64,

    /// Page size used when the request omits or mangles one.
    pub default_page_size: i64,

    /// Page sizes recognized by controllers and sanitization.
    pub allowed_page_sizes: Vec<i64>,

    /// Maximum number of ids in one bulk operation.
    pub max_bulk_size: usize,

    /// Sort field used when the request names none.
    pub default_sort_field: String,

    /// Sort direction used when the request names none or an invalid one.
    pub default_direction: SortDirection,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            default_page_size: DEFAULT_PAGE_SIZE,
            allowed_page_sizes: DEFAULT_ALLOWED_PAGE_SIZES.to_vec(),
            max_bulk_size: DEFAULT_MAX_BULK_SIZE,
            default_sort_field: "id".to_string(),
            default_direction: SortDirection::Desc,
        }
    }
}

impl ResourceConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ADMIN_MAX_PAGE_SIZE`: largest page size (default: 100)
    /// - `ADMIN_DEFAULT_PAGE_SIZE`: default page size (default: 20)
    /// - `ADMIN_ALLOWED_PAGE_SIZES`: comma separated list (default: 5,10,20,30,50,100)
    /// - `ADMIN_MAX_BULK_SIZE`: bulk id ceiling (default: 1000)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_page_size: std::env::var("ADMIN_MAX_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_page_size),
            default_page_size: std::env::var("ADMIN_DEFAULT_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.default_page_size),
            allowed_page_sizes: std::env::var("ADMIN_ALLOWED_PAGE_SIZES")
                .ok()
                .map(|s| parse_sizes(&s))
                .filter(|sizes| !sizes.is_empty())
                .unwrap_or(default.allowed_page_sizes),
            max_bulk_size: std::env::var("ADMIN_MAX_BULK_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_bulk_size),
            default_sort_field: default.default_sort_field,
            default_direction: default.default_direction,
        }
    }

    /// Override the default sort field (usually the primary key).
    pub fn with_default_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.default_sort_field = field.into();
        self.default_direction = direction;
        self
    }

    /// Check if a page size is in the allowed set.
    pub fn is_allowed_page_size(&self, size: i64) -> bool {
        self.allowed_page_sizes.contains(&size)
    }

    /// Validate internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_page_size <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_page_size".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.default_page_size <= 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::InvalidValue {
                key: "default_page_size".to_string(),
                message: format!("must be between 1 and {}", self.max_page_size),
            });
        }
        if let Some(size) = self
            .allowed_page_sizes
            .iter()
            .find(|s| **s <= 0 || **s > self.max_page_size)
        {
            return Err(ConfigError::InvalidValue {
                key: "allowed_page_sizes".to_string(),
                message: format!("{} is outside 1..={}", size, self.max_page_size),
            });
        }
        if self.max_bulk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_bulk_size".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.default_sort_field.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "default_sort_field".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_sizes(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}
