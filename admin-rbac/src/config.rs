//! RBAC configuration.

use serde::{Deserialize, Serialize};

use admin_core::config::{ConfigError, DEFAULT_MAX_BULK_SIZE};

/// Permission matrix engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RbacConfig {
    /// Re-sync the permission catalog before building the matrix.
    pub sync_catalog_on_read: bool,

    /// Maximum number of permission ids in one bulk assign/revoke or sync.
    pub max_bulk_size: usize,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            sync_catalog_on_read: true,
            max_bulk_size: DEFAULT_MAX_BULK_SIZE,
        }
    }
}

impl RbacConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ADMIN_RBAC_SYNC_ON_READ`: re-sync catalog on matrix reads (default: true)
    /// - `ADMIN_MAX_BULK_SIZE`: bulk id ceiling (default: 1000)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            sync_catalog_on_read: std::env::var("ADMIN_RBAC_SYNC_ON_READ")
                .ok()
                .map(|s| !matches!(s.trim().to_lowercase().as_str(), "false" | "0" | "no" | "off"))
                .unwrap_or(default.sync_catalog_on_read),
            max_bulk_size: std::env::var("ADMIN_MAX_BULK_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_bulk_size),
        }
    }

    /// Disable catalog sync on matrix reads.
    pub fn without_read_sync(mut self) -> Self {
        self.sync_catalog_on_read = false;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bulk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_bulk_size".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}
