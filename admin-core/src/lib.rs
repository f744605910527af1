//! # Admin Core
//!
//! Resource contracts and the shared machinery every admin resource is built
//! on.
//!
//! ## Overview
//!
//! The admin-core crate handles:
//! - **Value types**: list requests, paginated results, metadata documents
//! - **Persistence**: the [`Repository`] collaborator and an in-memory store
//! - **Contracts**: capability traits a resource service or controller exposes
//! - **Base service**: default pagination, sorting, filtering and bulk semantics
//! - **Base controller**: request parsing and response envelopes
//! - **Registries**: startup-time conformance checks and name lookup
//!
//! ## Architecture
//!
//! ```text
//! ResourceRequest ──> ResourceController ──> dyn ServiceContract
//!                                               │
//!                               BaseResourceService<R> + RecordRules<R>
//!                                               │
//!                                        dyn Repository<R>
//! ```
//!
//! Capabilities are exposed through accessors on [`ServiceContract`] and
//! [`ControllerContract`]; the registries reject a candidate whose accessors
//! leave part of the required surface empty.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use admin_core::{ListRequest, ResourceConfig, ServiceRegistry};
//!
//! let registry = ServiceRegistry::for_services();
//! assert!(registry.get("books").is_err());
//!
//! let config = ResourceConfig::default();
//! assert_eq!(config.max_page_size, 100);
//!
//! let request = ListRequest::new(1, 20).with_search("rust");
//! assert_eq!(request.offset(), 0);
//! ```

pub mod config;
pub mod contracts;
pub mod controller;
pub mod error;
pub mod registry;
pub mod response;
pub mod service;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use config::{ConfigError, ResourceConfig};
pub use contracts::{
    AuthorizationContract, BulkActions, BulkContract, Capability, Contract, ControllerContract,
    CrudActions, CrudContract, DiscoveryAction, FilteringContract, ListingAction,
    PaginationContract, PermissionLookup, ServiceContract, SortingContract,
};
pub use controller::{BaseResourceController, ResourceController, ResourceRequest};
pub use error::{AdminError, AdminResult};
pub use registry::{ContractCheck, ContractRegistry, ControllerRegistry, ServiceRegistry, ValidationReport};
pub use response::{ApiResponse, Envelope};
pub use service::{validate_bulk_ids, BaseResourceService, NoRules, RecordRules, ResourceDescriptor};
pub use store::{MemoryRepository, Query, Record, Repository, StoreError, StoreResult, TxHandle};
pub use types::{
    BulkSummary, ControllerMetadata, ListRequest, PaginatedResult, PaginationConfig,
    PaginationMeta, ServiceMetadata, SortDirection,
};
