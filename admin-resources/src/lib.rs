//! # Admin Resources
//!
//! The concrete resources of the admin application and the wiring that
//! registers them.
//!
//! ## Overview
//!
//! The admin-resources crate handles:
//! - **Books**: catalog entries with ISBN validation and uniqueness
//! - **Users**: accounts with email validation and uniqueness
//! - **Permissions**: CRUD over the permission table
//! - **Matrix controller**: role × permission grid and user role handlers
//! - **Application**: [`AdminApp`] registers every service and controller
//!
//! Roles are served by [`admin_rbac::RoleService`] behind the same generic
//! [`admin_core::ResourceController`] as every other resource.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use admin_core::{ControllerContract, ResourceRequest};
//! use admin_resources::AdminApp;
//!
//! # async fn run() -> admin_core::AdminResult<()> {
//! let (app, _report) = AdminApp::in_memory().await?;
//! let books = app.controllers().get("books")?;
//! let response = books
//!     .listing()
//!     .expect("books support listing")
//!     .index(&ResourceRequest::new().with_query("page", "1"))
//!     .await;
//! assert_eq!(response.status, 200);
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod books;
pub mod matrix_controller;
pub mod permissions;
pub mod users;

// Re-export main types for convenience
pub use app::{AdminApp, AdminStore, AppConfig};
pub use books::{Book, BookRules, BookService};
pub use matrix_controller::PermissionMatrixController;
pub use permissions::{permission_descriptor, permission_service, PermissionRules};
pub use users::{User, UserRules, UserService};
