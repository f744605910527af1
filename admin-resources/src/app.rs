//! # Application wiring
//!
//! Builds every resource service and controller, registers them through the
//! contract registries and seeds RBAC. Registration happens once at startup
//! through `&mut` registries; the finished registries are shared through
//! `Arc` and never mutated again.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use admin_core::config::ConfigError;
use admin_core::{
    AdminResult, ControllerContract, ControllerRegistry, MemoryRepository, RecordRules, Repository,
    ResourceConfig, ResourceController, ServiceContract, ServiceRegistry,
};
use admin_rbac::{
    BootstrapReport, PermissionMatrixService, PermissionRegistry, RbacConfig, RbacStore,
    RoleRules, RoleService,
};

use crate::books::{Book, BookRules, BookService};
use crate::matrix_controller::PermissionMatrixController;
use crate::permissions::{permission_service, PermissionRules};
use crate::users::{User, UserRules, UserService};

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Pagination and bulk limits for every resource.
    pub resource: ResourceConfig,
    /// Permission matrix engine settings.
    pub rbac: RbacConfig,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            resource: ResourceConfig::from_env(),
            rbac: RbacConfig::from_env(),
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resource.validate()?;
        self.rbac.validate()
    }
}

/// Persistence for every table the application uses.
#[derive(Clone)]
pub struct AdminStore {
    /// `books`
    pub books: Arc<dyn Repository<Book>>,
    /// `users`
    pub users: Arc<dyn Repository<User>>,
    /// RBAC tables.
    pub rbac: RbacStore,
}

impl std::fmt::Debug for AdminStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminStore")
            .field("rbac", &self.rbac)
            .finish_non_exhaustive()
    }
}

impl AdminStore {
    /// Fresh in-memory tables.
    pub fn in_memory() -> Self {
        Self {
            books: MemoryRepository::<Book>::shared(),
            users: MemoryRepository::<User>::shared(),
            rbac: RbacStore::in_memory(),
        }
    }
}

/// The assembled admin application.
#[derive(Debug, Clone)]
pub struct AdminApp {
    config: AppConfig,
    services: Arc<ServiceRegistry>,
    controllers: Arc<ControllerRegistry>,
    rbac: Arc<PermissionMatrixService>,
    matrix: PermissionMatrixController,
}

impl AdminApp {
    /// Build services and controllers over `store` and register them.
    ///
    /// # Panics
    ///
    /// Panics if a built-in service or controller does not satisfy its
    /// contract. That is a programming error caught at startup.
    pub fn new(store: AdminStore, config: AppConfig) -> Self {
        let resource = config.resource.clone();

        let books: Arc<dyn ServiceContract> =
            Arc::new(BookService::new(store.books.clone()).with_config(resource.clone()));
        let users: Arc<dyn ServiceContract> =
            Arc::new(UserService::new(store.users.clone()).with_config(resource.clone()));
        let roles: Arc<dyn ServiceContract> = Arc::new(
            RoleService::new(store.rbac.roles.clone()).with_config(resource.clone()),
        );
        let permissions: Arc<dyn ServiceContract> = Arc::new(permission_service(
            store.rbac.permissions.clone(),
            resource.clone(),
        ));

        let mut services = ServiceRegistry::for_services();
        services.must_register("books", books.clone());
        services.must_register("users", users.clone());
        services.must_register("roles", roles.clone());
        services.must_register("permissions", permissions.clone());

        let controller = |service: Arc<dyn ServiceContract>, rules| -> Arc<dyn ControllerContract> {
            Arc::new(
                ResourceController::new(service)
                    .with_config(resource.clone())
                    .with_validation_rules(rules),
            )
        };

        let mut controllers = ControllerRegistry::for_controllers();
        controllers.must_register("books", controller(books, BookRules.validation_rules()));
        controllers.must_register("users", controller(users, UserRules.validation_rules()));
        controllers.must_register("roles", controller(roles, RoleRules.validation_rules()));
        controllers.must_register(
            "permissions",
            controller(permissions, PermissionRules.validation_rules()),
        );

        let rbac = Arc::new(
            PermissionMatrixService::new(
                store.rbac.clone(),
                Arc::new(PermissionRegistry::default_catalog()),
            )
            .with_config(config.rbac.clone()),
        );
        let matrix = PermissionMatrixController::new(rbac.clone()).with_config(resource);

        info!(
            services = services.len(),
            controllers = controllers.len(),
            "Admin application assembled"
        );

        Self {
            config,
            services: Arc::new(services),
            controllers: Arc::new(controllers),
            rbac,
            matrix,
        }
    }

    /// In-memory application with built-in roles and grants seeded.
    pub async fn in_memory() -> AdminResult<(Self, BootstrapReport)> {
        let app = Self::new(AdminStore::in_memory(), AppConfig::default());
        let report = app.rbac.bootstrap().await?;
        Ok((app, report))
    }

    /// Configuration in use.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registered services.
    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    /// Registered controllers.
    pub fn controllers(&self) -> &Arc<ControllerRegistry> {
        &self.controllers
    }

    /// Permission matrix engine.
    pub fn rbac(&self) -> &Arc<PermissionMatrixService> {
        &self.rbac
    }

    /// Permission matrix controller.
    pub fn matrix(&self) -> &PermissionMatrixController {
        &self.matrix
    }
}
