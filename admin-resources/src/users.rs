//! Users resource.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use admin_core::{
    AdminError, AdminResult, AuthorizationContract, BaseResourceService, BulkContract,
    CrudContract, FilteringContract, PaginationContract, Query, Record, RecordRules, Repository,
    ResourceConfig, ResourceDescriptor, ServiceContract, ServiceMetadata, SortingContract,
};

/// An application user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Primary key.
    #[serde(default)]
    pub id: u64,

    /// Display name.
    pub name: String,

    /// Unique email address, stored lowercase.
    pub email: String,

    /// Whether the user may sign in.
    #[serde(default = "default_true")]
    pub is_active: bool,

    /// When the email address was confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified_at: Option<DateTime<Utc>>,

    /// Creation timestamp.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create an active, unverified user.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.into(),
            email: email.into(),
            is_active: true,
            email_verified_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for User {
    const TABLE: &'static str = "users";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn unique_fields() -> &'static [&'static str] {
        &["email"]
    }
}

fn default_true() -> bool {
    true
}

/// Loose structural email check: `local@domain.tld`, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

/// Field rules for users.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserRules;

impl UserRules {
    fn validate(&self, user: &User) -> AdminResult<()> {
        if user.name.trim().is_empty() {
            return Err(AdminError::invalid_field("name", "name is required"));
        }
        if user.email.is_empty() {
            return Err(AdminError::invalid_field("email", "email is required"));
        }
        if !is_valid_email(&user.email) {
            return Err(AdminError::invalid_field(
                "email",
                format!("'{}' is not a valid email address", user.email),
            ));
        }
        Ok(())
    }
}

impl RecordRules<User> for UserRules {
    fn validate_create(&self, user: &User) -> AdminResult<()> {
        self.validate(user)
    }

    fn validate_update(&self, user: &User) -> AdminResult<()> {
        self.validate(user)
    }

    fn prepare_create(&self, mut user: User) -> User {
        user.name = user.name.trim().to_string();
        user.email = user.email.trim().to_lowercase();
        let now = Utc::now();
        user.created_at = now;
        user.updated_at = now;
        user
    }

    fn prepare_update(&self, existing: &User, mut user: User) -> User {
        user.name = user.name.trim().to_string();
        user.email = user.email.trim().to_lowercase();
        user.created_at = existing.created_at;
        if user.email != existing.email {
            user.email_verified_at = None;
        }
        user.updated_at = Utc::now();
        user
    }

    fn validation_rules(&self) -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([
            ("name".to_string(), vec!["required".to_string(), "string".to_string()]),
            (
                "email".to_string(),
                vec!["required".to_string(), "email".to_string(), "unique:users".to_string()],
            ),
        ])
    }
}

/// Resource service for users.
#[derive(Debug)]
pub struct UserService {
    base: BaseResourceService<User>,
}

impl UserService {
    /// Resource descriptor for users.
    pub fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::new("users", "User")
            .sortable(&["name", "email", "created_at"])
            .filterable(&["is_active"])
            .searchable(&["name", "email"])
            .standard_permissions()
            .permission("export", "users.export")
    }

    /// Create a user service over `repository`.
    pub fn new(repository: Arc<dyn Repository<User>>) -> Self {
        Self {
            base: BaseResourceService::new(Self::descriptor(), repository)
                .with_rules(Arc::new(UserRules)),
        }
    }

    /// Use a specific configuration.
    pub fn with_config(mut self, config: ResourceConfig) -> Self {
        self.base = self.base.with_config(config);
        self
    }

    /// The shared resource machinery.
    pub fn base(&self) -> &BaseResourceService<User> {
        &self.base
    }

    /// Find a user by email, ignoring case.
    pub async fn find_by_email(&self, email: &str) -> AdminResult<Option<User>> {
        Ok(self
            .base
            .repository()
            .find_one(&Query::new().filter_eq("email", email.trim().to_lowercase()))
            .await?)
    }

    /// Record that the user's email address was confirmed.
    pub async fn mark_verified(&self, id: u64) -> AdminResult<User> {
        let mut user = self.base.find(id).await?;
        user.email_verified_at = Some(Utc::now());
        self.base.update(user).await
    }

    /// Block or allow sign-in.
    pub async fn set_active(&self, id: u64, active: bool) -> AdminResult<User> {
        let mut user = self.base.find(id).await?;
        user.is_active = active;
        self.base.update(user).await
    }
}

impl ServiceContract for UserService {
    fn metadata(&self) -> ServiceMetadata {
        ServiceContract::metadata(&self.base)
    }

    fn crud(&self) -> Option<&dyn CrudContract> {
        self.base.crud()
    }

    fn pagination(&self) -> Option<&dyn PaginationContract> {
        self.base.pagination()
    }

    fn sorting(&self) -> Option<&dyn SortingContract> {
        self.base.sorting()
    }

    fn filtering(&self) -> Option<&dyn FilteringContract> {
        self.base.filtering()
    }

    fn bulk(&self) -> Option<&dyn BulkContract> {
        self.base.bulk()
    }

    fn authorization(&self) -> Option<&dyn AuthorizationContract> {
        self.base.authorization()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admin_core::MemoryRepository;
    use serde_json::json;

    fn service() -> UserService {
        UserService::new(MemoryRepository::<User>::shared())
    }

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada example@x.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@@example.com"));
        assert!(!is_valid_email("ada@example..com"));
    }

    #[tokio::test]
    async fn test_email_is_lowercased_and_unique() {
        let service = service();
        let crud = service.crud().unwrap();
        let created = crud
            .create(json!({"name": "Ada", "email": " Ada@Example.com "}))
            .await
            .unwrap();
        assert_eq!(created["email"], "ada@example.com");
        assert_eq!(created["is_active"], true);

        let err = crud
            .create(json!({"name": "Ada 2", "email": "ADA@example.com"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Conflict(_)));

        let found = service.find_by_email("ADA@EXAMPLE.COM").await.unwrap();
        assert_eq!(found.map(|u| u.name), Some("Ada".to_string()));
    }

    #[tokio::test]
    async fn test_email_change_clears_verification() {
        let service = service();
        let user = service
            .base()
            .create(User::new("Grace", "grace@example.com"))
            .await
            .unwrap();
        let verified = service.mark_verified(user.id).await.unwrap();
        assert!(verified.email_verified_at.is_some());

        let mut moved = verified.clone();
        moved.email = "grace@navy.mil".to_string();
        let moved = service.base().update(moved).await.unwrap();
        assert!(moved.email_verified_at.is_none());

        assert!(!service.set_active(user.id, false).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_invalid_payload() {
        let service = service();
        let err = service
            .crud()
            .unwrap()
            .create(json!({"name": "Bad", "email": "not-an-email"}))
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("email"));
    }
}
