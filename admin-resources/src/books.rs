//! # Books
//!
//! The `books` resource: catalog entries with a unique ISBN.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use admin_core::{
    AdminError, AdminResult, AuthorizationContract, BaseResourceService, BulkContract, BulkSummary,
    CrudContract, FilteringContract, PaginationContract, Query, Record, RecordRules, Repository,
    ResourceConfig, ResourceDescriptor, ServiceContract, ServiceMetadata, SortingContract,
};

/// A book in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Primary key.
    #[serde(default)]
    pub id: u64,

    /// Title.
    pub title: String,

    /// Author display name.
    pub author: String,

    /// ISBN-10 or ISBN-13, stored without separators.
    pub isbn: String,

    /// Year of publication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_year: Option<i32>,

    /// Copies in stock.
    #[serde(default)]
    pub stock: u32,

    /// Whether the book is visible to readers.
    #[serde(default)]
    pub is_published: bool,

    /// Creation timestamp.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Create an unpublished book with no stock.
    pub fn new(title: impl Into<String>, author: impl Into<String>, isbn: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title: title.into(),
            author: author.into(),
            isbn: isbn.into(),
            published_year: None,
            stock: 0,
            is_published: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the publication year.
    pub fn with_year(mut self, year: i32) -> Self {
        self.published_year = Some(year);
        self
    }

    /// Set the stock level.
    pub fn with_stock(mut self, stock: u32) -> Self {
        self.stock = stock;
        self
    }

    /// Mark as published.
    pub fn published(mut self) -> Self {
        self.is_published = true;
        self
    }
}

impl Record for Book {
    const TABLE: &'static str = "books";

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    fn unique_fields() -> &'static [&'static str] {
        &["isbn"]
    }
}

/// Strip hyphens and spaces from an ISBN.
pub fn normalize_isbn(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Check an ISBN-10 or ISBN-13 checksum. Expects a normalized value.
pub fn is_valid_isbn(isbn: &str) -> bool {
    let chars: Vec<char> = isbn.chars().collect();
    match chars.len() {
        10 => {
            let mut sum = 0;
            for (i, c) in chars.iter().enumerate() {
                let digit = match (i, c) {
                    (9, 'X') => 10,
                    (_, c) => match c.to_digit(10) {
                        Some(d) => d,
                        None => return false,
                    },
                };
                sum += digit * (10 - i as u32);
            }
            sum % 11 == 0
        }
        13 => {
            let mut sum = 0;
            for (i, c) in chars.iter().enumerate() {
                let Some(digit) = c.to_digit(10) else {
                    return false;
                };
                sum += if i % 2 == 0 { digit } else { digit * 3 };
            }
            sum % 10 == 0
        }
        _ => false,
    }
}

/// Field rules for books.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookRules;

impl BookRules {
    fn validate(&self, book: &Book) -> AdminResult<()> {
        if book.title.trim().is_empty() {
            return Err(AdminError::invalid_field("title", "title is required"));
        }
        if book.author.trim().is_empty() {
            return Err(AdminError::invalid_field("author", "author is required"));
        }
        if !is_valid_isbn(&book.isbn) {
            return Err(AdminError::invalid_field(
                "isbn",
                format!("'{}' is not a valid ISBN", book.isbn),
            ));
        }
        if let Some(year) = book.published_year {
            let next_year = Utc::now().year() + 1;
            if year < 1450 || year > next_year {
                return Err(AdminError::invalid_field(
                    "published_year",
                    format!("published_year must be between 1450 and {}", next_year),
                ));
            }
        }
        Ok(())
    }

    fn normalize(&self, mut book: Book) -> Book {
        book.title = book.title.trim().to_string();
        book.author = book.author.trim().to_string();
        book.isbn = normalize_isbn(&book.isbn);
        book
    }
}

impl RecordRules<Book> for BookRules {
    fn validate_create(&self, book: &Book) -> AdminResult<()> {
        self.validate(book)
    }

    fn validate_update(&self, book: &Book) -> AdminResult<()> {
        self.validate(book)
    }

    fn prepare_create(&self, book: Book) -> Book {
        let mut book = self.normalize(book);
        let now = Utc::now();
        book.created_at = now;
        book.updated_at = now;
        book
    }

    fn prepare_update(&self, existing: &Book, book: Book) -> Book {
        let mut book = self.normalize(book);
        book.created_at = existing.created_at;
        book.updated_at = Utc::now();
        book
    }

    fn validation_rules(&self) -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([
            ("title".to_string(), vec!["required".to_string(), "string".to_string()]),
            ("author".to_string(), vec!["required".to_string(), "string".to_string()]),
            (
                "isbn".to_string(),
                vec!["required".to_string(), "isbn".to_string(), "unique:books".to_string()],
            ),
            (
                "published_year".to_string(),
                vec!["nullable".to_string(), "integer".to_string(), "min:1450".to_string()],
            ),
            ("stock".to_string(), vec!["integer".to_string(), "min:0".to_string()]),
        ])
    }
}

/// Resource service for books.
#[derive(Debug)]
pub struct BookService {
    base: BaseResourceService<Book>,
}

impl BookService {
    /// Resource descriptor for books.
    pub fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::new("books", "Book")
            .sortable(&["title", "author", "published_year", "stock", "created_at"])
            .filterable(&["author", "is_published", "published_year"])
            .searchable(&["title", "author", "isbn"])
            .standard_permissions()
            .permission("export", "books.export")
            .permission("import", "books.import")
    }

    /// Create a book service over `repository`.
    pub fn new(repository: Arc<dyn Repository<Book>>) -> Self {
        Self {
            base: BaseResourceService::new(Self::descriptor(), repository)
                .with_rules(Arc::new(BookRules)),
        }
    }

    /// Use a specific configuration.
    pub fn with_config(mut self, config: ResourceConfig) -> Self {
        self.base = self.base.with_config(config);
        self
    }

    /// The shared resource machinery.
    pub fn base(&self) -> &BaseResourceService<Book> {
        &self.base
    }

    /// Find a book by ISBN in any hyphenation.
    pub async fn find_by_isbn(&self, isbn: &str) -> AdminResult<Option<Book>> {
        Ok(self
            .base
            .repository()
            .find_one(&Query::new().filter_eq("isbn", normalize_isbn(isbn)))
            .await?)
    }

    /// Create a book; the ISBN must not be taken.
    pub async fn create(&self, book: Book) -> AdminResult<Book> {
        self.check_isbn_available(&book.isbn, None).await?;
        self.base.create(book).await
    }

    /// Replace a book; the ISBN must not belong to another book.
    pub async fn update(&self, book: Book) -> AdminResult<Book> {
        self.check_isbn_available(&book.isbn, Some(book.id)).await?;
        self.base.update(book).await
    }

    /// Set the stock level.
    pub async fn restock(&self, id: u64, stock: u32) -> AdminResult<Book> {
        let mut book = self.base.find(id).await?;
        book.stock = stock;
        self.base.update(book).await
    }

    async fn check_isbn_available(&self, isbn: &str, own_id: Option<u64>) -> AdminResult<()> {
        if let Some(existing) = self.find_by_isbn(isbn).await? {
            if Some(existing.id) != own_id {
                debug!(isbn, existing = existing.id, "ISBN already taken");
                return Err(AdminError::invalid_field(
                    "isbn",
                    "isbn has already been taken",
                ));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CrudContract for BookService {
    async fn find(&self, id: u64) -> AdminResult<Value> {
        let book = self.base.find(id).await?;
        self.base.encode(&book)
    }

    async fn create(&self, payload: Value) -> AdminResult<Value> {
        let mut book = self.base.decode(payload)?;
        book.id = 0;
        let created = BookService::create(self, book).await?;
        self.base.encode(&created)
    }

    async fn update(&self, id: u64, payload: Value) -> AdminResult<Value> {
        let mut book = self.base.decode(payload)?;
        book.id = id;
        let updated = BookService::update(self, book).await?;
        self.base.encode(&updated)
    }

    async fn delete(&self, id: u64) -> AdminResult<()> {
        self.base.delete(id).await
    }
}

#[async_trait]
impl BulkContract for BookService {
    fn validate_bulk_operation(&self, ids: &[u64]) -> AdminResult<()> {
        self.base.validate_bulk_operation(ids)
    }

    async fn bulk_create(&self, payloads: Vec<Value>) -> AdminResult<BulkSummary> {
        self.base.bulk_create_via(self, payloads).await
    }

    async fn bulk_update(&self, payloads: Vec<Value>) -> AdminResult<BulkSummary> {
        self.base.bulk_update_via(self, payloads).await
    }

    async fn bulk_delete(&self, ids: Vec<u64>) -> AdminResult<BulkSummary> {
        self.base.bulk_delete_via(self, ids).await
    }
}

impl ServiceContract for BookService {
    fn metadata(&self) -> ServiceMetadata {
        ServiceContract::metadata(&self.base)
    }

    fn crud(&self) -> Option<&dyn CrudContract> {
        Some(self)
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
        Some(self)
    }

    fn authorization(&self) -> Option<&dyn AuthorizationContract> {
        self.base.authorization()
    }
}
