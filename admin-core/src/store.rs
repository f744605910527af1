//! Persistence collaborator
//!
//! This module provides the repository abstraction that resource services
//! and the RBAC engine talk to, plus an in-memory implementation.
//!
//! The relational store itself is an external collaborator; anything that
//! offers find/create/update/delete/count and begin/commit/rollback can sit
//! behind [`Repository`]. [`MemoryRepository`] is suitable for single-process
//! use and testing.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::types::SortDirection;

/// Store error types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Row to update does not exist
    #[error("Record {id} not found in {table}")]
    NotFound {
        /// Table name.
        table: String,
        /// Row id.
        id: u64,
    },

    /// Unique constraint violated
    #[error("Duplicate value for {table}.{field}: {value}")]
    UniqueViolation {
        /// Table name.
        table: String,
        /// Column name.
        field: String,
        /// Offending value.
        value: String,
    },

    /// Transaction misuse or failure
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend (driver / connection) error
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A row type stored in a table.
///
/// Field access for filtering, searching and sorting goes through the
/// record's serde representation, so the column names are the serialized
/// field names.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Table name.
    const TABLE: &'static str;

    /// Primary key (0 means "not yet assigned").
    fn id(&self) -> u64;

    /// Set the primary key.
    fn set_id(&mut self, id: u64);

    /// Columns with a unique constraint besides the primary key.
    fn unique_fields() -> &'static [&'static str] {
        &[]
    }

    /// Serialized row.
    fn to_row(&self) -> StoreResult<Value> {
        serde_json::to_value(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Single column value.
    fn field(&self, name: &str) -> Option<Value> {
        self.to_row().ok()?.get(name).cloned()
    }
}

/// A filter condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Column equals value.
    Eq(String, Value),
    /// Column equals one of the values.
    In(String, Vec<Value>),
}

/// Case-insensitive substring search across text columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Search {
    /// Columns to search.
    pub fields: Vec<String>,
    /// Search term.
    pub term: String,
}

/// Query passed to the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// All conditions must hold.
    pub conditions: Vec<Condition>,
    /// Optional search; at least one field must contain the term.
    pub search: Option<Search>,
    /// Sort keys, applied in order.
    pub order_by: Vec<(String, SortDirection)>,
    /// Rows to skip.
    pub offset: u64,
    /// Maximum rows to return.
    pub limit: Option<u64>,
}

impl Query {
    /// Create an empty query (matches every row).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition.
    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq(field.into(), value.into()));
        self
    }

    /// Add a membership condition.
    pub fn filter_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.conditions.push(Condition::In(
            field.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Add a search over the given columns.
    pub fn search(mut self, fields: &[&str], term: impl Into<String>) -> Self {
        self.search = Some(Search {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            term: term.into(),
        });
        self
    }

    /// Append a sort key.
    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by.push((field.into(), direction));
        self
    }

    /// Skip rows.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Limit rows.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Same query without paging, for counting.
    pub fn unpaged(&self) -> Self {
        Self {
            conditions: self.conditions.clone(),
            search: self.search.clone(),
            order_by: Vec::new(),
            offset: 0,
            limit: None,
        }
    }

    /// Check a serialized row against conditions and search.
    pub fn matches(&self, row: &Value) -> bool {
        let conditions_hold = self.conditions.iter().all(|condition| match condition {
            Condition::Eq(field, value) => row
                .get(field)
                .map_or(false, |actual| values_equal(actual, value)),
            Condition::In(field, values) => row
                .get(field)
                .map_or(false, |actual| values.iter().any(|v| values_equal(actual, v))),
        });
        if !conditions_hold {
            return false;
        }

        match &self.search {
            Some(search) if !search.term.trim().is_empty() => {
                let needle = search.term.trim().to_lowercase();
                search.fields.iter().any(|field| {
                    row.get(field)
                        .and_then(Value::as_str)
                        .map_or(false, |text| text.to_lowercase().contains(&needle))
                })
            }
            _ => true,
        }
    }

    /// Compare two serialized rows by the sort keys.
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        for (field, direction) in &self.order_by {
            let ordering = compare_values(a.get(field), b.get(field));
            let ordering = match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Compare JSON values, treating numbers numerically.
///
/// Integers compare exactly; floats only when either side is a float. A
/// number or boolean equals a string holding its exact text form, so `1984`
/// matches `"1984"` but not `"01984"`.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            n.to_string() == *s
        }
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            b.to_string() == *s
        }
        _ => a == b,
    }
}

fn numbers_equal(x: &serde_json::Number, y: &serde_json::Number) -> bool {
    if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
        return x == y;
    }
    if x.is_f64() || y.is_f64() {
        return x.as_f64() == y.as_f64();
    }
    // One side is negative, the other above i64::MAX.
    false
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => a.to_string().cmp(&b.to_string()),
        },
    }
}

/// Handle for an open transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxHandle {
    /// Transaction id.
    pub id: Uuid,
    /// Table the transaction was opened on.
    pub table: &'static str,
}

impl TxHandle {
    /// Create a handle for a new transaction on `table`.
    pub fn new(table: &'static str) -> Self {
        Self {
            id: Uuid::now_v7(),
            table,
        }
    }
}

/// Repository trait for a single table.
///
/// Bulk defaults are sequential and not transactional: a failure part-way
/// through leaves earlier rows written.
#[async_trait]
pub trait Repository<R: Record>: Send + Sync {
    /// Find a row by primary key.
    async fn find(&self, id: u64) -> StoreResult<Option<R>>;

    /// Find every row matching the query, ordered and paged.
    async fn find_many(&self, query: &Query) -> StoreResult<Vec<R>>;

    /// Count rows matching the query (paging ignored).
    async fn count(&self, query: &Query) -> StoreResult<u64>;

    /// Insert a row; id 0 means "assign one".
    async fn create(&self, record: R) -> StoreResult<R>;

    /// Replace an existing row.
    async fn update(&self, record: R) -> StoreResult<R>;

    /// Delete by primary key; returns whether a row was removed.
    async fn delete(&self, id: u64) -> StoreResult<bool>;

    /// Delete every row matching the query; returns the number removed.
    async fn delete_where(&self, query: &Query) -> StoreResult<u64>;

    /// Open a transaction over the rows matching `scope`.
    ///
    /// Waits while another transaction is open on the table.
    async fn begin(&self, scope: &Query) -> StoreResult<TxHandle>;

    /// Commit an open transaction.
    async fn commit(&self, tx: TxHandle) -> StoreResult<()>;

    /// Roll back an open transaction, restoring the rows in its scope to
    /// their state at `begin`. Rows outside the scope are left alone.
    async fn rollback(&self, tx: TxHandle) -> StoreResult<()>;

    /// First row matching the query.
    async fn find_one(&self, query: &Query) -> StoreResult<Option<R>> {
        let query = query.clone().limit(1);
        Ok(self.find_many(&query).await?.into_iter().next())
    }

    /// Check whether a row exists.
    async fn exists(&self, id: u64) -> StoreResult<bool> {
        Ok(self.find(id).await?.is_some())
    }

    /// Insert rows one by one.
    async fn bulk_create(&self, records: Vec<R>) -> StoreResult<Vec<R>> {
        let mut created = Vec::with_capacity(records.len());
        for record in records {
            created.push(self.create(record).await?);
        }
        Ok(created)
    }

    /// Update rows one by one.
    async fn bulk_update(&self, records: Vec<R>) -> StoreResult<Vec<R>> {
        let mut updated = Vec::with_capacity(records.len());
        for record in records {
            updated.push(self.update(record).await?);
        }
        Ok(updated)
    }

    /// Delete rows one by one; returns the number removed.
    async fn bulk_delete(&self, ids: &[u64]) -> StoreResult<u64> {
        let mut removed = 0;
        for id in ids {
            if self.delete(*id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

struct Table<R> {
    rows: BTreeMap<u64, R>,
    next_id: u64,
    snapshot: Option<Snapshot<R>>,
}

struct Snapshot<R> {
    tx: Uuid,
    scope: Query,
    rows: BTreeMap<u64, R>,
    _writer: OwnedMutexGuard<()>,
}

/// In-memory repository.
///
/// Transactions snapshot the rows in their scope at `begin`. One
/// transaction is open per table at a time; a second `begin` waits for it.
/// Ids handed out inside a rolled-back transaction are not reused.
pub struct MemoryRepository<R> {
    table: Arc<RwLock<Table<R>>>,
    writer: Arc<Mutex<()>>,
}

impl<R> std::fmt::Debug for MemoryRepository<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRepository").finish()
    }
}

impl<R> Clone for MemoryRepository<R> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            writer: self.writer.clone(),
        }
    }
}

impl<R: Record> MemoryRepository<R> {
    /// Create an empty in-memory table.
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(Table {
                rows: BTreeMap::new(),
                next_id: 1,
                snapshot: None,
            })),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Create and wrap in an `Arc`, ready to hand to services.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Check unique columns of `record` against every other row.
    fn check_unique(rows: &BTreeMap<u64, R>, record: &R) -> StoreResult<()> {
        for field in R::unique_fields() {
            let Some(value) = record.field(field) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let clash = rows
                .values()
                .filter(|row| row.id() != record.id())
                .any(|row| row.field(field).map_or(false, |v| values_equal(&v, &value)));
            if clash {
                return Err(StoreError::UniqueViolation {
                    table: R::TABLE.to_string(),
                    field: field.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    fn select(rows: &BTreeMap<u64, R>, query: &Query) -> StoreResult<Vec<(Value, R)>> {
        let mut matched = Vec::new();
        for row in rows.values() {
            let serialized = row.to_row()?;
            if query.matches(&serialized) {
                matched.push((serialized, row.clone()));
            }
        }
        // BTreeMap iteration is id-ascending, so the stable sort keeps id order on ties.
        matched.sort_by(|(a, _), (b, _)| query.compare(a, b));
        Ok(matched)
    }
}

impl<R: Record> Default for MemoryRepository<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: Record> Repository<R> for MemoryRepository<R> {
    async fn find(&self, id: u64) -> StoreResult<Option<R>> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_many(&self, query: &Query) -> StoreResult<Vec<R>> {
        let table = self.table.read().await;
        let rows = Self::select(&table.rows, query)?
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit.map_or(usize::MAX, |l| l as usize))
            .map(|(_, row)| row)
            .collect();
        Ok(rows)
    }

    async fn count(&self, query: &Query) -> StoreResult<u64> {
        let table = self.table.read().await;
        Ok(Self::select(&table.rows, &query.unpaged())?.len() as u64)
    }

    async fn create(&self, mut record: R) -> StoreResult<R> {
        let mut table = self.table.write().await;

        if record.id() == 0 {
            record.set_id(table.next_id);
        } else if table.rows.contains_key(&record.id()) {
            return Err(StoreError::UniqueViolation {
                table: R::TABLE.to_string(),
                field: "id".to_string(),
                value: record.id().to_string(),
            });
        }
        Self::check_unique(&table.rows, &record)?;

        table.next_id = table.next_id.max(record.id() + 1);
        table.rows.insert(record.id(), record.clone());
        Ok(record)
    }

    async fn update(&self, record: R) -> StoreResult<R> {
        let mut table = self.table.write().await;

        if !table.rows.contains_key(&record.id()) {
            return Err(StoreError::NotFound {
                table: R::TABLE.to_string(),
                id: record.id(),
            });
        }
        Self::check_unique(&table.rows, &record)?;

        table.rows.insert(record.id(), record.clone());
        Ok(record)
    }

    async fn delete(&self, id: u64) -> StoreResult<bool> {
        Ok(self.table.write().await.rows.remove(&id).is_some())
    }

    async fn delete_where(&self, query: &Query) -> StoreResult<u64> {
        let mut table = self.table.write().await;
        let ids: Vec<u64> = Self::select(&table.rows, &query.unpaged())?
            .into_iter()
            .map(|(_, row)| row.id())
            .collect();
        for id in &ids {
            table.rows.remove(id);
        }
        Ok(ids.len() as u64)
    }

    async fn begin(&self, scope: &Query) -> StoreResult<TxHandle> {
        let writer = self.writer.clone().lock_owned().await;
        let mut table = self.table.write().await;

        let scope = scope.unpaged();
        let rows = Self::select(&table.rows, &scope)?
            .into_iter()
            .map(|(_, row)| (row.id(), row))
            .collect();

        let handle = TxHandle::new(R::TABLE);
        table.snapshot = Some(Snapshot {
            tx: handle.id,
            scope,
            rows,
            _writer: writer,
        });
        tracing::debug!(table = R::TABLE, tx = %handle.id, "Transaction started");
        Ok(handle)
    }

    async fn commit(&self, tx: TxHandle) -> StoreResult<()> {
        let mut table = self.table.write().await;
        let open = table.snapshot.as_ref().map_or(false, |s| s.tx == tx.id);
        if !open {
            return Err(StoreError::Transaction(format!(
                "no open transaction {} on {}",
                tx.id,
                R::TABLE
            )));
        }

        table.snapshot = None;
        tracing::debug!(table = R::TABLE, tx = %tx.id, "Transaction committed");
        Ok(())
    }

    async fn rollback(&self, tx: TxHandle) -> StoreResult<()> {
        let mut table = self.table.write().await;
        let open = table.snapshot.as_ref().map_or(false, |s| s.tx == tx.id);
        if !open {
            return Err(StoreError::Transaction(format!(
                "no open transaction {} on {}",
                tx.id,
                R::TABLE
            )));
        }

        if let Some(snapshot) = table.snapshot.take() {
            let touched: Vec<u64> = Self::select(&table.rows, &snapshot.scope)?
                .into_iter()
                .map(|(_, row)| row.id())
                .collect();
            for id in touched {
                table.rows.remove(&id);
            }
            table.rows.extend(snapshot.rows);
        }
        tracing::debug!(table = R::TABLE, tx = %tx.id, "Transaction rolled back");
        Ok(())
    }
}
