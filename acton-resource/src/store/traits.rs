//! Store trait definition
//!
//! The pipeline never touches persistence directly. Everything it needs from a
//! backend goes through [`Store`]: building and narrowing an opaque collection
//! handle synchronously, then materializing, counting, and mutating records
//! asynchronously using RPITIT (Return Position Impl Trait In Traits).

use std::collections::BTreeMap;
use std::future::Future;

use serde_json::{Map, Value};

use super::error::StoreError;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// One stored record, field name to value
pub type Record = Map<String, Value>;

/// Equality constraints used to scope collections and locate records
pub type Constraints = BTreeMap<String, Value>;

/// Backend for one record type
///
/// The associated `Collection` is a lazy, cloneable description of a set of
/// records (a query). `filter` and `slice` only narrow the description;
/// nothing is read until `count` or `records` is awaited.
///
/// # Example
///
/// ```rust,ignore
/// use acton_resource::store::{Constraints, Record, Store, StoreResult};
///
/// impl Store for BookStore {
///     type Collection = BookQuery;
///
///     fn entity_type(&self) -> &str { "book" }
///     fn primary_key(&self) -> &str { "id" }
///
///     async fn get(&self, constraints: &Constraints) -> StoreResult<Option<Record>> {
///         // SELECT ... WHERE <constraints> LIMIT 1
///         todo!()
///     }
///     // ... other methods
/// }
/// ```
pub trait Store: Send + Sync + 'static {
    /// Lazy collection handle
    type Collection: Clone + Send + Sync + 'static;

    /// Record type name used in error context
    fn entity_type(&self) -> &str;

    /// Field holding each record's identity
    fn primary_key(&self) -> &str;

    /// Every record of this type
    fn all(&self) -> Self::Collection;

    /// Narrow a collection to records equal to every constraint
    fn filter(&self, collection: Self::Collection, constraints: &Constraints) -> Self::Collection;

    /// Window a collection; `None` leaves the upper end open
    fn slice(
        &self,
        collection: Self::Collection,
        offset: u64,
        limit: Option<u64>,
    ) -> Self::Collection;

    /// Number of records in a collection
    fn count(
        &self,
        collection: &Self::Collection,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Materialize a collection
    fn records(
        &self,
        collection: &Self::Collection,
    ) -> impl Future<Output = StoreResult<Vec<Record>>> + Send;

    /// The single record matching every constraint
    ///
    /// Returns `Ok(None)` when nothing matches.
    fn get(
        &self,
        constraints: &Constraints,
    ) -> impl Future<Output = StoreResult<Option<Record>>> + Send;

    /// Insert a record, assigning an identity when the data carries none
    fn create(&self, data: Record) -> impl Future<Output = StoreResult<Record>> + Send;

    /// Update the record matching `constraints`
    ///
    /// With `create` set the data replaces the matching record, or is inserted
    /// when none matches. Without it the data is merged into the existing
    /// record and a miss is a `NotFound` error.
    fn update(
        &self,
        constraints: &Constraints,
        data: Record,
        create: bool,
    ) -> impl Future<Output = StoreResult<Record>> + Send;

    /// Remove a record previously returned by the store
    ///
    /// Returns `true` if the record was deleted, `false` if it no longer existed.
    fn delete(&self, record: &Record) -> impl Future<Output = StoreResult<bool>> + Send;
}
