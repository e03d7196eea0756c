//! In-memory store
//!
//! A [`Store`] over a `Vec` of JSON records behind a `tokio::sync::RwLock`.
//! Suitable for tests, demos, and prototypes. Queries are [`MemoryQuery`]
//! values: a list of predicates plus an offset/limit window. Predicates always
//! run before the window regardless of the order they were added in.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

use super::error::{StoreError, StoreErrorKind, StoreOperation};
use super::traits::{Constraints, Record, Store, StoreResult};

type Predicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// Collection handle for [`MemoryStore`]
#[derive(Clone, Default)]
pub struct MemoryQuery {
    predicates: Vec<Predicate>,
    offset: u64,
    limit: Option<u64>,
}

impl MemoryQuery {
    /// Keep only records satisfying `predicate`
    #[must_use]
    pub fn matching(mut self, predicate: impl Fn(&Record) -> bool + Send + Sync + 'static) -> Self {
        self.predicates.push(Arc::new(predicate));
        self
    }

    /// Keep only records whose `field` loosely equals `value`
    ///
    /// Strings compare equal to numbers and booleans with the same textual
    /// form, since path and query values always arrive as strings.
    #[must_use]
    pub fn field_eq(self, field: impl Into<String>, value: Value) -> Self {
        let field = field.into();
        self.matching(move |record| {
            record
                .get(&field)
                .is_some_and(|stored| loose_eq(stored, &value))
        })
    }

    fn matches(&self, record: &Record) -> bool {
        self.predicates.iter().all(|p| p(record))
    }

    fn windowed(&self, offset: u64, limit: Option<u64>) -> Self {
        let limit = match (self.limit, limit) {
            (Some(current), Some(requested)) => Some(current.saturating_sub(offset).min(requested)),
            (Some(current), None) => Some(current.saturating_sub(offset)),
            (None, requested) => requested,
        };
        Self {
            predicates: self.predicates.clone(),
            offset: self.offset.saturating_add(offset),
            limit,
        }
    }

    fn select<'a>(&'a self, records: &'a [Record]) -> impl Iterator<Item = &'a Record> + 'a {
        let skip = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let take = self
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        records
            .iter()
            .filter(move |r| self.matches(r))
            .skip(skip)
            .take(take)
    }
}

impl fmt::Debug for MemoryQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryQuery")
            .field("predicates", &self.predicates.len())
            .field("offset", &self.offset)
            .field("limit", &self.limit)
            .finish()
    }
}

/// Compare two JSON values, treating a string as equal to a scalar with the same text
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), other @ (Value::Number(_) | Value::Bool(_)))
        | (other @ (Value::Number(_) | Value::Bool(_)), Value::String(s)) => {
            other.to_string() == *s
        }
        _ => a == b,
    }
}

/// Text form of a value for error context
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Store keeping every record in memory
pub struct MemoryStore {
    entity_type: String,
    primary_key: String,
    records: RwLock<Vec<Record>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store keyed by `id`
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            primary_key: "id".to_string(),
            records: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Use a different identity field
    #[must_use]
    pub fn with_primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    /// Seed the store, assigning identities to records that lack one
    #[must_use]
    pub fn with_records(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        let seeded: Vec<Record> = records
            .into_iter()
            .map(|record| self.assign_identity(record))
            .collect();
        self.records.get_mut().extend(seeded);
        self
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no records
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn assign_identity(&self, mut record: Record) -> Record {
        match record.get(&self.primary_key) {
            None | Some(Value::Null) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                record.insert(self.primary_key.clone(), Value::from(id));
            }
            Some(Value::Number(n)) => {
                if let Some(id) = n.as_u64() {
                    self.next_id.fetch_max(id.saturating_add(1), Ordering::SeqCst);
                }
            }
            Some(Value::String(s)) => {
                if let Ok(id) = s.parse::<u64>() {
                    self.next_id.fetch_max(id.saturating_add(1), Ordering::SeqCst);
                }
            }
            Some(_) => {}
        }
        record
    }

    /// Turn numeric text into a number where stored records hold numbers in that field
    fn match_stored_types(records: &[Record], data: &mut Record) {
        for (field, value) in data.iter_mut() {
            let Value::String(text) = value else {
                continue;
            };
            let numeric = records
                .iter()
                .any(|record| matches!(record.get(field), Some(Value::Number(_))));
            if !numeric {
                continue;
            }
            if let Ok(n) = text.parse::<u64>() {
                *value = Value::from(n);
            } else if let Ok(n) = text.parse::<i64>() {
                *value = Value::from(n);
            }
        }
    }

    fn position(records: &[Record], constraints: &Constraints) -> Option<usize> {
        records.iter().position(|record| {
            constraints.iter().all(|(field, value)| {
                record
                    .get(field)
                    .is_some_and(|stored| loose_eq(stored, value))
            })
        })
    }

    fn describe(&self, constraints: &Constraints) -> String {
        constraints
            .get(&self.primary_key)
            .map(display_value)
            .unwrap_or_else(|| {
                constraints
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, display_value(v)))
                    .collect::<Vec<_>>()
                    .join(",")
            })
    }

    fn insert_locked(&self, records: &mut Vec<Record>, mut data: Record) -> StoreResult<Record> {
        Self::match_stored_types(records, &mut data);
        let record = self.assign_identity(data);
        if let Some(id) = record.get(&self.primary_key) {
            let taken = records.iter().any(|existing| {
                existing
                    .get(&self.primary_key)
                    .is_some_and(|stored| loose_eq(stored, id))
            });
            if taken {
                return Err(StoreError::already_exists(
                    self.entity_type.clone(),
                    display_value(id),
                ));
            }
        }
        records.push(record.clone());
        Ok(record)
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entity_type", &self.entity_type)
            .field("primary_key", &self.primary_key)
            .finish_non_exhaustive()
    }
}

impl Store for MemoryStore {
    type Collection = MemoryQuery;

    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn primary_key(&self) -> &str {
        &self.primary_key
    }

    fn all(&self) -> MemoryQuery {
        MemoryQuery::default()
    }

    fn filter(&self, collection: MemoryQuery, constraints: &Constraints) -> MemoryQuery {
        constraints
            .iter()
            .fold(collection, |query, (field, value)| {
                query.field_eq(field.clone(), value.clone())
            })
    }

    fn slice(&self, collection: MemoryQuery, offset: u64, limit: Option<u64>) -> MemoryQuery {
        collection.windowed(offset, limit)
    }

    async fn count(&self, collection: &MemoryQuery) -> StoreResult<u64> {
        let records = self.records.read().await;
        Ok(collection.select(&records).count() as u64)
    }

    async fn records(&self, collection: &MemoryQuery) -> StoreResult<Vec<Record>> {
        let records = self.records.read().await;
        Ok(collection.select(&records).cloned().collect())
    }

    async fn get(&self, constraints: &Constraints) -> StoreResult<Option<Record>> {
        let records = self.records.read().await;
        Ok(Self::position(&records, constraints).map(|index| records[index].clone()))
    }

    async fn create(&self, data: Record) -> StoreResult<Record> {
        let mut records = self.records.write().await;
        self.insert_locked(&mut records, data)
    }

    async fn update(&self, constraints: &Constraints, data: Record, create: bool) -> StoreResult<Record> {
        let mut records = self.records.write().await;

        match Self::position(&records, constraints) {
            Some(index) => {
                let existing = &mut records[index];
                // Matched fields keep their stored representation
                let kept: Vec<(String, Value)> = constraints
                    .keys()
                    .chain(std::iter::once(&self.primary_key))
                    .filter_map(|field| {
                        existing
                            .get(field)
                            .map(|stored| (field.clone(), stored.clone()))
                    })
                    .filter(|(field, stored)| {
                        constraints.get(field).map_or(true, |wanted| loose_eq(stored, wanted))
                    })
                    .collect();
                if create {
                    *existing = data;
                } else {
                    existing.extend(data);
                }
                existing.extend(kept);
                tracing::debug!(entity = %self.entity_type, replace = create, "Record updated");
                Ok(existing.clone())
            }
            None if create => {
                let mut data = data;
                for (field, value) in constraints {
                    data.entry(field.clone()).or_insert_with(|| value.clone());
                }
                self.insert_locked(&mut records, data)
            }
            None => Err(StoreError::new(
                StoreOperation::Update,
                StoreErrorKind::NotFound,
                "Record not found",
            )
            .with_entity(self.entity_type.clone(), self.describe(constraints))),
        }
    }

    async fn delete(&self, record: &Record) -> StoreResult<bool> {
        let mut records = self.records.write().await;
        let index = match record.get(&self.primary_key) {
            Some(id) => records.iter().position(|existing| {
                existing
                    .get(&self.primary_key)
                    .is_some_and(|stored| loose_eq(stored, id))
            }),
            None => records.iter().position(|existing| existing == record),
        };
        Ok(index.map(|i| records.remove(i)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn books() -> MemoryStore {
        MemoryStore::new("book").with_records([
            record(json!({"title": "Dune", "genre": "scifi"})),
            record(json!({"title": "Emma", "genre": "classic"})),
            record(json!({"title": "Solaris", "genre": "scifi"})),
        ])
    }

    fn constraints(value: Value) -> Constraints {
        record(value).into_iter().collect()
    }

    #[tokio::test]
    async fn test_seeded_records_get_sequential_ids() {
        let store = books();
        let all = store.records(&store.all()).await.unwrap();
        let ids: Vec<_> = all.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
    }

    #[tokio::test]
    async fn test_filter_compares_strings_to_numbers() {
        let store = books();
        let query = store.filter(store.all(), &constraints(json!({"id": "2"})));
        let found = store.records(&query).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["title"], "Emma");
    }

    #[tokio::test]
    async fn test_slice_composes_with_predicates() {
        let store = books();
        let scifi = store.filter(store.all(), &constraints(json!({"genre": "scifi"})));
        assert_eq!(store.count(&scifi).await.unwrap(), 2);

        let window = store.slice(scifi, 1, Some(5));
        let found = store.records(&window).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["title"], "Solaris");
    }

    #[tokio::test]
    async fn test_nested_slices_stay_inside_outer_window() {
        let store = books();
        let outer = store.slice(store.all(), 1, Some(2));
        let inner = store.slice(outer, 1, Some(10));
        let found = store.records(&inner).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["title"], "Solaris");
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_identity() {
        let store = books();
        let err = store
            .create(record(json!({"id": 1, "title": "Copy"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::AlreadyExists);
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn test_create_after_explicit_id_does_not_collide() {
        let store = MemoryStore::new("book");
        store.create(record(json!({"id": 10}))).await.unwrap();
        let next = store.create(record(json!({"title": "New"}))).await.unwrap();
        assert_eq!(next["id"], json!(11));
    }

    #[tokio::test]
    async fn test_update_merges_or_reports_missing() {
        let store = books();
        let updated = store
            .update(&constraints(json!({"id": "1"})), record(json!({"genre": "epic"})), false)
            .await
            .unwrap();
        assert_eq!(updated["title"], "Dune");
        assert_eq!(updated["genre"], "epic");

        let err = store
            .update(&constraints(json!({"id": "99"})), Record::new(), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::NotFound);
        assert_eq!(err.entity_id.as_deref(), Some("99"));
    }

    #[tokio::test]
    async fn test_upsert_replaces_or_inserts() {
        let store = books();
        let replaced = store
            .update(&constraints(json!({"id": "1"})), record(json!({"title": "Dune Messiah"})), true)
            .await
            .unwrap();
        assert_eq!(replaced["id"], json!(1));
        assert!(replaced.get("genre").is_none());

        let inserted = store
            .update(&constraints(json!({"id": "abc"})), record(json!({"title": "New"})), true)
            .await
            .unwrap();
        assert_eq!(inserted["id"], "abc");
        assert_eq!(store.len().await, 4);
    }

    #[tokio::test]
    async fn test_update_keeps_stored_identity_types() {
        let store = MemoryStore::new("book").with_records([
            record(json!({"title": "Dune", "author_id": 1})),
        ]);
        let where_ = constraints(json!({"id": "1", "author_id": "1"}));

        let merged = store
            .update(&where_, record(json!({"id": "1", "author_id": "1", "year": 1965})), false)
            .await
            .unwrap();
        assert_eq!(merged["id"], json!(1));
        assert_eq!(merged["author_id"], json!(1));

        let replaced = store
            .update(&where_, record(json!({"id": "1", "author_id": "1", "title": "Dune!"})), true)
            .await
            .unwrap();
        assert_eq!(replaced["id"], json!(1));
        assert_eq!(replaced["author_id"], json!(1));
        assert!(replaced.get("year").is_none());
    }

    #[tokio::test]
    async fn test_upsert_with_numeric_text_advances_ids() {
        let store = books();
        let inserted = store
            .update(&constraints(json!({"id": "7"})), record(json!({"id": "7", "title": "New"})), true)
            .await
            .unwrap();
        assert_eq!(inserted["id"], json!(7));

        let next = store.create(record(json!({"title": "Other"}))).await.unwrap();
        assert_eq!(next["id"], json!(8));
        assert_eq!(store.len().await, 5);
    }

    #[tokio::test]
    async fn test_string_identity_in_empty_store_advances_ids() {
        let store = MemoryStore::new("book");
        store.create(record(json!({"id": "4"}))).await.unwrap();
        let next = store.create(record(json!({"title": "Other"}))).await.unwrap();
        assert_eq!(next["id"], json!(5));
    }

    #[tokio::test]
    async fn test_delete_by_identity() {
        let store = books();
        let target = store.get(&constraints(json!({"id": 2}))).await.unwrap().unwrap();
        assert!(store.delete(&target).await.unwrap());
        assert!(!store.delete(&target).await.unwrap());
        assert_eq!(store.len().await, 2);
    }
}
