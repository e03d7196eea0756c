//! Per-request pipeline

use std::collections::BTreeMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use serde_json::{json, Value};

use super::cardinality::{Action, Cardinality, Stage};
use super::definition::ResourceDef;
use super::request::{Payload, RequestParts};
use crate::error::{Error, Result};
use crate::rules::Query;
use crate::slicer::PageMeta;
use crate::store::{Constraints, Record, Store};
use crate::template::{RenderOptions, TemplateOptions};

/// What the store action produced, before shaping
enum Outcome {
    One(Record),
    Many(Vec<Record>, PageMeta),
    Created(Record),
    Removed,
    Cleared(PageMeta),
}

/// One request moving through the pipeline
///
/// Created per request from [`RequestParts`] and consumed by [`Resource::act`].
/// Option rules receive it mutably and may adjust `template` and
/// `render_options` before anything is fetched.
pub struct Resource<S: Store> {
    def: Arc<ResourceDef<S>>,
    /// Path captures, `uid` and `rel`
    pub ids: BTreeMap<String, String>,
    /// Decoded body
    pub data: Record,
    pub query: Query,
    pub method: Method,
    /// Call-time template overrides
    pub template: TemplateOptions,
    /// Forwarded to relation factories
    pub render_options: RenderOptions,
    stage: Stage,
}

impl<S: Store> Resource<S> {
    /// Parse a request against `def`
    ///
    /// A non-empty body must be a JSON object.
    pub fn from_request(def: Arc<ResourceDef<S>>, parts: RequestParts) -> Result<Self> {
        let data = parse_body(&parts.body)?;

        let mut resource = Self {
            def,
            ids: parts.ids,
            data,
            query: parts.query,
            method: parts.method,
            template: TemplateOptions::default(),
            render_options: RenderOptions::new(),
            stage: Stage::Received,
        };
        resource.advance(Stage::Parsed);
        Ok(resource)
    }

    pub fn definition(&self) -> &Arc<ResourceDef<S>> {
        &self.def
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Path captures translated to store fields
    pub fn get_ids(&self) -> Constraints {
        let mut ids = Constraints::new();
        if let Some(uid) = self.ids.get("uid") {
            ids.insert(self.def.uid_field().to_string(), Value::from(uid.as_str()));
        }
        if let (Some(parent), Some(rel)) = (self.def.parent(), self.ids.get("rel")) {
            ids.insert(parent.rel_field.clone(), Value::from(rel.as_str()));
        }
        ids
    }

    /// Body plus identity fields, hydrated
    pub fn get_data(&self) -> Record {
        let mut data = self.data.clone();
        data.extend(self.get_ids());
        self.def.policies().hydrator.apply(data)
    }

    /// Scoped, filtered, and windowed collection with its metadata
    pub async fn get_queryset(&self) -> Result<(S::Collection, PageMeta)> {
        let store = self.def.store();
        let scoped = store.filter(store.all(), &self.get_ids());
        let filtered = self.def.policies().filter.reduce(scoped, &self.query)?;

        let slicer = self.def.slicer();
        let window = slicer.window(&self.query)?;
        let count = store.count(&filtered).await?;
        let sliced = store.slice(filtered, window.offset, window.limit);

        let link = format!("{}{}", self.def.base_url(), self.location());
        Ok((sliced, slicer.paginate(count, window, &link)))
    }

    /// The addressed record
    pub async fn get_object(&self) -> Result<Record> {
        self.def
            .store()
            .get(&self.get_ids())
            .await?
            .ok_or_else(|| self.not_found())
    }

    /// Write the hydrated body to the addressed record
    ///
    /// With `create` the record is replaced or inserted; without it the body
    /// is merged into an existing record.
    pub async fn update_object(&self, create: bool) -> Result<Record> {
        let data = self.get_data();
        Ok(self.def.store().update(&self.get_ids(), data, create).await?)
    }

    /// Insert the hydrated body; the store assigns the identity
    pub async fn create_object(&self) -> Result<Record> {
        let mut data = self.get_data();
        data.remove(self.def.uid_field());
        Ok(self.def.store().create(data).await?)
    }

    /// Request path of this resource, e.g. `/authors/1/books/ABC123`
    pub fn location(&self) -> String {
        let mut path = match self.def.parent() {
            Some(parent) => format!(
                "/{}/{}/{}",
                parent.name,
                self.ids.get("rel").map_or("", String::as_str),
                self.def.name()
            ),
            None => format!("/{}", self.def.name()),
        };
        if let Some(uid) = self.ids.get("uid") {
            path.push('/');
            path.push_str(uid);
        }
        path
    }

    /// Run the request to completion
    pub async fn act(mut self) -> Result<Payload> {
        match self.run().await {
            Ok(payload) => Ok(payload),
            Err(err) => {
                tracing::warn!(
                    resource = %self.def.full_name(),
                    method = %self.method,
                    stage = %self.stage,
                    error = %err,
                    "Request aborted"
                );
                Err(err)
            }
        }
    }

    async fn run(&mut self) -> Result<Payload> {
        let def = Arc::clone(&self.def);
        let query = self.query.clone();
        def.policies().option.map(self, &query);
        self.advance(Stage::Configured);

        let cardinality = Cardinality::resolve(&self.ids);
        let action = cardinality.action(&self.method)?;
        self.advance(Stage::CardinalityResolved);

        if action.writes() {
            let errors = def.policies().validator.validate(&self.data);
            if !errors.is_empty() {
                return Err(Error::ValidationFailed(errors));
            }
        }
        self.advance(Stage::Validated);

        let outcome = self.execute(action).await?;
        self.advance(Stage::Executed);

        let (records, meta, status, location) = match outcome {
            Outcome::One(record) => (Some(Value::Object(record)), None, StatusCode::OK, None),
            Outcome::Created(record) => {
                let location = record
                    .get(def.uid_field())
                    .map(|uid| match uid {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .map(|uid| format!("{}{}/{}", def.base_url(), self.location(), uid));
                (Some(Value::Object(record)), None, StatusCode::CREATED, location)
            }
            Outcome::Many(records, meta) => (
                Some(Value::Array(records.into_iter().map(Value::Object).collect())),
                Some(meta),
                StatusCode::OK,
                None,
            ),
            Outcome::Removed => (None, None, StatusCode::NO_CONTENT, None),
            Outcome::Cleared(meta) => (None, Some(meta), StatusCode::OK, None),
        };

        let shaped = match records {
            Some(value) => {
                let mut descriptor = def.build_template(Some(&self.template), &self.render_options)?;
                if descriptor.many.is_none() {
                    descriptor.many = Some(value.is_array());
                }
                Some(def.shaper().shape(&value, &descriptor)?)
            }
            None => None,
        };
        self.advance(Stage::Shaped);

        let dehydrated = shaped.map(|value| def.policies().dehydrator.apply_value(value));
        self.advance(Stage::Dehydrated);

        let body = match (dehydrated, meta) {
            (Some(data), Some(meta)) => Some(json!({
                "data": data,
                "meta": def.slicer().meta_value(&meta),
            })),
            (None, Some(meta)) => Some(json!({ "meta": def.slicer().meta_value(&meta) })),
            (data, None) => data,
        };
        self.advance(Stage::Paginated);

        let payload = Payload {
            status,
            body,
            location,
        };
        self.advance(Stage::Serialized);
        Ok(payload)
    }

    async fn execute(&self, action: Action) -> Result<Outcome> {
        let store = self.def.store();
        let outcome = match action {
            Action::Fetch => Outcome::One(self.get_object().await?),
            Action::Replace => Outcome::One(self.update_object(true).await?),
            Action::Modify => Outcome::One(self.update_object(false).await?),
            Action::Remove => {
                let record = self.get_object().await?;
                if !store.delete(&record).await? {
                    return Err(self.not_found());
                }
                Outcome::Removed
            }
            Action::List => {
                let (collection, meta) = self.get_queryset().await?;
                Outcome::Many(store.records(&collection).await?, meta)
            }
            Action::Create => Outcome::Created(self.create_object().await?),
            Action::Clear => {
                let (collection, meta) = self.get_queryset().await?;
                let doomed = store.records(&collection).await?;
                for record in &doomed {
                    store.delete(record).await?;
                }
                tracing::info!(
                    resource = %self.def.full_name(),
                    deleted = doomed.len(),
                    "Collection window deleted"
                );
                Outcome::Cleared(meta)
            }
        };
        Ok(outcome)
    }

    fn advance(&mut self, stage: Stage) {
        tracing::debug!(
            resource = %self.def.full_name(),
            from = %self.stage,
            to = %stage,
            "Pipeline stage"
        );
        self.stage = stage;
    }

    fn not_found(&self) -> Error {
        Error::NotFound(format!(
            "{} {}",
            self.def.name(),
            self.ids.get("uid").map_or("", String::as_str)
        ))
    }
}

fn parse_body(body: &[u8]) -> Result<Record> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Record::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(data)) => Ok(data),
        Ok(_) => Err(Error::BadRequest(
            "Request body must be a JSON object".to_string(),
        )),
        Err(e) => Err(Error::BadRequest(format!("Request body is not valid JSON: {}", e))),
    }
}

/// Guard, parse, and run one request against `def`
pub async fn handle<S: Store>(def: Arc<ResourceDef<S>>, parts: RequestParts) -> Result<Payload> {
    if let Some(guard) = def.guard() {
        if let Err(err) = guard.check(&parts) {
            tracing::warn!(
                resource = %def.full_name(),
                method = %parts.method,
                error = %err,
                "Request rejected by guard"
            );
            return Err(err);
        }
    }

    Resource::from_request(def, parts)?.act().await
}
