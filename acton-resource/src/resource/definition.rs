//! Record-type definitions and their builder

use std::fmt;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::guard::Guard;
use crate::policy::Chain;
use crate::rules::{Mapper, Reducer, Updater, Validator};
use crate::shape::{FieldShaper, Shaper};
use crate::slicer::Slicer;
use crate::store::Store;
use crate::template::{
    build_template, RenderOptions, ShapeDescriptor, TemplateLayer, TemplateOptions,
    TemplateSource, Visited,
};

use super::pipeline::Resource;

/// Parent of a nested resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parent {
    /// Route name of the parent resource
    pub name: String,
    /// Field on this record type referencing the parent
    pub rel_field: String,
}

/// Composed policy chains, one per behavior kind
pub struct Policies<S: Store> {
    pub template: Chain<TemplateLayer>,
    pub filter: Chain<Reducer<S::Collection>>,
    pub option: Chain<Mapper<Resource<S>>>,
    pub validator: Chain<Validator>,
    pub hydrator: Chain<Updater>,
    pub dehydrator: Chain<Updater>,
    pub slicer: Chain<Slicer>,
}

impl<S: Store> Clone for Policies<S> {
    fn clone(&self) -> Self {
        Self {
            template: self.template.clone(),
            filter: self.filter.clone(),
            option: self.option.clone(),
            validator: self.validator.clone(),
            hydrator: self.hydrator.clone(),
            dehydrator: self.dehydrator.clone(),
            slicer: self.slicer.clone(),
        }
    }
}

/// Immutable description of one exposed record type
///
/// Built once with [`ResourceDef::builder`] and shared as `Arc`; every request
/// runs against the same definition.
pub struct ResourceDef<S: Store> {
    name: String,
    full_name: String,
    store: Arc<S>,
    uid_field: String,
    parent: Option<Parent>,
    base_url: String,
    guard: Option<Arc<dyn Guard>>,
    shaper: Arc<dyn Shaper>,
    policies: Policies<S>,
    fallback_slicer: Slicer,
}

impl<S: Store> ResourceDef<S> {
    /// Start a definition exposed under `name`
    pub fn builder(name: impl Into<String>, store: Arc<S>) -> ResourceBuilder<S> {
        ResourceBuilder::new(name, store)
    }

    /// Route name, e.g. `books`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `{parent}__{name}` for nested resources, else the name
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Field holding the identity addressed by `uid`
    pub fn uid_field(&self) -> &str {
        &self.uid_field
    }

    pub fn parent(&self) -> Option<&Parent> {
        self.parent.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn guard(&self) -> Option<&dyn Guard> {
        self.guard.as_deref()
    }

    pub fn shaper(&self) -> &dyn Shaper {
        self.shaper.as_ref()
    }

    pub fn policies(&self) -> &Policies<S> {
        &self.policies
    }

    /// The slicer nearest in the lineage
    pub fn slicer(&self) -> &Slicer {
        self.policies
            .slicer
            .iter()
            .next()
            .unwrap_or(&self.fallback_slicer)
    }

    /// Collection and single-record route patterns, in axum syntax
    pub fn route_patterns(&self) -> (String, String) {
        let collection = match &self.parent {
            Some(parent) => format!("/{}/{{rel}}/{}", parent.name, self.name),
            None => format!("/{}", self.name),
        };
        let single = format!("{}/{{uid}}", collection);
        (collection, single)
    }

    /// Resolve this definition's template
    pub fn build_template(
        &self,
        overrides: Option<&TemplateOptions>,
        options: &RenderOptions,
    ) -> Result<ShapeDescriptor> {
        let mut visited = Visited::new();
        visited.insert(self.full_name.clone());
        build_template(&self.policies.template, overrides, options, &mut visited)
    }
}

impl<S: Store> TemplateSource for ResourceDef<S> {
    fn name(&self) -> &str {
        &self.full_name
    }

    fn template_chain(&self) -> &Chain<TemplateLayer> {
        &self.policies.template
    }
}

impl<S: Store> fmt::Debug for ResourceDef<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDef")
            .field("name", &self.name)
            .field("full_name", &self.full_name)
            .field("uid_field", &self.uid_field)
            .field("parent", &self.parent)
            .field("base_url", &self.base_url)
            .field("guard", &self.guard.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ResourceDef`]
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use acton_resource::prelude::*;
///
/// let store = Arc::new(MemoryStore::new("book").with_primary_key("isbn"));
///
/// let books = ResourceDef::builder("books", store.clone())
///     .template(TemplateLayer::new().fields(["isbn", "title", "author"]))
///     .build();
///
/// let author_books = ResourceDef::builder("books", store)
///     .extends(&books)
///     .nested_under("authors", "author")
///     .build();
///
/// assert_eq!(books.uid_field(), "isbn");
/// assert_eq!(author_books.full_name(), "authors__books");
/// assert_eq!(author_books.policies().template.len(), 1);
/// ```
pub struct ResourceBuilder<S: Store> {
    name: String,
    store: Arc<S>,
    uid_field: Option<String>,
    parent: Option<Parent>,
    base_url: Option<String>,
    guard: Option<Arc<dyn Guard>>,
    shaper: Option<Arc<dyn Shaper>>,
    bases: Vec<Arc<ResourceDef<S>>>,
    template: Option<TemplateLayer>,
    filter: Option<Reducer<S::Collection>>,
    option: Option<Mapper<Resource<S>>>,
    validator: Option<Validator>,
    hydrator: Option<Updater>,
    dehydrator: Option<Updater>,
    slicer: Option<Slicer>,
}

impl<S: Store> ResourceBuilder<S> {
    fn new(name: impl Into<String>, store: Arc<S>) -> Self {
        Self {
            name: name.into(),
            store,
            uid_field: None,
            parent: None,
            base_url: None,
            guard: None,
            shaper: None,
            bases: Vec::new(),
            template: None,
            filter: None,
            option: None,
            validator: None,
            hydrator: None,
            dehydrator: None,
            slicer: None,
        }
    }

    /// Identity field addressed by `uid`; `pk` means the store's primary key
    #[must_use]
    pub fn uid_field(mut self, field: impl Into<String>) -> Self {
        self.uid_field = Some(field.into());
        self
    }

    /// Expose under `/{parent}/{rel}/{name}`, scoping by `rel_field`
    #[must_use]
    pub fn nested_under(mut self, parent: impl Into<String>, rel_field: impl Into<String>) -> Self {
        self.parent = Some(Parent {
            name: parent.into(),
            rel_field: rel_field.into(),
        });
        self
    }

    /// Inherit every policy of `base`; may be called more than once
    #[must_use]
    pub fn extends(mut self, base: &Arc<ResourceDef<S>>) -> Self {
        self.bases.push(Arc::clone(base));
        self
    }

    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn guard(mut self, guard: impl Guard + 'static) -> Self {
        self.guard = Some(Arc::new(guard));
        self
    }

    #[must_use]
    pub fn shaper(mut self, shaper: impl Shaper + 'static) -> Self {
        self.shaper = Some(Arc::new(shaper));
        self
    }

    #[must_use]
    pub fn template(mut self, layer: TemplateLayer) -> Self {
        self.template = Some(layer);
        self
    }

    #[must_use]
    pub fn filter(mut self, layer: Reducer<S::Collection>) -> Self {
        self.filter = Some(layer);
        self
    }

    #[must_use]
    pub fn option(mut self, layer: Mapper<Resource<S>>) -> Self {
        self.option = Some(layer);
        self
    }

    #[must_use]
    pub fn validator(mut self, layer: Validator) -> Self {
        self.validator = Some(layer);
        self
    }

    #[must_use]
    pub fn hydrator(mut self, layer: Updater) -> Self {
        self.hydrator = Some(layer);
        self
    }

    #[must_use]
    pub fn dehydrator(mut self, layer: Updater) -> Self {
        self.dehydrator = Some(layer);
        self
    }

    #[must_use]
    pub fn slicer(mut self, layer: Slicer) -> Self {
        self.slicer = Some(layer);
        self
    }

    /// Take the link prefix and, unless a slicer is declared, paging from `config`
    #[must_use]
    pub fn with_config(mut self, config: &Config) -> Self {
        if self.base_url.is_none() {
            self.base_url = Some(config.service.base_url.clone());
        }
        if self.slicer.is_none() {
            self.slicer = Some(Slicer::from_config(&config.pagination));
        }
        self
    }

    /// Compose every policy chain and freeze the definition
    pub fn build(self) -> Arc<ResourceDef<S>> {
        let bases = &self.bases;
        let first = bases.first();

        let uid_field = match self.uid_field {
            Some(field) if field != "pk" => field,
            Some(_) => self.store.primary_key().to_string(),
            None => first
                .map(|base| base.uid_field.clone())
                .unwrap_or_else(|| self.store.primary_key().to_string()),
        };

        let parent = self
            .parent
            .or_else(|| bases.iter().find_map(|base| base.parent.clone()));
        let full_name = match &parent {
            Some(parent) => format!("{}__{}", parent.name, self.name),
            None => self.name.clone(),
        };

        let policies = Policies {
            template: Chain::compose(
                self.template,
                &bases.iter().map(|b| &b.policies.template).collect::<Vec<_>>(),
            ),
            filter: Chain::compose(
                self.filter,
                &bases.iter().map(|b| &b.policies.filter).collect::<Vec<_>>(),
            ),
            option: Chain::compose(
                self.option,
                &bases.iter().map(|b| &b.policies.option).collect::<Vec<_>>(),
            ),
            validator: Chain::compose(
                self.validator,
                &bases.iter().map(|b| &b.policies.validator).collect::<Vec<_>>(),
            ),
            hydrator: Chain::compose(
                self.hydrator,
                &bases.iter().map(|b| &b.policies.hydrator).collect::<Vec<_>>(),
            ),
            dehydrator: Chain::compose(
                self.dehydrator,
                &bases.iter().map(|b| &b.policies.dehydrator).collect::<Vec<_>>(),
            ),
            slicer: Chain::compose(
                self.slicer,
                &bases.iter().map(|b| &b.policies.slicer).collect::<Vec<_>>(),
            ),
        };

        let base_url = self
            .base_url
            .or_else(|| first.map(|base| base.base_url.clone()))
            .unwrap_or_default();
        let guard = self.guard.or_else(|| first.and_then(|base| base.guard.clone()));
        let shaper = self
            .shaper
            .or_else(|| first.map(|base| Arc::clone(&base.shaper)))
            .unwrap_or_else(|| Arc::new(FieldShaper));

        tracing::debug!(
            resource = %full_name,
            uid_field = %uid_field,
            bases = bases.len(),
            "Resource definition built"
        );

        Arc::new(ResourceDef {
            name: self.name,
            full_name,
            store: self.store,
            uid_field,
            parent,
            base_url,
            guard,
            shaper,
            policies,
            fallback_slicer: Slicer::default(),
        })
    }
}
