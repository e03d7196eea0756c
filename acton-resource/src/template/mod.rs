//! Declarative output templates
//!
//! A [`TemplateLayer`] declares any subset of the shaping options. A resource
//! definition composes its layers into a chain; building the chain resolves,
//! per option, the call-time override if given, else the nearest layer that
//! declares it. Relations are resolved recursively and eagerly so the result
//! is a self-contained [`ShapeDescriptor`].
//!
//! # Example
//!
//! ```rust
//! use acton_resource::policy::Chain;
//! use acton_resource::template::{Relation, RenderOptions, TemplateLayer};
//!
//! let author = TemplateLayer::new().fields(["name"]);
//! let book = TemplateLayer::new()
//!     .fields(["isbn", "title", "author"])
//!     .related("author", Relation::template(author));
//! let chain = Chain::compose(Some(book), &[]);
//!
//! let descriptor = chain.build(None, &RenderOptions::new()).unwrap();
//! assert_eq!(
//!     descriptor.related["author"].fields,
//!     Some(vec!["name".to_string()])
//! );
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

mod descriptor;

pub use descriptor::{Hook, ShapeDescriptor};

use crate::error::{Error, Result};
use crate::policy::Chain;

/// Free-form options forwarded to relation factories
pub type RenderOptions = BTreeMap<String, String>;

/// Names of the resource templates on the current resolution path
pub type Visited = BTreeSet<String>;

/// Call-time overrides have the same shape as a declared layer
pub type TemplateOptions = TemplateLayer;

type Factory = dyn Fn(&RenderOptions) -> Result<ShapeDescriptor> + Send + Sync;

/// Anything exposing a live template chain under a unique name
///
/// Resource definitions implement this, which is what lets one definition's
/// template be used as another's relation.
pub trait TemplateSource: Send + Sync {
    /// Unique name used for cycle detection
    fn name(&self) -> &str;

    /// Composed template layers, nearest first
    fn template_chain(&self) -> &Chain<TemplateLayer>;
}

/// How a related field is described
#[derive(Clone)]
pub enum Relation {
    /// Another definition's live template
    Resource(Arc<dyn TemplateSource>),
    /// Invoked with the forwarded render options
    Factory(Arc<Factory>),
    /// A plain layer, resolved on its own
    Template(Box<TemplateLayer>),
    /// Already resolved
    Descriptor(ShapeDescriptor),
}

impl Relation {
    /// Relation built by calling `factory` at resolution time
    pub fn factory(
        factory: impl Fn(&RenderOptions) -> Result<ShapeDescriptor> + Send + Sync + 'static,
    ) -> Self {
        Self::Factory(Arc::new(factory))
    }

    /// Relation described by a plain layer
    pub fn template(layer: TemplateLayer) -> Self {
        Self::Template(Box::new(layer))
    }

    /// Relation following another template source
    pub fn resource(source: Arc<dyn TemplateSource>) -> Self {
        Self::Resource(source)
    }

    fn resolve(&self, options: &RenderOptions, visited: &mut Visited) -> Result<ShapeDescriptor> {
        match self {
            Self::Resource(source) => {
                let name = source.name().to_string();
                if !visited.insert(name.clone()) {
                    return Err(Error::Configuration(format!(
                        "template relation cycle through '{}'",
                        name
                    )));
                }
                let layers: Vec<&TemplateLayer> = source.template_chain().iter().collect();
                let resolved = resolve_layers(&layers, None, options, visited);
                visited.remove(&name);
                resolved
            }
            Self::Factory(factory) => factory(options),
            Self::Template(layer) => resolve_layers(&[layer.as_ref()], None, options, visited),
            Self::Descriptor(descriptor) => Ok(descriptor.clone()),
        }
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource(source) => f.debug_tuple("Resource").field(&source.name()).finish(),
            Self::Factory(_) => f.write_str("Factory"),
            Self::Template(layer) => f.debug_tuple("Template").field(layer).finish(),
            Self::Descriptor(descriptor) => f.debug_tuple("Descriptor").field(descriptor).finish(),
        }
    }
}

/// One declared template layer; unset options defer to the next layer
#[derive(Clone, Debug, Default)]
pub struct TemplateLayer {
    /// Fields to emit, in order; unset emits every field
    pub fields: Option<Vec<String>>,
    /// Fields dropped after selection
    pub exclude: Option<Vec<String>>,
    /// Output key to source key
    pub aliases: Option<BTreeMap<String, String>>,
    /// Emit the selected values as a list instead of an object
    pub values_list: Option<bool>,
    /// Collapse a one-value list to the bare value
    pub flat: Option<bool>,
    /// Whether the shaped value is a collection
    pub many: Option<bool>,
    /// Hoist a related object's fields into its parent
    pub merge: Option<bool>,
    /// Key prefix for merged fields
    pub prefix: Option<String>,
    /// Skip absent fields instead of emitting `null`
    pub allow_missing: Option<bool>,
    /// Rename output keys to camelCase
    pub camelcase: Option<bool>,
    /// Runs on the record before selection
    pub prehook: Option<Hook>,
    /// Runs on the shaped output
    pub posthook: Option<Hook>,
    /// Nested shapes by field
    pub related: Option<BTreeMap<String, Relation>>,
}

fn strings<I, K>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = K>,
    K: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

impl TemplateLayer {
    /// Create a layer that declares nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit only `fields`
    #[must_use]
    pub fn fields<I, K>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.fields = Some(strings(fields));
        self
    }

    /// Drop `exclude` from the output
    #[must_use]
    pub fn exclude<I, K>(mut self, exclude: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.exclude = Some(strings(exclude));
        self
    }

    /// Emit the value of `source` under `output`
    #[must_use]
    pub fn alias(mut self, output: impl Into<String>, source: impl Into<String>) -> Self {
        self.aliases
            .get_or_insert_with(BTreeMap::new)
            .insert(output.into(), source.into());
        self
    }

    /// Emit values without keys
    #[must_use]
    pub fn values_list(mut self, values_list: bool) -> Self {
        self.values_list = Some(values_list);
        self
    }

    /// Collapse one-value lists
    #[must_use]
    pub fn flat(mut self, flat: bool) -> Self {
        self.flat = Some(flat);
        self
    }

    /// Force collection or single-record shaping
    #[must_use]
    pub fn many(mut self, many: bool) -> Self {
        self.many = Some(many);
        self
    }

    /// Hoist this relation into its parent
    #[must_use]
    pub fn merge(mut self, merge: bool) -> Self {
        self.merge = Some(merge);
        self
    }

    /// Prefix for merged keys
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Skip absent fields
    #[must_use]
    pub fn allow_missing(mut self, allow_missing: bool) -> Self {
        self.allow_missing = Some(allow_missing);
        self
    }

    /// camelCase output keys
    #[must_use]
    pub fn camelcase(mut self, camelcase: bool) -> Self {
        self.camelcase = Some(camelcase);
        self
    }

    /// Transform the record before shaping
    #[must_use]
    pub fn prehook(mut self, hook: Hook) -> Self {
        self.prehook = Some(hook);
        self
    }

    /// Transform the shaped output
    #[must_use]
    pub fn posthook(mut self, hook: Hook) -> Self {
        self.posthook = Some(hook);
        self
    }

    /// Describe the nested value under `field`
    #[must_use]
    pub fn related(mut self, field: impl Into<String>, relation: Relation) -> Self {
        self.related
            .get_or_insert_with(BTreeMap::new)
            .insert(field.into(), relation);
        self
    }
}

/// Override if present, else the nearest layer declaring the option
fn pick<'a, T: ?Sized>(
    layers: &[&'a TemplateLayer],
    overrides: Option<&'a TemplateLayer>,
    get: impl Fn(&'a TemplateLayer) -> Option<&'a T>,
) -> Option<&'a T> {
    overrides
        .and_then(&get)
        .or_else(|| layers.iter().find_map(|layer| get(*layer)))
}

fn resolve_layers(
    layers: &[&TemplateLayer],
    overrides: Option<&TemplateLayer>,
    options: &RenderOptions,
    visited: &mut Visited,
) -> Result<ShapeDescriptor> {
    let defaults = ShapeDescriptor::default();

    let mut related = BTreeMap::new();
    if let Some(relations) = pick(layers, overrides, |l| l.related.as_ref()) {
        for (field, relation) in relations {
            related.insert(field.clone(), relation.resolve(options, visited)?);
        }
    }

    Ok(ShapeDescriptor {
        fields: pick(layers, overrides, |l| l.fields.as_ref()).cloned(),
        exclude: pick(layers, overrides, |l| l.exclude.as_ref())
            .cloned()
            .unwrap_or_default(),
        aliases: pick(layers, overrides, |l| l.aliases.as_ref())
            .cloned()
            .unwrap_or_default(),
        values_list: pick(layers, overrides, |l| l.values_list.as_ref())
            .copied()
            .unwrap_or(defaults.values_list),
        flat: pick(layers, overrides, |l| l.flat.as_ref())
            .copied()
            .unwrap_or(defaults.flat),
        many: pick(layers, overrides, |l| l.many.as_ref()).copied(),
        merge: pick(layers, overrides, |l| l.merge.as_ref())
            .copied()
            .unwrap_or(defaults.merge),
        prefix: pick(layers, overrides, |l| l.prefix.as_ref())
            .cloned()
            .unwrap_or_default(),
        allow_missing: pick(layers, overrides, |l| l.allow_missing.as_ref())
            .copied()
            .unwrap_or(defaults.allow_missing),
        camelcase: pick(layers, overrides, |l| l.camelcase.as_ref())
            .copied()
            .unwrap_or(defaults.camelcase),
        prehook: pick(layers, overrides, |l| l.prehook.as_ref()).cloned(),
        posthook: pick(layers, overrides, |l| l.posthook.as_ref()).cloned(),
        related,
    })
}

/// Resolve a template chain into a descriptor
///
/// `visited` holds the names already on the resolution path; a relation back
/// to one of them is reported as [`Error::Configuration`].
pub fn build_template(
    chain: &Chain<TemplateLayer>,
    overrides: Option<&TemplateOptions>,
    options: &RenderOptions,
    visited: &mut Visited,
) -> Result<ShapeDescriptor> {
    let layers: Vec<&TemplateLayer> = chain.iter().collect();
    resolve_layers(&layers, overrides, options, visited)
}

impl Chain<TemplateLayer> {
    /// Resolve this chain on its own
    pub fn build(
        &self,
        overrides: Option<&TemplateOptions>,
        options: &RenderOptions,
    ) -> Result<ShapeDescriptor> {
        build_template(self, overrides, options, &mut Visited::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    struct Named {
        name: String,
        chain: Chain<TemplateLayer>,
    }

    impl TemplateSource for Named {
        fn name(&self) -> &str {
            &self.name
        }

        fn template_chain(&self) -> &Chain<TemplateLayer> {
            &self.chain
        }
    }

    fn named(name: &str, layer: TemplateLayer) -> Arc<dyn TemplateSource> {
        Arc::new(Named {
            name: name.to_string(),
            chain: Chain::compose(Some(layer), &[]),
        })
    }

    /// Source whose relation is wired after construction
    struct Late {
        name: String,
        chain: OnceLock<Chain<TemplateLayer>>,
    }

    impl TemplateSource for Late {
        fn name(&self) -> &str {
            &self.name
        }

        fn template_chain(&self) -> &Chain<TemplateLayer> {
            self.chain.get_or_init(Chain::new)
        }
    }

    #[test]
    fn test_override_beats_nearest_layer() {
        let base = Chain::compose(Some(TemplateLayer::new().fields(["a", "b"]).camelcase(true)), &[]);
        let child = Chain::compose(Some(TemplateLayer::new().fields(["a"])), &[&base]);

        let plain = child.build(None, &RenderOptions::new()).unwrap();
        assert_eq!(plain.fields, Some(vec!["a".to_string()]));
        assert!(plain.camelcase);

        let overrides = TemplateLayer::new().fields(["b"]).camelcase(false);
        let overridden = child.build(Some(&overrides), &RenderOptions::new()).unwrap();
        assert_eq!(overridden.fields, Some(vec!["b".to_string()]));
        assert!(!overridden.camelcase);
    }

    #[test]
    fn test_relation_to_another_resource_template() {
        let author = named("authors", TemplateLayer::new().fields(["name"]));
        let chain = Chain::compose(
            Some(
                TemplateLayer::new()
                    .fields(["isbn", "title", "author"])
                    .alias("book_title", "title")
                    .related("author", Relation::resource(author)),
            ),
            &[],
        );

        let descriptor = chain.build(None, &RenderOptions::new()).unwrap();
        assert_eq!(descriptor.aliases["book_title"], "title");
        assert_eq!(descriptor.related["author"], ShapeDescriptor::with_fields(["name"]));
    }

    #[test]
    fn test_relation_as_plain_mapping_resolves_recursively() {
        let publisher = TemplateLayer::new().fields(["name", "city"]);
        let author = TemplateLayer::new()
            .fields(["name", "publisher"])
            .related("publisher", Relation::template(publisher));
        let chain = Chain::compose(
            Some(TemplateLayer::new().related("author", Relation::template(author))),
            &[],
        );

        let descriptor = chain.build(None, &RenderOptions::new()).unwrap();
        let nested = &descriptor.related["author"].related["publisher"];
        assert_eq!(nested.fields, Some(vec!["name".to_string(), "city".to_string()]));
    }

    #[test]
    fn test_factory_receives_render_options() {
        let chain = Chain::compose(
            Some(TemplateLayer::new().related(
                "tags",
                Relation::factory(|options| {
                    let field = options.get("lang").map_or("label", |_| "label_local");
                    Ok(ShapeDescriptor {
                        values_list: true,
                        ..ShapeDescriptor::with_fields([field])
                    })
                }),
            )),
            &[],
        );

        let default = chain.build(None, &RenderOptions::new()).unwrap();
        assert_eq!(default.related["tags"].fields, Some(vec!["label".to_string()]));

        let mut options = RenderOptions::new();
        options.insert("lang".into(), "nl".into());
        let localized = chain.build(None, &options).unwrap();
        assert_eq!(localized.related["tags"].fields, Some(vec!["label_local".to_string()]));
        assert!(localized.related["tags"].values_list);
    }

    #[test]
    fn test_literal_descriptor_is_copied() {
        let literal = ShapeDescriptor::with_fields(["id"]);
        let chain = Chain::compose(
            Some(TemplateLayer::new().related("owner", Relation::Descriptor(literal.clone()))),
            &[],
        );
        assert_eq!(chain.build(None, &RenderOptions::new()).unwrap().related["owner"], literal);
    }

    #[test]
    fn test_cycle_is_a_configuration_error() {
        let books = Arc::new(Late {
            name: "books".into(),
            chain: OnceLock::new(),
        });
        let authors = named(
            "authors",
            TemplateLayer::new().related("books", Relation::resource(books.clone())),
        );
        let _ = books.chain.set(Chain::compose(
            Some(TemplateLayer::new().related("author", Relation::resource(authors))),
            &[],
        ));

        let mut visited = Visited::new();
        visited.insert("books".to_string());
        let err = build_template(books.template_chain(), None, &RenderOptions::new(), &mut visited)
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(ref msg) if msg.contains("books")));
    }

    #[test]
    fn test_same_resource_twice_without_cycle() {
        let user = named("users", TemplateLayer::new().fields(["name"]));
        let chain = Chain::compose(
            Some(
                TemplateLayer::new()
                    .related("author", Relation::resource(user.clone()))
                    .related("editor", Relation::resource(user)),
            ),
            &[],
        );
        let descriptor = chain.build(None, &RenderOptions::new()).unwrap();
        assert_eq!(descriptor.related.len(), 2);
    }
}
