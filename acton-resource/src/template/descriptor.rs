//! Resolved shape descriptors

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

/// Named transformation applied before or after shaping
///
/// Hooks compare and print by name, so two descriptors built from the same
/// declarations are equal.
#[derive(Clone)]
pub struct Hook {
    name: String,
    func: Arc<dyn Fn(Value) -> Value + Send + Sync>,
}

impl Hook {
    /// Wrap `func` under `name`
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Hook name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the hook
    pub fn call(&self, value: Value) -> Value {
        (self.func)(value)
    }
}

impl PartialEq for Hook {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hook").field(&self.name).finish()
    }
}

impl Serialize for Hook {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

/// Fully resolved description of an output shape
///
/// Every relation is itself a `ShapeDescriptor`; nothing in here refers back
/// to a resource definition. Serializes to the declared options only, which
/// is handy for inspecting what a request resolved to.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShapeDescriptor {
    /// Keys to keep, in output order; `None` keeps every key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
    /// Keys to drop
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    /// Output key to source field
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, String>,
    /// Emit the selected values as an array instead of an object
    #[serde(skip_serializing_if = "is_false")]
    pub values_list: bool,
    /// With `values_list`, collapse a single selected value to a scalar
    pub flat: bool,
    /// Whether the shaped value is a collection, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub many: Option<bool>,
    /// Hoist related objects into the parent
    #[serde(skip_serializing_if = "is_false")]
    pub merge: bool,
    /// Key prefix for merged related fields
    #[serde(skip_serializing_if = "String::is_empty")]
    pub prefix: String,
    /// Skip selected fields absent from the record instead of emitting `null`
    #[serde(skip_serializing_if = "is_false")]
    pub allow_missing: bool,
    /// Convert output keys to camelCase
    #[serde(skip_serializing_if = "is_false")]
    pub camelcase: bool,
    /// Applied to each input record before shaping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prehook: Option<Hook>,
    /// Applied to each shaped record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posthook: Option<Hook>,
    /// Nested descriptors by field name
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub related: BTreeMap<String, ShapeDescriptor>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Default for ShapeDescriptor {
    fn default() -> Self {
        Self {
            fields: None,
            exclude: Vec::new(),
            aliases: BTreeMap::new(),
            values_list: false,
            flat: true,
            many: None,
            merge: false,
            prefix: String::new(),
            allow_missing: false,
            camelcase: false,
            prehook: None,
            posthook: None,
            related: BTreeMap::new(),
        }
    }
}

impl ShapeDescriptor {
    /// Descriptor keeping only `fields`
    pub fn with_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            fields: Some(fields.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }
}
