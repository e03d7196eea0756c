//! Body validation by declared field rules

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ErrorSet;
use crate::policy::{Chain, Next};
use crate::store::Record;

type Rule = dyn Fn(&Value, Next<'_, Validator>) -> Option<String> + Send + Sync;
type Hook = dyn Fn(&Record, Next<'_, Validator>) -> Vec<(String, String)> + Send + Sync;

/// One validator layer
///
/// Rules run for body keys that have one and return a message when the value
/// is unacceptable. `before` and `after` inspect the whole record and yield
/// extra `(key, message)` pairs, which is how required fields and
/// cross-field checks are expressed.
///
/// # Example
///
/// ```rust
/// use acton_resource::policy::Chain;
/// use acton_resource::rules::Validator;
/// use serde_json::json;
///
/// let layer = Validator::new()
///     .rule("year", |value, _next| {
///         (!value.is_i64()).then(|| "Must be a whole number".to_string())
///     })
///     .before(|record, _next| {
///         if record.contains_key("title") {
///             vec![]
///         } else {
///             vec![("title".into(), "This field is required".into())]
///         }
///     });
/// let chain = Chain::compose(Some(layer), &[]);
///
/// let body = json!({"year": "soon"});
/// let errors = chain.validate(body.as_object().unwrap());
/// assert_eq!(errors.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct Validator {
    rules: BTreeMap<String, Arc<Rule>>,
    before: Option<Arc<Hook>>,
    after: Option<Arc<Hook>>,
}

impl Validator {
    /// Create an empty layer
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the value of `key` when present in the body
    #[must_use]
    pub fn rule(
        mut self,
        key: impl Into<String>,
        rule: impl Fn(&Value, Next<'_, Validator>) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.rules.insert(key.into(), Arc::new(rule));
        self
    }

    /// Whole-record check run before the field rules
    #[must_use]
    pub fn before(
        mut self,
        hook: impl Fn(&Record, Next<'_, Validator>) -> Vec<(String, String)> + Send + Sync + 'static,
    ) -> Self {
        self.before = Some(Arc::new(hook));
        self
    }

    /// Whole-record check run after the field rules
    #[must_use]
    pub fn after(
        mut self,
        hook: impl Fn(&Record, Next<'_, Validator>) -> Vec<(String, String)> + Send + Sync + 'static,
    ) -> Self {
        self.after = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

impl<'a> Next<'a, Validator> {
    /// Run the next declaration of rule `key`, `None` if there is none
    pub fn rule(self, key: &str, value: &Value) -> Option<String> {
        self.find(|layer| layer.rules.get(key).map(|rule| &**rule))
            .and_then(|(rule, next)| rule(value, next))
    }

    /// Run the next `before` hook, no messages if there is none
    pub fn before(self, record: &Record) -> Vec<(String, String)> {
        self.find(|layer| layer.before.as_deref())
            .map(|(hook, next)| hook(record, next))
            .unwrap_or_default()
    }

    /// Run the next `after` hook, no messages if there is none
    pub fn after(self, record: &Record) -> Vec<(String, String)> {
        self.find(|layer| layer.after.as_deref())
            .map(|(hook, next)| hook(record, next))
            .unwrap_or_default()
    }
}

impl Chain<Validator> {
    /// Collect every message for `record`; empty means valid
    pub fn validate(&self, record: &Record) -> ErrorSet {
        let mut errors: ErrorSet = self.cursor().before(record).into_iter().collect();

        for (key, value) in record {
            if let Some(message) = self.cursor().rule(key, value) {
                errors.insert(key.clone(), message);
            }
        }

        errors.extend(self.cursor().after(record));
        errors
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

    fn not_blank(value: &Value, _: Next<'_, Validator>) -> Option<String> {
        match value.as_str() {
            Some(s) if !s.trim().is_empty() => None,
            _ => Some("May not be blank".to_string()),
        }
    }

    #[test]
    fn test_valid_record_yields_empty_set() {
        let chain = Chain::compose(Some(Validator::new().rule("title", not_blank)), &[]);
        assert!(chain.validate(&record(json!({"title": "Dune", "extra": 1}))).is_empty());
    }

    #[test]
    fn test_messages_keyed_by_field() {
        let chain = Chain::compose(
            Some(
                Validator::new()
                    .rule("title", not_blank)
                    .after(|r, _| {
                        if r.get("pages").and_then(Value::as_i64).unwrap_or(1) < 1 {
                            vec![("pages".into(), "Must be positive".into())]
                        } else {
                            vec![]
                        }
                    }),
            ),
            &[],
        );
        let errors = chain.validate(&record(json!({"title": " ", "pages": 0})));
        assert_eq!(errors.get("title").map(String::as_str), Some("May not be blank"));
        assert_eq!(errors.get("pages").map(String::as_str), Some("Must be positive"));
    }

    #[test]
    fn test_child_adds_to_parent_check() {
        let base = Chain::compose(Some(Validator::new().rule("isbn", not_blank)), &[]);
        let layer = Validator::new().rule("isbn", |value, next| {
            next.rule("isbn", value).or_else(|| {
                let digits = value.as_str().unwrap_or_default().len();
                (digits != 13).then(|| "Must have 13 digits".to_string())
            })
        });
        let chain = Chain::compose(Some(layer), &[&base]);

        let blank = chain.validate(&record(json!({"isbn": ""})));
        assert_eq!(blank["isbn"], "May not be blank");

        let short = chain.validate(&record(json!({"isbn": "123"})));
        assert_eq!(short["isbn"], "Must have 13 digits");
    }
}
