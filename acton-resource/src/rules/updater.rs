//! Record post-processing by declared field rules

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::policy::{Chain, Next};
use crate::store::Record;

type Rule = dyn Fn(&Record, Next<'_, Updater>) -> Value + Send + Sync;
type Hook = dyn Fn(Record, Next<'_, Updater>) -> Record + Send + Sync;

/// One hydrator or dehydrator layer
///
/// Every declared rule runs for every record and its return value is written
/// under the rule's name, in key order. Later rules see the output of earlier
/// ones.
///
/// # Example
///
/// ```rust
/// use acton_resource::policy::Chain;
/// use acton_resource::rules::Updater;
/// use serde_json::{json, Value};
///
/// let layer = Updater::new()
///     .rule("display", |record, _next| {
///         let title = record.get("title").and_then(Value::as_str).unwrap_or_default();
///         json!(title.to_uppercase())
///     })
///     .omits(["internal"]);
/// let chain = Chain::compose(Some(layer), &[]);
///
/// let out = chain.apply_value(json!({"title": "dune", "internal": 1}));
/// assert_eq!(out, json!({"title": "dune", "display": "DUNE"}));
/// ```
#[derive(Clone, Default)]
pub struct Updater {
    rules: BTreeMap<String, Arc<Rule>>,
    before: Option<Arc<Hook>>,
    after: Option<Arc<Hook>>,
    omits: Option<Vec<String>>,
}

impl Updater {
    /// Create an empty layer
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute `key` for every record
    #[must_use]
    pub fn rule(
        mut self,
        key: impl Into<String>,
        rule: impl Fn(&Record, Next<'_, Updater>) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.rules.insert(key.into(), Arc::new(rule));
        self
    }

    /// Replace or seed the record before any rule runs
    #[must_use]
    pub fn before(
        mut self,
        hook: impl Fn(Record, Next<'_, Updater>) -> Record + Send + Sync + 'static,
    ) -> Self {
        self.before = Some(Arc::new(hook));
        self
    }

    /// Post-process the record after every rule ran
    #[must_use]
    pub fn after(
        mut self,
        hook: impl Fn(Record, Next<'_, Updater>) -> Record + Send + Sync + 'static,
    ) -> Self {
        self.after = Some(Arc::new(hook));
        self
    }

    /// Keys stripped from the finished record
    #[must_use]
    pub fn omits<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.omits = Some(keys.into_iter().map(Into::into).collect());
        self
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("omits", &self.omits)
            .finish()
    }
}

impl<'a> Next<'a, Updater> {
    /// Run the next declaration of rule `key`, `Null` if there is none
    pub fn rule(self, key: &str, record: &Record) -> Value {
        match self.find(|layer| layer.rules.get(key).map(|rule| &**rule)) {
            Some((rule, next)) => rule(record, next),
            None => Value::Null,
        }
    }

    /// Run the next `before` hook, identity if there is none
    pub fn before(self, record: Record) -> Record {
        match self.find(|layer| layer.before.as_deref()) {
            Some((hook, next)) => hook(record, next),
            None => record,
        }
    }

    /// Run the next `after` hook, identity if there is none
    pub fn after(self, record: Record) -> Record {
        match self.find(|layer| layer.after.as_deref()) {
            Some((hook, next)) => hook(record, next),
            None => record,
        }
    }
}

impl Chain<Updater> {
    /// Run the composed updater over one record
    pub fn apply(&self, record: Record) -> Record {
        let mut record = self.cursor().before(record);

        let keys: BTreeSet<&str> = self
            .iter()
            .flat_map(|layer| layer.rules.keys().map(String::as_str))
            .collect();
        for key in keys {
            let value = self.cursor().rule(key, &record);
            record.insert(key.to_string(), value);
        }

        let mut record = self.cursor().after(record);

        if let Some(omits) = self.attr(|layer| layer.omits.as_deref()) {
            for key in omits {
                record.remove(key);
            }
        }
        record
    }

    /// Run over an object, or over every object of an array independently
    ///
    /// Other values pass through untouched.
    pub fn apply_value(&self, value: Value) -> Value {
        match value {
            Value::Object(record) => Value::Object(self.apply(record)),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.apply_value(item))
                    .collect(),
            ),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_rules_write_under_their_name_in_key_order() {
        let layer = Updater::new()
            .rule("b_double", |r, _| json!(r["a_base"].as_i64().unwrap_or(0) * 2))
            .rule("a_base", |_, _| json!(21));
        let chain = Chain::compose(Some(layer), &[]);

        let out = chain.apply(Record::new());
        assert_eq!(out["a_base"], json!(21));
        assert_eq!(out["b_double"], json!(42));
    }

    #[test]
    fn test_depth_three_explicit_chaining() {
        let calls = Arc::new(Mutex::new(Vec::new()));

        let log = calls.clone();
        let root = Updater::new().rule("tag", move |_, _| {
            log.lock().unwrap().push("root");
            json!("root")
        });
        // does not chain, so root is never reached through it
        let log = calls.clone();
        let middle = Updater::new().rule("tag", move |_, _| {
            log.lock().unwrap().push("middle");
            json!("middle")
        });
        let log = calls.clone();
        let leaf = Updater::new().rule("tag", move |r, next| {
            log.lock().unwrap().push("leaf");
            let inner = next.rule("tag", r);
            json!(format!("leaf>{}", inner.as_str().unwrap_or("")))
        });

        let root = Chain::compose(Some(root), &[]);
        let middle = Chain::compose(Some(middle), &[&root]);
        let leaf = Chain::compose(Some(leaf), &[&middle]);

        let out = leaf.apply(Record::new());
        assert_eq!(out["tag"], json!("leaf>middle"));
        assert_eq!(*calls.lock().unwrap(), vec!["leaf", "middle"]);
    }

    #[test]
    fn test_chaining_through_every_ancestor() {
        let root = Chain::compose(
            Some(Updater::new().after(|mut r, _| {
                r.insert("order".into(), json!(["root"]));
                r
            })),
            &[],
        );
        let middle = Chain::compose(
            Some(Updater::new().after(|r, next| {
                let mut r = next.after(r);
                if let Some(Value::Array(order)) = r.get_mut("order") {
                    order.push(json!("middle"));
                }
                r
            })),
            &[&root],
        );
        let leaf = Chain::compose(
            Some(Updater::new().after(|r, next| {
                let mut r = next.after(r);
                if let Some(Value::Array(order)) = r.get_mut("order") {
                    order.push(json!("leaf"));
                }
                r
            })),
            &[&middle],
        );

        let out = leaf.apply(Record::new());
        assert_eq!(out["order"], json!(["root", "middle", "leaf"]));
    }

    #[test]
    fn test_next_without_ancestor_yields_null() {
        let chain = Chain::compose(
            Some(Updater::new().rule("x", |r, next| next.rule("x", r))),
            &[],
        );
        assert_eq!(chain.apply(Record::new())["x"], Value::Null);
    }

    #[test]
    fn test_inherited_rules_run_alongside_own() {
        let base = Chain::compose(Some(Updater::new().rule("from_base", |_, _| json!(1))), &[]);
        let child = Chain::compose(Some(Updater::new().rule("from_child", |_, _| json!(2))), &[&base]);

        let out = child.apply(Record::new());
        assert_eq!(out["from_base"], json!(1));
        assert_eq!(out["from_child"], json!(2));
    }

    #[test]
    fn test_nearest_omits_wins() {
        let base = Chain::compose(Some(Updater::new().omits(["a", "b"])), &[]);
        let child = Chain::compose(Some(Updater::new().omits(["c"])), &[&base]);

        let out = child.apply(record(json!({"a": 1, "b": 2, "c": 3})));
        assert_eq!(Value::Object(out), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_before_seeds_record() {
        let chain = Chain::compose(
            Some(Updater::new().before(|_, _| record(json!({"seeded": true})))),
            &[],
        );
        let out = chain.apply(record(json!({"dropped": 1})));
        assert_eq!(Value::Object(out), json!({"seeded": true}));
    }

    #[test]
    fn test_apply_value_maps_arrays_independently() {
        let chain = Chain::compose(
            Some(Updater::new().rule("n", |r, _| json!(r["v"].as_i64().unwrap_or(0) + 1))),
            &[],
        );
        let out = chain.apply_value(json!([{"v": 1}, {"v": 5}, "scalar"]));
        assert_eq!(out, json!([{"v": 1, "n": 2}, {"v": 5, "n": 6}, "scalar"]));
    }
}
