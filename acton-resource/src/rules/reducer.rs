//! Collection narrowing by query keys

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::Query;
use crate::error::Result;
use crate::policy::{Chain, Next};

type Rule<C> = dyn Fn(C, &str, Next<'_, Reducer<C>>) -> Result<C> + Send + Sync;
type Hook<C> = dyn Fn(C, &Query, Next<'_, Reducer<C>>) -> Result<C> + Send + Sync;

/// One filter layer over an opaque collection `C`
///
/// For each query key with a rule, the rule receives the collection so far
/// and the raw value and returns the narrowed collection. A rule may reject a
/// malformed value with [`Error::InvalidParameter`](crate::Error::InvalidParameter).
pub struct Reducer<C> {
    rules: BTreeMap<String, Arc<Rule<C>>>,
    before: Option<Arc<Hook<C>>>,
    after: Option<Arc<Hook<C>>>,
}

impl<C> Reducer<C> {
    /// Create an empty layer
    pub fn new() -> Self {
        Self {
            rules: BTreeMap::new(),
            before: None,
            after: None,
        }
    }

    /// Narrow the collection when the query carries `key`
    #[must_use]
    pub fn rule(
        mut self,
        key: impl Into<String>,
        rule: impl Fn(C, &str, Next<'_, Reducer<C>>) -> Result<C> + Send + Sync + 'static,
    ) -> Self {
        self.rules.insert(key.into(), Arc::new(rule));
        self
    }

    /// Transform the collection before any rule runs
    #[must_use]
    pub fn before(
        mut self,
        hook: impl Fn(C, &Query, Next<'_, Reducer<C>>) -> Result<C> + Send + Sync + 'static,
    ) -> Self {
        self.before = Some(Arc::new(hook));
        self
    }

    /// Transform the collection after every matching rule ran
    #[must_use]
    pub fn after(
        mut self,
        hook: impl Fn(C, &Query, Next<'_, Reducer<C>>) -> Result<C> + Send + Sync + 'static,
    ) -> Self {
        self.after = Some(Arc::new(hook));
        self
    }
}

impl<C> Default for Reducer<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Clone for Reducer<C> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
            before: self.before.clone(),
            after: self.after.clone(),
        }
    }
}

impl<C> fmt::Debug for Reducer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reducer")
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

impl<'a, C> Next<'a, Reducer<C>> {
    /// Run the next declaration of rule `key`, unchanged collection if none
    pub fn rule(self, key: &str, collection: C, value: &str) -> Result<C> {
        match self.find(|layer| layer.rules.get(key).map(|rule| &**rule)) {
            Some((rule, next)) => rule(collection, value, next),
            None => Ok(collection),
        }
    }

    /// Run the next `before` hook, unchanged collection if none
    pub fn before(self, collection: C, query: &Query) -> Result<C> {
        match self.find(|layer| layer.before.as_deref()) {
            Some((hook, next)) => hook(collection, query, next),
            None => Ok(collection),
        }
    }

    /// Run the next `after` hook, unchanged collection if none
    pub fn after(self, collection: C, query: &Query) -> Result<C> {
        match self.find(|layer| layer.after.as_deref()) {
            Some((hook, next)) => hook(collection, query, next),
            None => Ok(collection),
        }
    }
}

impl<C> Chain<Reducer<C>> {
    /// Narrow `collection` by every query key that has a rule
    pub fn reduce(&self, collection: C, query: &Query) -> Result<C> {
        let mut collection = self.cursor().before(collection, query)?;
        for (key, value) in query {
            collection = self.cursor().rule(key, collection, value)?;
        }
        self.cursor().after(collection, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    type Numbers = Vec<i64>;

    fn query(pairs: &[(&str, &str)]) -> Query {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn parse(name: &str, value: &str) -> Result<i64> {
        value
            .parse()
            .map_err(|_| Error::invalid_parameter(name, "Please provide a valid integer value"))
    }

    fn numbers_filter() -> Chain<Reducer<Numbers>> {
        let layer = Reducer::new()
            .rule("min", |c: Numbers, v, _| {
                let min = parse("min", v)?;
                Ok(c.into_iter().filter(|n| *n >= min).collect())
            })
            .rule("max", |c: Numbers, v, _| {
                let max = parse("max", v)?;
                Ok(c.into_iter().filter(|n| *n <= max).collect())
            })
            .rule("odd", |c: Numbers, v, _| {
                Ok(if v == "true" {
                    c.into_iter().filter(|n| n % 2 != 0).collect()
                } else {
                    c
                })
            });
        Chain::compose(Some(layer), &[])
    }

    #[test]
    fn test_unmatched_keys_are_ignored() {
        let chain = numbers_filter();
        let out = chain.reduce((1..=5).collect(), &query(&[("sort", "desc")])).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_result_is_independent_of_key_order() {
        let chain = numbers_filter();
        let pairs = [("min", "3"), ("max", "9"), ("odd", "true")];
        let orders = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];

        let expected = vec![3, 5, 7, 9];
        for order in orders {
            // Fold each permutation rule by rule so the order is actually forced
            let mut collection: Numbers = (1..=12).collect();
            for index in order {
                let (key, value) = pairs[index];
                collection = chain.cursor().rule(key, collection, value).unwrap();
            }
            assert_eq!(collection, expected, "order {:?}", order);
        }

        let all = query(&pairs);
        assert_eq!(chain.reduce((1..=12).collect(), &all).unwrap(), expected);
    }

    #[test]
    fn test_rule_rejects_malformed_value() {
        let chain = numbers_filter();
        let err = chain
            .reduce(vec![1, 2], &query(&[("min", "three")]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { ref name, .. } if name == "min"));
    }

    #[test]
    fn test_before_and_after_bracket_the_pass() {
        let base = numbers_filter();
        let layer = Reducer::new()
            .before(|c: Numbers, _, next| next.before(c.into_iter().map(|n| n * 10).collect(), &Query::new()))
            .after(|c: Numbers, _, _| Ok(c.into_iter().rev().collect()));
        let chain = Chain::compose(Some(layer), &[&base]);

        let out = chain.reduce(vec![1, 2, 3], &query(&[("max", "20")])).unwrap();
        assert_eq!(out, vec![20, 10]);
    }

    #[test]
    fn test_child_rule_chains_to_parent() {
        let base = numbers_filter();
        let layer = Reducer::new().rule("min", |c: Numbers, v, next| {
            // Clamp negative minimums to zero, then defer
            let clamped = if v.starts_with('-') { "0" } else { v };
            next.rule("min", c, clamped)
        });
        let chain = Chain::compose(Some(layer), &[&base]);

        let out = chain.reduce(vec![-2, -1, 0, 1], &query(&[("min", "-5")])).unwrap();
        assert_eq!(out, vec![0, 1]);
    }
}
