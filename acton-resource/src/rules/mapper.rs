//! Side-effecting option handlers keyed by query parameter

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::Query;
use crate::policy::{Chain, Next};

type Rule<T> = dyn Fn(&mut T, &str, Next<'_, Mapper<T>>) + Send + Sync;
type Hook<T> = dyn Fn(&mut T, &Query, Next<'_, Mapper<T>>) + Send + Sync;

/// One option layer mutating a target `T`
///
/// Used with `T = Resource<S>` so a query parameter can adjust the request's
/// template overrides or render options before anything runs.
pub struct Mapper<T> {
    rules: BTreeMap<String, Arc<Rule<T>>>,
    before: Option<Arc<Hook<T>>>,
    after: Option<Arc<Hook<T>>>,
}

impl<T> Mapper<T> {
    /// Create an empty layer
    pub fn new() -> Self {
        Self {
            rules: BTreeMap::new(),
            before: None,
            after: None,
        }
    }

    /// React to `key` in the query
    #[must_use]
    pub fn rule(
        mut self,
        key: impl Into<String>,
        rule: impl Fn(&mut T, &str, Next<'_, Mapper<T>>) + Send + Sync + 'static,
    ) -> Self {
        self.rules.insert(key.into(), Arc::new(rule));
        self
    }

    /// Run before any rule
    #[must_use]
    pub fn before(
        mut self,
        hook: impl Fn(&mut T, &Query, Next<'_, Mapper<T>>) + Send + Sync + 'static,
    ) -> Self {
        self.before = Some(Arc::new(hook));
        self
    }

    /// Run after every matching rule
    #[must_use]
    pub fn after(
        mut self,
        hook: impl Fn(&mut T, &Query, Next<'_, Mapper<T>>) + Send + Sync + 'static,
    ) -> Self {
        self.after = Some(Arc::new(hook));
        self
    }
}

impl<T> Default for Mapper<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Mapper<T> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
            before: self.before.clone(),
            after: self.after.clone(),
        }
    }
}

impl<T> fmt::Debug for Mapper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

impl<'a, T> Next<'a, Mapper<T>> {
    /// Run the next declaration of rule `key`, no-op if none
    pub fn rule(self, key: &str, target: &mut T, value: &str) {
        if let Some((rule, next)) = self.find(|layer| layer.rules.get(key).map(|rule| &**rule)) {
            rule(target, value, next);
        }
    }

    /// Run the next `before` hook, no-op if none
    pub fn before(self, target: &mut T, query: &Query) {
        if let Some((hook, next)) = self.find(|layer| layer.before.as_deref()) {
            hook(target, query, next);
        }
    }

    /// Run the next `after` hook, no-op if none
    pub fn after(self, target: &mut T, query: &Query) {
        if let Some((hook, next)) = self.find(|layer| layer.after.as_deref()) {
            hook(target, query, next);
        }
    }
}

impl<T> Chain<Mapper<T>> {
    /// Apply every query key that has a rule to `target`
    pub fn map(&self, target: &mut T, query: &Query) {
        self.cursor().before(target, query);
        for (key, value) in query {
            self.cursor().rule(key, target, value);
        }
        self.cursor().after(target, query);
    }
}
