//! Policy composition across definition lineages
//!
//! A resource definition carries one [`Chain`] per policy kind (template,
//! filter, option, validator, hydrator, dehydrator, slicer). A chain is the
//! ordered list of layers that contribute to that kind, nearest definition
//! first. When a definition extends one or more bases, its chain for a kind is
//! built by [`Chain::compose`]:
//!
//! - the base chains are concatenated in base order;
//! - a definition that declares its own layer puts it in front of that list;
//! - a definition that does not declare one passes the base list through
//!   unchanged, so a later descendant still sees the whole lineage.
//!
//! Lookups stop at the nearest layer that answers. Rules that want the
//! behavior of an ancestor ask for it explicitly through the [`Next`] cursor
//! they are handed; results are never merged implicitly.
//!
//! # Example
//!
//! ```rust
//! use acton_resource::policy::Chain;
//!
//! #[derive(Debug)]
//! struct Layer {
//!     label: &'static str,
//!     limit: Option<u64>,
//! }
//!
//! let root = Chain::compose(Some(Layer { label: "root", limit: Some(10) }), &[]);
//! let middle: Chain<Layer> = Chain::compose(None, &[&root]);
//! let leaf = Chain::compose(Some(Layer { label: "leaf", limit: None }), &[&middle]);
//!
//! assert_eq!(leaf.len(), 2);
//! assert_eq!(leaf.attr(|layer| Some(&layer.label)), Some(&"leaf"));
//! // `leaf` does not declare a limit, so the lookup falls through to `root`
//! assert_eq!(leaf.attr(|layer| layer.limit.as_ref()), Some(&10));
//! ```

use std::fmt;
use std::sync::Arc;

/// Ordered policy layers for one behavior kind, nearest definition first
pub struct Chain<L> {
    layers: Vec<Arc<L>>,
}

impl<L> Chain<L> {
    /// Create an empty chain
    #[must_use]
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Compose a chain from an optional own layer and the chains of the bases
    ///
    /// Layers are shared, not cloned: a descendant chain points at the same
    /// `Arc`s as its ancestors.
    #[must_use]
    pub fn compose(own: Option<L>, bases: &[&Chain<L>]) -> Self {
        let mut layers: Vec<Arc<L>> = own.map(Arc::new).into_iter().collect();
        for base in bases {
            layers.extend(base.layers.iter().cloned());
        }
        Self { layers }
    }

    /// Number of layers in the chain
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether no definition in the lineage contributes a layer
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Iterate layers nearest first
    pub fn iter(&self) -> impl Iterator<Item = &L> {
        self.layers.iter().map(AsRef::as_ref)
    }

    /// Cursor positioned before the nearest layer
    #[must_use]
    pub fn cursor(&self) -> Next<'_, L> {
        Next {
            rest: &self.layers,
        }
    }

    /// Find the nearest layer answering `pick`, plus the cursor past it
    pub fn find<'a, T: ?Sized>(
        &'a self,
        pick: impl Fn(&'a L) -> Option<&'a T>,
    ) -> Option<(&'a T, Next<'a, L>)> {
        self.cursor().find(pick)
    }

    /// Value of the nearest layer that declares an attribute
    pub fn attr<'a, T: ?Sized>(&'a self, pick: impl Fn(&'a L) -> Option<&'a T>) -> Option<&'a T> {
        self.find(pick).map(|(value, _)| value)
    }
}

impl<L> Default for Chain<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> Clone for Chain<L> {
    fn clone(&self) -> Self {
        Self {
            layers: self.layers.clone(),
        }
    }
}

impl<L> fmt::Debug for Chain<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("layers", &self.layers.len())
            .finish()
    }
}

/// Cursor over the layers that follow the one currently running
///
/// Every rule and hook receives the cursor positioned just past its own
/// layer. Calling through it reaches the next ancestor that defines the same
/// slot; a rule that never calls it shadows its ancestors completely.
pub struct Next<'a, L> {
    rest: &'a [Arc<L>],
}

impl<'a, L> Next<'a, L> {
    /// Find the nearest remaining layer answering `pick`, plus the cursor past it
    pub fn find<T: ?Sized>(
        &self,
        pick: impl Fn(&'a L) -> Option<&'a T>,
    ) -> Option<(&'a T, Next<'a, L>)> {
        self.rest.iter().enumerate().find_map(|(index, layer)| {
            pick(layer.as_ref()).map(|found| {
                (
                    found,
                    Next {
                        rest: &self.rest[index + 1..],
                    },
                )
            })
        })
    }

    /// Number of layers still reachable
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }
}

impl<L> Clone for Next<'_, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L> Copy for Next<'_, L> {}

impl<L> fmt::Debug for Next<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.rest.len())
            .finish()
    }
}
