//! # acton-resource
//!
//! Declarative exposure of record collections as REST resources.
//!
//! A [`ResourceDef`](resource::ResourceDef) binds a [`Store`](store::Store)
//! to a route name and a set of composable policies:
//!
//! - **Templates** decide which fields are returned, under which names, and
//!   how related records are nested ([`template`], [`shape`])
//! - **Filters** narrow collections from query parameters ([`rules::Reducer`])
//! - **Options** adjust a single request before it runs ([`rules::Mapper`])
//! - **Validators** check request bodies ([`rules::Validator`])
//! - **Hydrators and dehydrators** rewrite records on the way in and out
//!   ([`rules::Updater`])
//! - **Slicers** window collections and build page links ([`slicer`])
//!
//! Definitions extend one another. Every policy kind composes into a
//! [`Chain`](policy::Chain) in which the nearest declaration wins and may
//! call through to its ancestors explicitly.
//!
//! ## Example
//!
//! ```rust,no_run
//! use acton_resource::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let store = Arc::new(MemoryStore::new("book"));
//!     let books = ResourceDef::builder("books", Arc::clone(&store))
//!         .with_config(&config)
//!         .template(TemplateLayer::new().fields(["id", "title"]))
//!         .build();
//!     let author_books = ResourceDef::builder("books", store)
//!         .extends(&books)
//!         .nested_under("authors", "author_id")
//!         .build();
//!
//!     let app = router(books).merge(router(author_books));
//!     Server::new(config).serve(app).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod guard;
pub mod policy;
pub mod resource;
pub mod rules;
pub mod shape;
pub mod slicer;
pub mod store;
pub mod template;

#[cfg(feature = "observability")]
pub mod observability;

#[cfg(feature = "http")]
pub mod transport;

pub use error::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, PaginationConfig, ServiceConfig};
    pub use crate::error::{Error, ErrorResponse, ErrorSet, Result};
    pub use crate::guard::{bearer_token, Guard};
    pub use crate::policy::{Chain, Next};
    pub use crate::resource::{
        handle, Action, Cardinality, Payload, RequestParts, Resource, ResourceDef,
    };
    pub use crate::rules::{Mapper, Query, Reducer, Updater, Validator};
    pub use crate::shape::{FieldShaper, Shaper};
    pub use crate::slicer::{PageMeta, Slicer};
    pub use crate::store::{
        Constraints, MemoryQuery, MemoryStore, Record, Store, StoreError, StoreErrorKind,
        StoreResult,
    };
    pub use crate::template::{Hook, Relation, ShapeDescriptor, TemplateLayer};

    #[cfg(feature = "observability")]
    pub use crate::observability::init_tracing;

    #[cfg(feature = "http")]
    pub use crate::transport::{router, Server};

    pub use axum::http::{Method, StatusCode};
    pub use serde_json::{json, Value};
}
