//! Resource definitions and the per-request pipeline
//!
//! A [`ResourceDef`] describes one exposed record type: its store, identity
//! field, optional parent, and composed policy chains. [`handle`] runs one
//! [`RequestParts`] through a definition:
//!
//! 1. guard
//! 2. parse the body
//! 3. option rules adjust the request's template and render options
//! 4. resolve [`Cardinality`] and the [`Action`] for the method
//! 5. validate the body for writes
//! 6. execute against the store
//! 7. shape with the resolved template, then dehydrate
//! 8. wrap collections with page metadata
//!
//! Any failure aborts the request with an [`Error`](crate::Error); the store
//! is never touched after a failed validation.

mod cardinality;
mod definition;
mod pipeline;
mod request;

pub use cardinality::{Action, Cardinality, Stage};
pub use definition::{Parent, Policies, ResourceBuilder, ResourceDef};
pub use pipeline::{handle, Resource};
pub use request::{Payload, RequestParts};
