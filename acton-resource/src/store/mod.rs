//! Record storage abstraction
//!
//! - [`Store`]: the backend interface the request pipeline drives
//! - [`StoreError`]: structured errors with operation and record context
//! - [`MemoryStore`]: reference in-memory backend

mod error;
mod memory;
mod traits;

pub use error::{StoreError, StoreErrorKind, StoreOperation};
pub use memory::{loose_eq, MemoryQuery, MemoryStore};
pub use traits::{Constraints, Record, Store, StoreResult};
