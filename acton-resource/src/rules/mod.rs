//! Dispatch-by-key rule layers
//!
//! Every policy kind that reacts to record or query keys is expressed as a
//! layer holding an explicit key → handler map, plus optional `before` and
//! `after` hooks that bracket the pass. Layers compose into a
//! [`Chain`](crate::policy::Chain); the nearest layer declaring a key wins and
//! may reach the next declaration through its [`Next`](crate::policy::Next)
//! cursor.
//!
//! | Layer | Used for | Runs over |
//! |---|---|---|
//! | [`Updater`] | hydration, dehydration | every declared rule |
//! | [`Reducer`] | filtering | query keys with a rule |
//! | [`Mapper`] | per-request options | query keys with a rule |
//! | [`Validator`] | body validation | body keys with a rule |
//!
//! Keys without a handler are ignored. Reducer and Mapper iterate the query in
//! unspecified order, so their rules must commute.

use std::collections::HashMap;

mod mapper;
mod reducer;
mod updater;
mod validator;

pub use mapper::Mapper;
pub use reducer::Reducer;
pub use updater::Updater;
pub use validator::Validator;

/// Decoded query string, key to raw value
pub type Query = HashMap<String, String>;
