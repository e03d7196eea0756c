//! Offset/limit windowing for collections
//!
//! A [`Slicer`] reads the window from the query, clamps it to the configured
//! bounds, and describes the result as [`PageMeta`] with links to the
//! neighbouring windows.
//!
//! # Example
//!
//! ```rust
//! use acton_resource::slicer::{get_slice, paginate};
//!
//! let books = ["a", "b", "c", "d", "e", "f"];
//! let window = get_slice(&books, Some(2), 2);
//! assert_eq!(window, &["c", "d"]);
//!
//! let meta = paginate(books.len() as u64, Some(2), 2, "/books");
//! assert_eq!(meta.prev.as_deref(), Some("/books?limit=2&offset=0"));
//! assert_eq!(meta.next.as_deref(), Some("/books?limit=2&offset=4"));
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::PaginationConfig;
use crate::error::{Error, Result};
use crate::rules::Query;

/// Metadata describing one window of a collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    /// Size of the scoped and filtered collection before windowing
    pub count: u64,
    /// Start of the window, when nonzero
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// Size of the window, when bounded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Link to the previous window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    /// Link to the next window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// Requested window after parsing and clamping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: Option<u64>,
}

/// Metadata key names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaNames {
    pub limit: String,
    pub offset: String,
    pub count: String,
    pub prev: String,
    pub next: String,
}

impl Default for MetaNames {
    fn default() -> Self {
        Self {
            limit: "limit".to_string(),
            offset: "offset".to_string(),
            count: "count".to_string(),
            prev: "prev".to_string(),
            next: "next".to_string(),
        }
    }
}

/// Offset/limit slicer layer
///
/// The nearest slicer in a definition's lineage is used as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slicer {
    /// Window size when the query names none; `None` leaves it unbounded
    pub default_limit: Option<u64>,
    /// Requested limits above this are clamped down
    pub max_limit: Option<u64>,
    /// Requested offsets above this are clamped down
    pub max_offset: Option<u64>,
    /// Query and metadata key names
    pub names: MetaNames,
}

impl Slicer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slicer built from the `[pagination]` section
    pub fn from_config(config: &PaginationConfig) -> Self {
        Self {
            default_limit: config.default_limit,
            max_limit: config.max_limit,
            max_offset: config.max_offset,
            names: MetaNames {
                limit: config.limit_name.clone(),
                offset: config.offset_name.clone(),
                count: config.count_name.clone(),
                prev: config.prev_name.clone(),
                next: config.next_name.clone(),
            },
        }
    }

    #[must_use]
    pub fn default_limit(mut self, limit: u64) -> Self {
        self.default_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn max_limit(mut self, limit: u64) -> Self {
        self.max_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn max_offset(mut self, offset: u64) -> Self {
        self.max_offset = Some(offset);
        self
    }

    /// Limit requested by the query, defaulted and clamped
    ///
    /// Zero is rejected since an empty window can never advance.
    pub fn limit(&self, query: &Query) -> Result<Option<u64>> {
        let requested = match query.get(&self.names.limit) {
            Some(raw) => {
                let limit = parse_non_negative(&self.names.limit, raw)?;
                if limit == 0 {
                    return Err(Error::invalid_parameter(
                        &self.names.limit,
                        "Please provide a limit greater than zero",
                    ));
                }
                Some(limit)
            }
            None => self.default_limit,
        };

        Ok(match (requested, self.max_limit) {
            (Some(limit), Some(max)) => Some(limit.min(max)),
            (None, Some(max)) => Some(max),
            (limit, None) => limit,
        })
    }

    /// Offset requested by the query, clamped
    pub fn offset(&self, query: &Query) -> Result<u64> {
        let offset = match query.get(&self.names.offset) {
            Some(raw) => parse_non_negative(&self.names.offset, raw)?,
            None => 0,
        };
        Ok(match self.max_offset {
            Some(max) => offset.min(max),
            None => offset,
        })
    }

    /// Both ends of the requested window
    pub fn window(&self, query: &Query) -> Result<Window> {
        Ok(Window {
            offset: self.offset(query)?,
            limit: self.limit(query)?,
        })
    }

    /// Metadata for `window` over a collection of `count` records
    ///
    /// `location` is the full URL of the collection; links append the window
    /// parameters to it.
    pub fn paginate(&self, count: u64, window: Window, location: &str) -> PageMeta {
        let link = |offset: u64, limit: u64| {
            format!(
                "{}?{}={}&{}={}",
                location, self.names.limit, limit, self.names.offset, offset
            )
        };

        PageMeta {
            count,
            offset: (window.offset != 0).then_some(window.offset),
            limit: window.limit,
            prev: prev_offset(window.limit, window.offset)
                .zip(window.limit)
                .map(|(offset, limit)| link(offset, limit)),
            next: next_offset(window.limit, window.offset, count)
                .zip(window.limit)
                .map(|(offset, limit)| link(offset, limit)),
        }
    }

    /// Metadata as a JSON object using the configured key names
    pub fn meta_value(&self, meta: &PageMeta) -> Value {
        let mut out = Map::new();
        out.insert(self.names.count.clone(), Value::from(meta.count));
        if let Some(offset) = meta.offset {
            out.insert(self.names.offset.clone(), Value::from(offset));
        }
        if let Some(limit) = meta.limit {
            out.insert(self.names.limit.clone(), Value::from(limit));
        }
        if let Some(prev) = &meta.prev {
            out.insert(self.names.prev.clone(), Value::from(prev.as_str()));
        }
        if let Some(next) = &meta.next {
            out.insert(self.names.next.clone(), Value::from(next.as_str()));
        }
        Value::Object(out)
    }
}

fn parse_non_negative(name: &str, raw: &str) -> Result<u64> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| Error::invalid_parameter(name, "Please provide a valid integer value"))?;
    u64::try_from(value)
        .map_err(|_| Error::invalid_parameter(name, "Please provide a valid positive integer value"))
}

/// Start of the previous window, if one fits before `offset`
pub fn prev_offset(limit: Option<u64>, offset: u64) -> Option<u64> {
    match limit {
        Some(limit) if offset != 0 && offset >= limit => Some(offset - limit),
        _ => None,
    }
}

/// Start of the next window, if records remain past this one
pub fn next_offset(limit: Option<u64>, offset: u64, count: u64) -> Option<u64> {
    let limit = limit?;
    let next = offset.checked_add(limit)?;
    (next < count).then_some(next)
}

/// The window of an in-memory slice
pub fn get_slice<T>(items: &[T], limit: Option<u64>, offset: u64) -> &[T] {
    let len = items.len();
    let start = usize::try_from(offset).map_or(len, |o| o.min(len));
    let end = match limit {
        Some(limit) => usize::try_from(limit).map_or(len, |l| start.saturating_add(l).min(len)),
        None => len,
    };
    &items[start..end]
}

/// [`Slicer::paginate`] with the default key names
pub fn paginate(count: u64, limit: Option<u64>, offset: u64, location: &str) -> PageMeta {
    Slicer::default().paginate(count, Window { offset, limit }, location)
}
