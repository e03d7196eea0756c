//! Single-record versus collection dispatch

use std::collections::BTreeMap;
use std::fmt;

use http::Method;

use crate::error::{Error, Result};

/// Whether a request addresses one record or a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// Store action selected by cardinality and method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// One/GET
    Fetch,
    /// One/PUT
    Replace,
    /// One/PATCH
    Modify,
    /// One/DELETE
    Remove,
    /// Many/GET
    List,
    /// Many/POST
    Create,
    /// Many/DELETE
    Clear,
}

impl Action {
    /// Whether the action consumes the request body
    pub fn writes(self) -> bool {
        matches!(self, Self::Replace | Self::Modify | Self::Create)
    }
}

impl Cardinality {
    /// A `uid` capture addresses one record
    pub fn resolve(ids: &BTreeMap<String, String>) -> Self {
        if ids.contains_key("uid") {
            Self::One
        } else {
            Self::Many
        }
    }

    /// Methods accepted at this cardinality
    pub fn allowed(self) -> Vec<Method> {
        match self {
            Self::One => vec![Method::GET, Method::PUT, Method::PATCH, Method::DELETE],
            Self::Many => vec![Method::GET, Method::POST, Method::DELETE],
        }
    }

    /// Action for `method`, or `MethodNotAllowed` carrying the accepted set
    pub fn action(self, method: &Method) -> Result<Action> {
        let action = match (self, method.as_str()) {
            (Self::One, "GET") => Action::Fetch,
            (Self::One, "PUT") => Action::Replace,
            (Self::One, "PATCH") => Action::Modify,
            (Self::One, "DELETE") => Action::Remove,
            (Self::Many, "GET") => Action::List,
            (Self::Many, "POST") => Action::Create,
            (Self::Many, "DELETE") => Action::Clear,
            _ => {
                return Err(Error::MethodNotAllowed {
                    method: method.clone(),
                    allowed: self.allowed(),
                })
            }
        };
        Ok(action)
    }
}

/// Pipeline progress; each request moves strictly forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Received,
    Parsed,
    Configured,
    CardinalityResolved,
    Validated,
    Executed,
    Shaped,
    Dehydrated,
    Paginated,
    Serialized,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Parsed => "parsed",
            Self::Configured => "configured",
            Self::CardinalityResolved => "cardinality_resolved",
            Self::Validated => "validated",
            Self::Executed => "executed",
            Self::Shaped => "shaped",
            Self::Dehydrated => "dehydrated",
            Self::Paginated => "paginated",
            Self::Serialized => "serialized",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_selects_one() {
        let mut ids = BTreeMap::new();
        assert_eq!(Cardinality::resolve(&ids), Cardinality::Many);
        ids.insert("rel".to_string(), "1".to_string());
        assert_eq!(Cardinality::resolve(&ids), Cardinality::Many);
        ids.insert("uid".to_string(), "2".to_string());
        assert_eq!(Cardinality::resolve(&ids), Cardinality::One);
    }

    #[test]
    fn test_method_table() {
        assert_eq!(Cardinality::One.action(&Method::PATCH).unwrap(), Action::Modify);
        assert_eq!(Cardinality::Many.action(&Method::POST).unwrap(), Action::Create);
        assert_eq!(Cardinality::Many.action(&Method::DELETE).unwrap(), Action::Clear);

        let err = Cardinality::One.action(&Method::POST).unwrap_err();
        match err {
            Error::MethodNotAllowed { method, allowed } => {
                assert_eq!(method, Method::POST);
                assert_eq!(allowed, vec![Method::GET, Method::PUT, Method::PATCH, Method::DELETE]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(Cardinality::Many.action(&Method::PUT).is_err());
        assert!(Cardinality::Many.action(&Method::OPTIONS).is_err());
    }

    #[test]
    fn test_only_body_actions_write() {
        assert!(Action::Create.writes());
        assert!(Action::Replace.writes());
        assert!(!Action::Clear.writes());
        assert!(!Action::Fetch.writes());
    }
}
