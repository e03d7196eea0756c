//! Transport-neutral request and response values

use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::rules::Query;

/// Everything the pipeline needs from an incoming request
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    /// Request method
    pub method: Method,
    /// Path captures, `uid` and `rel`
    pub ids: BTreeMap<String, String>,
    /// Decoded query string
    pub query: Query,
    pub headers: HeaderMap,
    /// Raw body, decoded as a JSON object when non-empty
    pub body: Bytes,
}

impl RequestParts {
    /// Empty request with `method`
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Address a single record
    #[must_use]
    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.ids.insert("uid".to_string(), uid.into());
        self
    }

    /// Set the parent identity of a nested resource
    #[must_use]
    pub fn rel(mut self, rel: impl Into<String>) -> Self {
        self.ids.insert("rel".to_string(), rel.into());
        self
    }

    /// Add a query parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Use `body` as the JSON body
    #[must_use]
    pub fn json(mut self, body: &Value) -> Self {
        self.body = Bytes::from(body.to_string());
        self
    }
}

/// Finished pipeline output, ready for encoding
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub status: StatusCode,
    pub body: Option<Value>,
    /// Set on creation
    pub location: Option<String>,
}

impl IntoResponse for Payload {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        };

        if let Some(location) = self.location {
            if let Ok(header_value) = HeaderValue::from_str(&location) {
                response.headers_mut().insert(header::LOCATION, header_value);
            }
        }

        response
    }
}
