//! Request guards
//!
//! Authentication and throttling live outside the pipeline. A [`Guard`]
//! attached to a definition is consulted once per request before anything is
//! parsed, and its error ([`Error::Unauthorized`], [`Error::RateLimitExceeded`],
//! or any other) is returned untouched.
//!
//! # Example
//!
//! ```rust
//! use acton_resource::guard::{bearer_token, Guard};
//! use acton_resource::resource::RequestParts;
//! use acton_resource::Error;
//!
//! let guard = |request: &RequestParts| {
//!     let token = bearer_token(&request.headers)?;
//!     if token == "let-me-in" {
//!         Ok(())
//!     } else {
//!         Err(Error::Unauthorized("Unknown token".to_string()))
//!     }
//! };
//!
//! assert!(guard.check(&RequestParts::default()).is_err());
//! ```

use http::{header, HeaderMap};

use crate::error::{Error, Result};
use crate::resource::RequestParts;

/// Pre-pipeline request check
pub trait Guard: Send + Sync {
    /// Allow the request through, or fail it
    fn check(&self, request: &RequestParts) -> Result<()>;
}

impl<F> Guard for F
where
    F: Fn(&RequestParts) -> Result<()> + Send + Sync,
{
    fn check(&self, request: &RequestParts) -> Result<()> {
        self(request)
    }
}

/// Extract the token from an `Authorization: Bearer` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::Unauthorized("Missing Authorization header".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| Error::Unauthorized("Invalid Authorization header format".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(Error::Unauthorized(_))));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(bearer_token(&headers), Err(Error::Unauthorized(_))));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc");
    }

    #[test]
    fn test_closure_guard() {
        let throttled = |_: &RequestParts| -> Result<()> { Err(Error::RateLimitExceeded) };
        assert!(matches!(
            throttled.check(&RequestParts::default()),
            Err(Error::RateLimitExceeded)
        ));
    }
}
