//! Middleware and extractors for the scheduler API
//!
//! Owner identity is expected to come from an external auth layer (API
//! gateway, sidecar) that this crate's Non-goals deliberately don't
//! implement. `OwnerId` reads it from a header as a stand-in until that
//! layer exists.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::{unauthorized, ApiError};

pub const OWNER_HEADER: &str = "x-owner-id";

/// Tenant identity for a request, extracted from the `X-Owner-Id` header.
pub struct OwnerId(pub String);

impl<S> FromRequestParts<S> for OwnerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(|s| OwnerId(s.to_string()))
            .ok_or_else(|| unauthorized(format!("missing {} header", OWNER_HEADER)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn test_owner_id_extracted_from_header() {
        let req = Request::builder().header(OWNER_HEADER, "tenant-1").body(()).unwrap();
        let (mut parts, _) = req.into_parts();
        let OwnerId(owner) = OwnerId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(owner, "tenant-1");
    }

    #[tokio::test]
    async fn test_owner_id_rejected_without_header() {
        let req = Request::builder().body(()).unwrap();
        let (mut parts, _) = req.into_parts();
        assert!(OwnerId::from_request_parts(&mut parts, &()).await.is_err());
    }
}
