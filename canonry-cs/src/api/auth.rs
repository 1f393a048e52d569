//! Curator identity middleware
//!
//! Authentication happens upstream. The auth proxy forwards the resolved
//! curator as `x-curator-id` and `x-curator-name`; this layer turns them
//! into a [`CuratorIdentity`] request extension or rejects with 401.

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use canonry_common::model::CuratorIdentity;
use tracing::warn;

use crate::error::ApiError;

pub const CURATOR_ID_HEADER: &str = "x-curator-id";
pub const CURATOR_NAME_HEADER: &str = "x-curator-name";

/// Require a curator identity on the request
///
/// Applied to curator-only routes. Handlers read the identity back with
/// `Extension<CuratorIdentity>`.
pub async fn require_curator(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let curator = curator_from_headers(request.headers())?;
    request.extensions_mut().insert(curator);
    Ok(next.run(request).await)
}

/// Read the curator headers; both must be present, UTF-8 and non-blank
pub fn curator_from_headers(headers: &HeaderMap) -> Result<CuratorIdentity, ApiError> {
    let id = header_value(headers, CURATOR_ID_HEADER)?;
    let name = header_value(headers, CURATOR_NAME_HEADER)?;
    Ok(CuratorIdentity::new(id, name))
}

fn header_value(headers: &HeaderMap, name: &'static str) -> Result<String, ApiError> {
    let value = headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match value {
        Some(v) => Ok(v.to_string()),
        None => {
            warn!(header = name, "Curator-only request without curator identity");
            Err(ApiError::Unauthorized(format!(
                "missing or invalid {} header",
                name
            )))
        }
    }
}
