//! HTTP API handlers for canonry-cs

pub mod auth;
pub mod buildinfo;
pub mod edges;
pub mod health;
pub mod lineage;
pub mod promotion;
pub mod sse;
pub mod works;

pub use auth::require_curator;
pub use buildinfo::get_build_info;
pub use edges::create_edge;
pub use health::health_routes;
pub use lineage::get_lineage;
pub use promotion::{get_promotions, promote_work};
pub use sse::event_stream;
pub use works::{create_work, delete_work, get_children, get_parents, get_work, list_works};

use crate::error::ApiError;
use uuid::Uuid;

/// Parse a work id path segment
pub(crate) fn parse_work_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::BadRequest(format!("'{}' is not a valid work id", raw)))
}
