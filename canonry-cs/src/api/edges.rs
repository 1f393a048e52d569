//! Lineage edge endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use canonry_common::model::{EdgeType, WorkEdge};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Request body for POST /api/edges
#[derive(Debug, Deserialize)]
pub struct CreateEdgeRequest {
    pub source_id: Uuid,
    pub target_id: Uuid,
    /// FORK, MERGE or DERIVED
    #[serde(rename = "type")]
    pub edge_type: EdgeType,
}

/// POST /api/edges
///
/// Records `source_id -> target_id`. Returns 201 with the edge.
pub async fn create_edge(
    State(state): State<AppState>,
    payload: Result<Json<CreateEdgeRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<WorkEdge>)> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let edge = state
        .edges
        .create_edge(request.source_id, request.target_id, request.edge_type)
        .await?;
    Ok((StatusCode::CREATED, Json(edge)))
}
