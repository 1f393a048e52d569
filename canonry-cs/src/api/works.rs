//! Work catalog endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use canonry_common::catalog::NewWork;
use canonry_common::model::{TierKind, Work, WorkEdge};
use serde::Deserialize;
use tracing::debug;

use super::parse_work_id;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Query parameters for GET /api/works
#[derive(Debug, Default, Deserialize)]
pub struct ListWorksParams {
    /// JAM, PLATE or CANON (case-insensitive)
    pub tier: Option<String>,
}

/// POST /api/works
///
/// Creates a work in JAM. Returns 201 with the new work.
pub async fn create_work(
    State(state): State<AppState>,
    payload: Result<Json<NewWork>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Work>)> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let work = state.catalog.create_work(request).await?;
    Ok((StatusCode::CREATED, Json(work)))
}

/// GET /api/works?tier=
pub async fn list_works(
    State(state): State<AppState>,
    params: Result<Query<ListWorksParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Work>>> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let tier = params
        .tier
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<TierKind>().map_err(ApiError::BadRequest))
        .transpose()?;

    let works = state.catalog.list_works(tier).await?;
    debug!(count = works.len(), ?tier, "Listed works");
    Ok(Json(works))
}

/// GET /api/works/:id
///
/// `:id` may be a work UUID or a slug.
pub async fn get_work(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<Work>> {
    Ok(Json(state.catalog.resolve(&key).await?))
}

/// DELETE /api/works/:id
///
/// Only works with no lineage, no promotion history and no canon lock can
/// be deleted. Returns 204.
pub async fn delete_work(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_work_id(&id)?;
    state.catalog.delete_work(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/works/:id/parents
pub async fn get_parents(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<WorkEdge>>> {
    let id = parse_work_id(&id)?;
    Ok(Json(state.edges.parents(id).await?))
}

/// GET /api/works/:id/children
pub async fn get_children(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<WorkEdge>>> {
    let id = parse_work_id(&id)?;
    Ok(Json(state.edges.children(id).await?))
}
