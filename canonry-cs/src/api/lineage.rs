//! Lineage graph endpoint

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use canonry_common::lineage::LineageGraph;
use serde::Deserialize;
use tracing::debug;

use super::parse_work_id;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Query parameters for GET /api/works/:id/lineage
#[derive(Debug, Default, Deserialize)]
pub struct LineageParams {
    /// Hops in each direction; defaults to the configured default depth
    pub depth: Option<u32>,
}

/// GET /api/works/:id/lineage?depth=
///
/// Ancestors carry negative depths, descendants positive, the root 0.
/// Depths above the configured maximum fail with VALIDATION_ERROR.
pub async fn get_lineage(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<LineageParams>, QueryRejection>,
) -> ApiResult<Json<LineageGraph>> {
    let id = parse_work_id(&id)?;
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let depth = params
        .depth
        .unwrap_or(state.lineage_config.default_depth);

    let graph = state.lineage.build_graph(id, depth).await?;
    debug!(
        work_id = %id,
        depth,
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "Lineage graph built"
    );
    Ok(Json(graph))
}
