//! Promotion endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use canonry_common::model::{CuratorIdentity, PromotionEvent};
use canonry_common::promotion::PromotionOutcome;
use serde::Deserialize;

use super::parse_work_id;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Request body for POST /api/works/:id/promote
#[derive(Debug, Deserialize)]
pub struct PromoteRequest {
    pub justification: String,
}

/// POST /api/works/:id/promote
///
/// Moves the work up one tier. The curator comes from the identity headers
/// checked by [`super::require_curator`]. Eligibility and justification are
/// re-validated on every call.
pub async fn promote_work(
    State(state): State<AppState>,
    Extension(curator): Extension<CuratorIdentity>,
    Path(id): Path<String>,
    payload: Result<Json<PromoteRequest>, JsonRejection>,
) -> ApiResult<Json<PromotionOutcome>> {
    let id = parse_work_id(&id)?;
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let outcome = state
        .promotion
        .promote(id, &request.justification, &curator)
        .await?;
    Ok(Json(outcome))
}

/// GET /api/works/:id/promotions
///
/// Promotion history, oldest first.
pub async fn get_promotions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<PromotionEvent>>> {
    let id = parse_work_id(&id)?;
    Ok(Json(state.promotion.history(id).await?))
}
