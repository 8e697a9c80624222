/// Prayer requests (staff side)
///
/// Public submissions arrive through `/c/:slug/prayer-requests`; see
/// `routes::public`.

use crate::{
    app::AppState,
    error::{validate_request, ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use churchflow_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::ChurchContext,
    },
    models::{
        member::Member,
        prayer_request::{PrayerRequest, PrayerRequestFilter, PrayerRequestInput, PrayerStatus},
        ListParams, Page,
    },
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: PrayerStatus,
}

pub async fn list_prayer_requests(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Query(filter): Query<PrayerRequestFilter>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Page<PrayerRequest>>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    Ok(Json(PrayerRequest::list(&state.db, ctx.church_id, &filter, params).await?))
}

pub async fn create_prayer_request(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Json(data): Json<PrayerRequestInput>,
) -> ApiResult<(StatusCode, Json<PrayerRequest>)> {
    require_permission(&ctx, ResourcePermission::Read)?;
    validate_request(&data)?;
    let request = PrayerRequest::create(&state.db, ctx.church_id, data)
        .await?
        .ok_or_else(|| ApiError::invalid("member_id", "Member not found"))?;
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn get_prayer_request(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PrayerRequest>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    let request = PrayerRequest::find_by_id(&state.db, ctx.church_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Prayer request"))?;
    Ok(Json(request))
}

pub async fn update_prayer_request(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
    Json(data): Json<PrayerRequestInput>,
) -> ApiResult<Json<PrayerRequest>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;
    if let Some(member_id) = data.member_id {
        if !Member::exists(&state.db, ctx.church_id, member_id).await? {
            return Err(ApiError::invalid("member_id", "Member not found"));
        }
    }
    let request = PrayerRequest::update(&state.db, ctx.church_id, id, data)
        .await?
        .ok_or_else(|| ApiError::not_found("Prayer request"))?;
    Ok(Json(request))
}

/// `PUT /api/prayer-requests/:id/status`
///
/// Setting ANSWERED stamps `answered_at`; moving away from it clears it.
pub async fn set_prayer_status(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusChange>,
) -> ApiResult<Json<PrayerRequest>> {
    require_permission(&ctx, ResourcePermission::Record)?;
    let request = PrayerRequest::set_status(&state.db, ctx.church_id, id, body.status)
        .await?
        .ok_or_else(|| ApiError::not_found("Prayer request"))?;
    Ok(Json(request))
}

pub async fn delete_prayer_request(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&ctx, ResourcePermission::Write)?;
    if !PrayerRequest::delete(&state.db, ctx.church_id, id).await? {
        return Err(ApiError::not_found("Prayer request"));
    }
    Ok(StatusCode::NO_CONTENT)
}
