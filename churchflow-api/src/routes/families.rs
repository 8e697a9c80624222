/// Families
///
/// Listing includes member counts; `GET /api/families/:id/members` returns
/// the household.

use crate::{
    app::AppState,
    error::{validate_request, ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use churchflow_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::ChurchContext,
    },
    models::{
        family::{Family, FamilyInput, FamilyWithCount},
        member::Member,
    },
};
use uuid::Uuid;

pub async fn list_families(
    State(state): State<AppState>,
    ctx: ChurchContext,
) -> ApiResult<Json<Vec<FamilyWithCount>>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    Ok(Json(Family::list(&state.db, ctx.church_id).await?))
}

pub async fn create_family(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Json(data): Json<FamilyInput>,
) -> ApiResult<(StatusCode, Json<Family>)> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;
    let family = Family::create(&state.db, ctx.church_id, data).await?;
    Ok((StatusCode::CREATED, Json(family)))
}

pub async fn get_family(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Family>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    let family = Family::find_by_id(&state.db, ctx.church_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Family"))?;
    Ok(Json(family))
}

pub async fn update_family(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
    Json(data): Json<FamilyInput>,
) -> ApiResult<Json<Family>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;
    let family = Family::update(&state.db, ctx.church_id, id, data)
        .await?
        .ok_or_else(|| ApiError::not_found("Family"))?;
    Ok(Json(family))
}

/// Members of the family stay on the roster with no family
pub async fn delete_family(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&ctx, ResourcePermission::Write)?;
    if !Family::delete(&state.db, ctx.church_id, id).await? {
        return Err(ApiError::not_found("Family"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_family_members(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Member>>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    if !Family::exists(&state.db, ctx.church_id, id).await? {
        return Err(ApiError::not_found("Family"));
    }
    Ok(Json(Member::list_by_family(&state.db, ctx.church_id, id).await?))
}
