/// Volunteer roles, assignments and shifts
///
/// ```text
/// GET/POST        /api/volunteers                 assignments (member <-> role)
/// GET             /api/volunteers/member-search?q= picker for assignment
/// GET/POST        /api/volunteers/roles
/// PUT/DELETE      /api/volunteers/roles/:id
/// GET/PUT/DELETE  /api/volunteers/:id
/// GET/POST        /api/volunteers/:id/shifts
/// GET             /api/volunteers/shifts/upcoming
/// DELETE          /api/volunteers/shifts/:id
/// ```

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
        member::{Member, MemberSummary},
        volunteer::{
            AssignVolunteer, ShiftDetail, ShiftInput, UpdateVolunteer, Volunteer, VolunteerDetail,
            VolunteerRole, VolunteerRoleInput, VolunteerShift,
        },
    },
};
use serde::Deserialize;
use uuid::Uuid;

const UPCOMING_SHIFT_LIMIT: i64 = 25;

#[derive(Debug, Default, Deserialize)]
pub struct VolunteerQuery {
    pub role_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MemberSearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn list_roles(
    State(state): State<AppState>,
    ctx: ChurchContext,
) -> ApiResult<Json<Vec<VolunteerRole>>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    Ok(Json(VolunteerRole::list(&state.db, ctx.church_id).await?))
}

pub async fn create_role(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Json(data): Json<VolunteerRoleInput>,
) -> ApiResult<(StatusCode, Json<VolunteerRole>)> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;
    let role = VolunteerRole::create(&state.db, ctx.church_id, data).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn update_role(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
    Json(data): Json<VolunteerRoleInput>,
) -> ApiResult<Json<VolunteerRole>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;
    let role = VolunteerRole::update(&state.db, ctx.church_id, id, data)
        .await?
        .ok_or_else(|| ApiError::not_found("Volunteer role"))?;
    Ok(Json(role))
}

/// Removes the role with its assignments and shifts
pub async fn delete_role(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&ctx, ResourcePermission::Write)?;
    if !VolunteerRole::delete(&state.db, ctx.church_id, id).await? {
        return Err(ApiError::not_found("Volunteer role"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_volunteers(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Query(query): Query<VolunteerQuery>,
) -> ApiResult<Json<Vec<VolunteerDetail>>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    Ok(Json(Volunteer::list(&state.db, ctx.church_id, query.role_id).await?))
}

/// `GET /api/volunteers/member-search?q=`
///
/// Short queries return an empty list rather than an error.
pub async fn member_search(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Query(query): Query<MemberSearchQuery>,
) -> ApiResult<Json<Vec<MemberSummary>>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    Ok(Json(Member::search(&state.db, ctx.church_id, &query.q).await?))
}

/// 409 when the member already holds the role
pub async fn assign_volunteer(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Json(data): Json<AssignVolunteer>,
) -> ApiResult<(StatusCode, Json<Volunteer>)> {
    require_permission(&ctx, ResourcePermission::Write)?;
    let volunteer = Volunteer::assign(&state.db, ctx.church_id, data)
        .await?
        .ok_or_else(|| ApiError::invalid("member_id", "Member or role not found"))?;
    tracing::info!(
        church_id = %ctx.church_id,
        volunteer_id = %volunteer.id,
        role_id = %volunteer.role_id,
        "Volunteer assigned"
    );
    Ok((StatusCode::CREATED, Json(volunteer)))
}

pub async fn get_volunteer(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Volunteer>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    let volunteer = Volunteer::find_by_id(&state.db, ctx.church_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Volunteer"))?;
    Ok(Json(volunteer))
}

pub async fn update_volunteer(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
    Json(data): Json<UpdateVolunteer>,
) -> ApiResult<Json<Volunteer>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    let volunteer = Volunteer::update(&state.db, ctx.church_id, id, data)
        .await?
        .ok_or_else(|| ApiError::not_found("Volunteer"))?;
    Ok(Json(volunteer))
}

pub async fn remove_volunteer(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&ctx, ResourcePermission::Write)?;
    if !Volunteer::remove(&state.db, ctx.church_id, id).await? {
        return Err(ApiError::not_found("Volunteer"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_shifts(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(volunteer_id): Path<Uuid>,
) -> ApiResult<Json<Vec<VolunteerShift>>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    if Volunteer::find_by_id(&state.db, ctx.church_id, volunteer_id).await?.is_none() {
        return Err(ApiError::not_found("Volunteer"));
    }
    Ok(Json(VolunteerShift::list_for_volunteer(&state.db, ctx.church_id, volunteer_id).await?))
}

/// Shifts must end after they start
pub async fn create_shift(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(volunteer_id): Path<Uuid>,
    Json(data): Json<ShiftInput>,
) -> ApiResult<(StatusCode, Json<VolunteerShift>)> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;
    let shift = VolunteerShift::create(&state.db, ctx.church_id, volunteer_id, data)
        .await?
        .ok_or_else(|| ApiError::not_found("Volunteer or event"))?;
    Ok((StatusCode::CREATED, Json(shift)))
}

pub async fn upcoming_shifts(
    State(state): State<AppState>,
    ctx: ChurchContext,
) -> ApiResult<Json<Vec<ShiftDetail>>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    Ok(Json(VolunteerShift::upcoming(&state.db, ctx.church_id, UPCOMING_SHIFT_LIMIT).await?))
}

pub async fn delete_shift(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&ctx, ResourcePermission::Write)?;
    if !VolunteerShift::delete(&state.db, ctx.church_id, id).await? {
        return Err(ApiError::not_found("Shift"));
    }
    Ok(StatusCode::NO_CONTENT)
}
