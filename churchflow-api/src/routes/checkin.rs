/// Check-in and attendance
///
/// `POST /api/checkin` and `POST /api/attendance` are the two endpoints the
/// service worker replays after an offline period. Both are idempotent:
/// repeating a submission returns the existing record with 200 instead of
/// 201, so a replay never creates a duplicate.

use crate::{
    app::AppState,
    error::{validate_request, ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use churchflow_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::ChurchContext,
    },
    models::{
        attendance::{Attendance, AttendanceDetail, CreateAttendance, ServiceHeadcount},
        check_in::{CheckIn, CheckInDetail, CheckInOutcome, CreateCheckIn},
        event::Event,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct AttendanceQuery {
    /// Defaults to today (UTC)
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct AttendanceReport {
    pub date: NaiveDate,
    pub headcounts: Vec<ServiceHeadcount>,
    pub records: Vec<AttendanceDetail>,
}

/// `POST /api/checkin` (VOLUNTEER+)
pub async fn create_checkin(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Json(data): Json<CreateCheckIn>,
) -> ApiResult<(StatusCode, Json<CheckIn>)> {
    require_permission(&ctx, ResourcePermission::Record)?;

    match CheckIn::record(&state.db, ctx.church_id, data, Some(ctx.user_id)).await? {
        CheckInOutcome::Created(check_in) => {
            tracing::debug!(event_id = %check_in.event_id, member_id = %check_in.member_id, "Checked in");
            Ok((StatusCode::CREATED, Json(check_in)))
        }
        CheckInOutcome::AlreadyCheckedIn(check_in) => Ok((StatusCode::OK, Json(check_in))),
        CheckInOutcome::EventNotFound => Err(ApiError::not_found("Event")),
        CheckInOutcome::CheckInDisabled => Err(ApiError::invalid(
            "event_id",
            "Check-in is not enabled for this event",
        )),
        CheckInOutcome::MemberNotFound => Err(ApiError::invalid("member_id", "Member not found")),
    }
}

/// `GET /api/events/:id/checkins`
pub async fn list_event_checkins(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(event_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CheckInDetail>>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    if Event::find_by_id(&state.db, ctx.church_id, event_id).await?.is_none() {
        return Err(ApiError::not_found("Event"));
    }
    Ok(Json(CheckIn::list_for_event(&state.db, ctx.church_id, event_id).await?))
}

pub async fn delete_checkin(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&ctx, ResourcePermission::Write)?;
    if !CheckIn::delete(&state.db, ctx.church_id, id).await? {
        return Err(ApiError::not_found("Check-in"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/attendance` (VOLUNTEER+)
pub async fn record_attendance(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Json(data): Json<CreateAttendance>,
) -> ApiResult<(StatusCode, Json<Attendance>)> {
    require_permission(&ctx, ResourcePermission::Record)?;
    validate_request(&data)?;

    let (attendance, created) = Attendance::record(&state.db, ctx.church_id, data, Some(ctx.user_id))
        .await?
        .ok_or_else(|| ApiError::invalid("member_id", "Member not found"))?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(attendance)))
}

/// `GET /api/attendance?date=YYYY-MM-DD`
pub async fn list_attendance(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Query(query): Query<AttendanceQuery>,
) -> ApiResult<Json<AttendanceReport>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());

    let headcounts = Attendance::headcounts(&state.db, ctx.church_id, date).await?;
    let records = Attendance::list_for_date(&state.db, ctx.church_id, date).await?;

    Ok(Json(AttendanceReport {
        date,
        headcounts,
        records,
    }))
}

pub async fn delete_attendance(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&ctx, ResourcePermission::Write)?;
    if !Attendance::delete(&state.db, ctx.church_id, id).await? {
        return Err(ApiError::not_found("Attendance record"));
    }
    Ok(StatusCode::NO_CONTENT)
}
