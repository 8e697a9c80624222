/// Events
///
/// `recurrence_rule` is stored and returned as given; recurring events are
/// not expanded into occurrences.

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
        event::{Event, EventFilter, EventInput},
        ListParams, Page,
    },
};
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_UPCOMING: i64 = 10;
const MAX_UPCOMING: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub limit: Option<i64>,
}

pub async fn list_events(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Query(filter): Query<EventFilter>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Page<Event>>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    Ok(Json(Event::list(&state.db, ctx.church_id, &filter, params).await?))
}

pub async fn upcoming_events(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Query(query): Query<UpcomingQuery>,
) -> ApiResult<Json<Vec<Event>>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    let limit = query.limit.unwrap_or(DEFAULT_UPCOMING).clamp(1, MAX_UPCOMING);
    Ok(Json(Event::upcoming(&state.db, ctx.church_id, limit, false).await?))
}

pub async fn create_event(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Json(data): Json<EventInput>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;
    let event = Event::create(&state.db, ctx.church_id, data).await?;
    tracing::info!(church_id = %ctx.church_id, event_id = %event.id, "Event created");
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn get_event(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Event>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    let event = Event::find_by_id(&state.db, ctx.church_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Event"))?;
    Ok(Json(event))
}

pub async fn update_event(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
    Json(data): Json<EventInput>,
) -> ApiResult<Json<Event>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;
    let event = Event::update(&state.db, ctx.church_id, id, data)
        .await?
        .ok_or_else(|| ApiError::not_found("Event"))?;
    Ok(Json(event))
}

pub async fn delete_event(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&ctx, ResourcePermission::Write)?;
    if !Event::delete(&state.db, ctx.church_id, id).await? {
        return Err(ApiError::not_found("Event"));
    }
    Ok(StatusCode::NO_CONTENT)
}
