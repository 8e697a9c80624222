/// Communications and message templates
///
/// Creating or editing a message never delivers it. DRAFT rows sit until
/// someone calls `/send`; SCHEDULED rows are claimed by the worker once
/// `scheduled_for` passes. Only DRAFT and SCHEDULED messages can be edited.

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
        communication::{
            Communication, CommunicationFilter, CommunicationInput, CommunicationStats,
            CommunicationStatus, MessageTemplate, TemplateInput,
        },
        ListParams, Page,
    },
};
use uuid::Uuid;

pub async fn list_communications(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Query(filter): Query<CommunicationFilter>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Page<Communication>>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    Ok(Json(Communication::list(&state.db, ctx.church_id, &filter, params).await?))
}

pub async fn communication_stats(
    State(state): State<AppState>,
    ctx: ChurchContext,
) -> ApiResult<Json<CommunicationStats>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    Ok(Json(Communication::stats(&state.db, ctx.church_id).await?))
}

pub async fn create_communication(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Json(data): Json<CommunicationInput>,
) -> ApiResult<(StatusCode, Json<Communication>)> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;

    let communication =
        Communication::create(&state.db, ctx.church_id, Some(ctx.user_id), data).await?;
    tracing::info!(
        church_id = %ctx.church_id,
        communication_id = %communication.id,
        channel = communication.channel.as_str(),
        status = ?communication.status,
        "Communication created"
    );
    Ok((StatusCode::CREATED, Json(communication)))
}

pub async fn get_communication(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Communication>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    let communication = Communication::find_by_id(&state.db, ctx.church_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Communication"))?;
    Ok(Json(communication))
}

/// 409 once the message has left DRAFT/SCHEDULED
pub async fn update_communication(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
    Json(data): Json<CommunicationInput>,
) -> ApiResult<Json<Communication>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;
    let communication = Communication::update(&state.db, ctx.church_id, id, data).await?;
    Ok(Json(communication))
}

/// `POST /api/communications/:id/send`
///
/// Moves the message to SENDING; the worker picks it up on its next poll.
pub async fn send_communication(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Communication>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    let communication = Communication::send_now(&state.db, ctx.church_id, id).await?;
    tracing::info!(church_id = %ctx.church_id, communication_id = %id, "Communication queued");
    Ok(Json(communication))
}

/// A message the worker is delivering cannot be deleted
pub async fn delete_communication(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&ctx, ResourcePermission::Write)?;
    if Communication::delete(&state.db, ctx.church_id, id).await? {
        return Ok(StatusCode::NO_CONTENT);
    }
    match Communication::find_by_id(&state.db, ctx.church_id, id).await? {
        Some(existing) if existing.status == CommunicationStatus::Sending => Err(
            ApiError::Conflict("Communication is being delivered and cannot be deleted".to_string()),
        ),
        _ => Err(ApiError::not_found("Communication")),
    }
}

pub async fn list_templates(
    State(state): State<AppState>,
    ctx: ChurchContext,
) -> ApiResult<Json<Vec<MessageTemplate>>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    Ok(Json(MessageTemplate::list(&state.db, ctx.church_id).await?))
}

pub async fn create_template(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Json(data): Json<TemplateInput>,
) -> ApiResult<(StatusCode, Json<MessageTemplate>)> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;
    let template = MessageTemplate::create(&state.db, ctx.church_id, data).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn get_template(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MessageTemplate>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    let template = MessageTemplate::find_by_id(&state.db, ctx.church_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Template"))?;
    Ok(Json(template))
}

pub async fn update_template(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
    Json(data): Json<TemplateInput>,
) -> ApiResult<Json<MessageTemplate>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;
    let template = MessageTemplate::update(&state.db, ctx.church_id, id, data)
        .await?
        .ok_or_else(|| ApiError::not_found("Template"))?;
    Ok(Json(template))
}

/// Messages built from the template keep their copied subject and body
pub async fn delete_template(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&ctx, ResourcePermission::Write)?;
    if !MessageTemplate::delete(&state.db, ctx.church_id, id).await? {
        return Err(ApiError::not_found("Template"));
    }
    Ok(StatusCode::NO_CONTENT)
}
