/// Member roster
///
/// - `GET    /api/members?q=&status=&family_id=&page=&per_page=`
/// - `GET    /api/members/search?q=` (pickers, min 2 chars, max 10 rows)
/// - `POST   /api/members` (STAFF+; same email upserts)
/// - `GET    /api/members/:id`
/// - `PUT    /api/members/:id` (STAFF+)
/// - `DELETE /api/members/:id` (STAFF+)

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
        family::Family,
        member::{Member, MemberFilter, MemberInput, MemberSummary},
        normalize_email, ListParams, Page,
    },
    plan_limits::{LimitedResource, PlanLimitEnforcer},
};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub(crate) async fn check_family(pool: &PgPool, church_id: Uuid, family_id: Option<Uuid>) -> ApiResult<()> {
    if let Some(family_id) = family_id {
        if !Family::exists(pool, church_id, family_id).await? {
            return Err(ApiError::invalid("family_id", "Family not found"));
        }
    }
    Ok(())
}

pub async fn list_members(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Query(filter): Query<MemberFilter>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Page<Member>>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    Ok(Json(Member::list(&state.db, ctx.church_id, &filter, params).await?))
}

pub async fn search_members(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<MemberSummary>>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    Ok(Json(Member::search(&state.db, ctx.church_id, &query.q).await?))
}

/// Answers 201 for a new member and 200 when an existing email was updated
///
/// Only new members count against the plan's member limit.
pub async fn create_member(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Json(data): Json<MemberInput>,
) -> ApiResult<(StatusCode, Json<Member>)> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;
    check_family(&state.db, ctx.church_id, data.family_id).await?;

    let existing = match normalize_email(data.email.clone()) {
        Some(email) => Member::find_by_email(&state.db, ctx.church_id, &email).await?,
        None => None,
    };
    if existing.is_none() {
        PlanLimitEnforcer::new(state.db.clone())
            .enforce(ctx.church_id, LimitedResource::Members)
            .await?;
    }

    let (member, inserted) = Member::upsert(&state.db, ctx.church_id, data).await?;

    if inserted {
        tracing::info!(church_id = %ctx.church_id, member_id = %member.id, "Member created");
        Ok((StatusCode::CREATED, Json(member)))
    } else {
        tracing::debug!(church_id = %ctx.church_id, member_id = %member.id, "Member upserted by email");
        Ok((StatusCode::OK, Json(member)))
    }
}

pub async fn get_member(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Member>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    let member = Member::find_by_id(&state.db, ctx.church_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Member"))?;
    Ok(Json(member))
}

pub async fn update_member(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
    Json(data): Json<MemberInput>,
) -> ApiResult<Json<Member>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;
    check_family(&state.db, ctx.church_id, data.family_id).await?;

    let member = Member::update(&state.db, ctx.church_id, id, data)
        .await?
        .ok_or_else(|| ApiError::not_found("Member"))?;
    Ok(Json(member))
}

pub async fn delete_member(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&ctx, ResourcePermission::Write)?;
    if !Member::delete(&state.db, ctx.church_id, id).await? {
        return Err(ApiError::not_found("Member"));
    }
    tracing::info!(church_id = %ctx.church_id, member_id = %id, "Member deleted");
    Ok(StatusCode::NO_CONTENT)
}
