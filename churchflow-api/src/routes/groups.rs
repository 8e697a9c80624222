/// Groups and group membership

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
        group::{Group, GroupInput, GroupMember, GroupMemberDetail, GroupWithCount},
        member::Member,
    },
};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

const DEFAULT_GROUP_ROLE: &str = "member";
const MAX_GROUP_ROLE_LENGTH: usize = 20;

#[derive(Debug, Deserialize)]
pub struct AddGroupMember {
    pub member_id: Uuid,
    #[serde(default)]
    pub role: Option<String>,
}

impl AddGroupMember {
    /// Blank or missing roles become `member`
    fn role(&self) -> ApiResult<String> {
        let role = self
            .role
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_GROUP_ROLE);
        let role = role.to_lowercase();
        if role.chars().count() > MAX_GROUP_ROLE_LENGTH {
            return Err(ApiError::invalid("role", "Role is too long"));
        }
        Ok(role)
    }
}

async fn check_leader(pool: &PgPool, church_id: Uuid, leader_id: Option<Uuid>) -> ApiResult<()> {
    if let Some(leader_id) = leader_id {
        if !Member::exists(pool, church_id, leader_id).await? {
            return Err(ApiError::invalid("leader_id", "Leader not found"));
        }
    }
    Ok(())
}

pub async fn list_groups(
    State(state): State<AppState>,
    ctx: ChurchContext,
) -> ApiResult<Json<Vec<GroupWithCount>>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    Ok(Json(Group::list(&state.db, ctx.church_id).await?))
}

pub async fn create_group(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Json(data): Json<GroupInput>,
) -> ApiResult<(StatusCode, Json<Group>)> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;
    check_leader(&state.db, ctx.church_id, data.leader_id).await?;
    let group = Group::create(&state.db, ctx.church_id, data).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn get_group(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Group>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    let group = Group::find_by_id(&state.db, ctx.church_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Group"))?;
    Ok(Json(group))
}

pub async fn update_group(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
    Json(data): Json<GroupInput>,
) -> ApiResult<Json<Group>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;
    check_leader(&state.db, ctx.church_id, data.leader_id).await?;
    let group = Group::update(&state.db, ctx.church_id, id, data)
        .await?
        .ok_or_else(|| ApiError::not_found("Group"))?;
    Ok(Json(group))
}

pub async fn delete_group(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&ctx, ResourcePermission::Write)?;
    if !Group::delete(&state.db, ctx.church_id, id).await? {
        return Err(ApiError::not_found("Group"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_group_members(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<GroupMemberDetail>>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    if Group::find_by_id(&state.db, ctx.church_id, id).await?.is_none() {
        return Err(ApiError::not_found("Group"));
    }
    Ok(Json(Group::list_members(&state.db, ctx.church_id, id).await?))
}

/// Adding an existing member again updates their role
pub async fn add_group_member(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
    Json(body): Json<AddGroupMember>,
) -> ApiResult<(StatusCode, Json<GroupMember>)> {
    require_permission(&ctx, ResourcePermission::Write)?;
    let role = body.role()?;

    if Group::find_by_id(&state.db, ctx.church_id, id).await?.is_none() {
        return Err(ApiError::not_found("Group"));
    }
    let membership = Group::add_member(&state.db, ctx.church_id, id, body.member_id, &role)
        .await?
        .ok_or_else(|| ApiError::invalid("member_id", "Member not found"))?;
    Ok((StatusCode::CREATED, Json(membership)))
}

pub async fn remove_group_member(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path((id, member_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    require_permission(&ctx, ResourcePermission::Write)?;
    if !Group::remove_member(&state.db, ctx.church_id, id, member_id).await? {
        return Err(ApiError::not_found("Group membership"));
    }
    Ok(StatusCode::NO_CONTENT)
}
