/// Website builder: pages and the media library
///
/// Page content is validated block by block before it is stored, so the
/// public site never has to cope with malformed JSON.

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
        media_file::{MediaFile, MediaFileInput},
        web_page::{WebPage, WebPageInput},
    },
    plan_limits::{LimitedResource, PlanLimitEnforcer},
    website,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct MediaQuery {
    #[serde(default)]
    pub images_only: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AltTextUpdate {
    #[validate(length(max = 255))]
    pub alt_text: Option<String>,
}

fn validate_page(data: &WebPageInput) -> ApiResult<()> {
    validate_request(data)?;
    website::validate_blocks(&data.content)?;
    Ok(())
}

pub async fn list_pages(
    State(state): State<AppState>,
    ctx: ChurchContext,
) -> ApiResult<Json<Vec<WebPage>>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    Ok(Json(WebPage::list(&state.db, ctx.church_id).await?))
}

/// 403 `plan_limit_exceeded` once the tier's page allowance is used up
pub async fn create_page(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Json(data): Json<WebPageInput>,
) -> ApiResult<(StatusCode, Json<WebPage>)> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_page(&data)?;

    PlanLimitEnforcer::new(state.db.clone())
        .enforce(ctx.church_id, LimitedResource::Pages)
        .await?;

    let page = WebPage::create(&state.db, ctx.church_id, data).await?;
    tracing::info!(church_id = %ctx.church_id, page_id = %page.id, slug = %page.slug, "Page created");
    Ok((StatusCode::CREATED, Json(page)))
}

pub async fn get_page(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WebPage>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    let page = WebPage::find_by_id(&state.db, ctx.church_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Page"))?;
    Ok(Json(page))
}

pub async fn update_page(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
    Json(data): Json<WebPageInput>,
) -> ApiResult<Json<WebPage>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_page(&data)?;
    let page = WebPage::update(&state.db, ctx.church_id, id, data)
        .await?
        .ok_or_else(|| ApiError::not_found("Page"))?;
    Ok(Json(page))
}

pub async fn delete_page(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&ctx, ResourcePermission::Write)?;
    if !WebPage::delete(&state.db, ctx.church_id, id).await? {
        return Err(ApiError::not_found("Page"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_media(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Query(query): Query<MediaQuery>,
) -> ApiResult<Json<Vec<MediaFile>>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    Ok(Json(MediaFile::list(&state.db, ctx.church_id, query.images_only).await?))
}

/// Registers an already-uploaded file by URL
pub async fn create_media(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Json(data): Json<MediaFileInput>,
) -> ApiResult<(StatusCode, Json<MediaFile>)> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;
    let file = MediaFile::create(&state.db, ctx.church_id, Some(ctx.user_id), data).await?;
    Ok((StatusCode::CREATED, Json(file)))
}

pub async fn update_media(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
    Json(body): Json<AltTextUpdate>,
) -> ApiResult<Json<MediaFile>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&body)?;
    let file = MediaFile::update_alt_text(&state.db, ctx.church_id, id, body.alt_text)
        .await?
        .ok_or_else(|| ApiError::not_found("Media file"))?;
    Ok(Json(file))
}

pub async fn delete_media(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&ctx, ResourcePermission::Write)?;
    if !MediaFile::delete(&state.db, ctx.church_id, id).await? {
        return Err(ApiError::not_found("Media file"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(content: serde_json::Value) -> WebPageInput {
        serde_json::from_value(json!({ "title": "About", "content": content })).unwrap()
    }

    #[test]
    fn test_validate_page_accepts_valid_blocks() {
        let data = input(json!([
            { "id": "hero", "type": "hero", "content": { "title": "Welcome" } },
            { "id": "body", "type": "text", "content": { "body": "We meet on Sundays." } }
        ]));
        assert!(validate_page(&data).is_ok());
    }

    #[test]
    fn test_validate_page_rejects_duplicate_block_ids() {
        let data = input(json!([
            { "id": "a", "type": "text", "content": { "body": "one" } },
            { "id": "a", "type": "text", "content": { "body": "two" } }
        ]));
        let err = validate_page(&data).unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    #[test]
    fn test_validate_page_requires_title() {
        let data: WebPageInput = serde_json::from_value(json!({ "title": "" })).unwrap();
        assert!(validate_page(&data).is_err());
    }
}
