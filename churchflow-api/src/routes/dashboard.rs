use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use churchflow_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::ChurchContext,
    },
    models::dashboard::DashboardSummary,
};

/// `GET /api/dashboard`
pub async fn dashboard(
    State(state): State<AppState>,
    ctx: ChurchContext,
) -> ApiResult<Json<DashboardSummary>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    Ok(Json(DashboardSummary::load(&state.db, ctx.church_id).await?))
}
