/// Donations and funds
///
/// Giving records are visible to STAFF and above only. Amounts are integer
/// cents.

use crate::{
    app::AppState,
    error::{validate_request, ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use churchflow_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::ChurchContext,
    },
    models::{
        dashboard::month_start,
        donation::{
            Donation, DonationFilter, DonationFund, DonationInput, DonationSummary, FundInput,
        },
        ListParams, Page,
    },
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl SummaryQuery {
    /// Defaults to the current month so far
    pub fn range(&self, now: DateTime<Utc>) -> ApiResult<(DateTime<Utc>, DateTime<Utc>)> {
        let to = self.to.unwrap_or(now);
        let from = self.from.unwrap_or_else(|| month_start(to));
        if from >= to {
            return Err(ApiError::invalid("from", "`from` must be before `to`"));
        }
        Ok((from, to))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FundQuery {
    #[serde(default)]
    pub active_only: bool,
}

pub async fn list_donations(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Query(filter): Query<DonationFilter>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Page<Donation>>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    Ok(Json(Donation::list(&state.db, ctx.church_id, &filter, params).await?))
}

/// `GET /api/donations/summary?from=&to=`
///
/// Only COMPLETED donations are counted.
pub async fn donation_summary(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<DonationSummary>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    let (from, to) = query.range(Utc::now())?;
    Ok(Json(Donation::summary(&state.db, ctx.church_id, from, to).await?))
}

pub async fn create_donation(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Json(data): Json<DonationInput>,
) -> ApiResult<(StatusCode, Json<Donation>)> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;

    let donation = Donation::create(&state.db, ctx.church_id, data).await?;
    tracing::info!(
        church_id = %ctx.church_id,
        donation_id = %donation.id,
        amount_cents = donation.amount_cents,
        "Donation recorded"
    );
    Ok((StatusCode::CREATED, Json(donation)))
}

pub async fn get_donation(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Donation>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    let donation = Donation::find_by_id(&state.db, ctx.church_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Donation"))?;
    Ok(Json(donation))
}

pub async fn update_donation(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
    Json(data): Json<DonationInput>,
) -> ApiResult<Json<Donation>> {
    require_permission(&ctx, ResourcePermission::Write)?;
    validate_request(&data)?;

    let donation = Donation::update(&state.db, ctx.church_id, id, data)
        .await?
        .ok_or_else(|| ApiError::not_found("Donation"))?;
    Ok(Json(donation))
}

pub async fn delete_donation(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&ctx, ResourcePermission::Manage)?;
    if !Donation::delete(&state.db, ctx.church_id, id).await? {
        return Err(ApiError::not_found("Donation"));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_funds(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Query(query): Query<FundQuery>,
) -> ApiResult<Json<Vec<DonationFund>>> {
    require_permission(&ctx, ResourcePermission::Read)?;
    Ok(Json(DonationFund::list(&state.db, ctx.church_id, query.active_only).await?))
}

/// Fund names are unique per church (409 on duplicates)
pub async fn create_fund(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Json(data): Json<FundInput>,
) -> ApiResult<(StatusCode, Json<DonationFund>)> {
    require_permission(&ctx, ResourcePermission::Manage)?;
    validate_request(&data)?;
    let fund = DonationFund::create(&state.db, ctx.church_id, data).await?;
    Ok((StatusCode::CREATED, Json(fund)))
}

pub async fn update_fund(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
    Json(data): Json<FundInput>,
) -> ApiResult<Json<DonationFund>> {
    require_permission(&ctx, ResourcePermission::Manage)?;
    validate_request(&data)?;
    let fund = DonationFund::update(&state.db, ctx.church_id, id, data)
        .await?
        .ok_or_else(|| ApiError::not_found("Fund"))?;
    Ok(Json(fund))
}

/// Donations to the fund are kept with no fund
pub async fn delete_fund(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_permission(&ctx, ResourcePermission::Manage)?;
    if !DonationFund::delete(&state.db, ctx.church_id, id).await? {
        return Err(ApiError::not_found("Fund"));
    }
    Ok(StatusCode::NO_CONTENT)
}
