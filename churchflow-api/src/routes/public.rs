/// Public church website
///
/// ```text
/// GET  /c/:slug                    church profile + navigation
/// GET  /c/:slug/pages/:page        one published page
/// GET  /c/:slug/events             upcoming public events
/// GET  /c/:slug/funds              active donation funds
/// GET  /c/:slug/prayer-requests    public prayer wall
/// POST /c/:slug/prayer-requests    visitor submission (rate limited)
/// ```
///
/// No session is required. A church that does not exist and a church with
/// the website module switched off look the same from outside: 404.

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
    models::{
        church::{Church, ChurchModule},
        donation::DonationFund,
        event::Event,
        prayer_request::{PrayerRequest, PublicPrayerRequest, PublicPrayerSubmission},
        web_page::{PageLink, WebPage},
    },
    website::{self, ContentBlock},
};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

const PUBLIC_EVENT_LIMIT: i64 = 20;
const PRAYER_WALL_LIMIT: i64 = 50;

/// Church fields safe to show visitors
#[derive(Debug, Serialize)]
pub struct PublicChurch {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub timezone: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub website_url: Option<String>,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub tagline: Option<String>,
    pub prayer_requests_enabled: bool,
}

impl From<Church> for PublicChurch {
    fn from(church: Church) -> Self {
        let prayer_requests_enabled = church.has_module(ChurchModule::PrayerRequests);
        Self {
            id: church.id,
            name: church.name,
            slug: church.slug,
            timezone: church.timezone,
            email: church.email,
            phone: church.phone,
            address: church.address,
            city: church.city,
            state: church.state,
            postal_code: church.postal_code,
            country: church.country,
            website_url: church.website_url,
            logo_url: church.logo_url,
            primary_color: church.primary_color,
            tagline: church.tagline,
            prayer_requests_enabled,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChurchProfile {
    pub church: PublicChurch,
    pub pages: Vec<PageLink>,
}

#[derive(Debug, Serialize)]
pub struct PublicPage {
    pub title: String,
    pub slug: String,
    pub seo_description: Option<String>,
    pub content: Vec<ContentBlock>,
    /// Filled when the page has an events block
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<Event>>,
    /// Filled when the page has a donation block
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funds: Option<Vec<DonationFund>>,
}

/// Resolves `slug` to a church that publishes a website
async fn load_site(pool: &PgPool, slug: &str) -> ApiResult<Church> {
    match Church::find_by_slug(pool, slug).await? {
        Some(church) if church.has_module(ChurchModule::Website) => Ok(church),
        _ => Err(ApiError::not_found("Church")),
    }
}

/// Prayer wall endpoints also need the prayer module
async fn load_prayer_site(pool: &PgPool, slug: &str) -> ApiResult<Church> {
    let church = load_site(pool, slug).await?;
    if !church.has_module(ChurchModule::PrayerRequests) {
        return Err(ApiError::not_found("Church"));
    }
    Ok(church)
}

pub async fn church_profile(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<ChurchProfile>> {
    let church = load_site(&state.db, &slug).await?;
    let pages = WebPage::published_links(&state.db, church.id).await?;
    Ok(Json(ChurchProfile {
        church: church.into(),
        pages,
    }))
}

pub async fn page(
    State(state): State<AppState>,
    Path((slug, page_slug)): Path<(String, String)>,
) -> ApiResult<Json<PublicPage>> {
    let church = load_site(&state.db, &slug).await?;
    let page = WebPage::find_published(&state.db, church.id, &page_slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Page"))?;

    let blocks = page.content.0;
    let events = match website::events_limit(&blocks) {
        Some(limit) => Some(Event::upcoming(&state.db, church.id, i64::from(limit), true).await?),
        None => None,
    };
    let funds = if website::has_donation_block(&blocks) {
        Some(DonationFund::list(&state.db, church.id, true).await?)
    } else {
        None
    };

    Ok(Json(PublicPage {
        title: page.title,
        slug: page.slug,
        seo_description: page.seo_description,
        content: blocks,
        events,
        funds,
    }))
}

pub async fn events(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Vec<Event>>> {
    let church = load_site(&state.db, &slug).await?;
    Ok(Json(Event::upcoming(&state.db, church.id, PUBLIC_EVENT_LIMIT, true).await?))
}

pub async fn funds(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Vec<DonationFund>>> {
    let church = load_site(&state.db, &slug).await?;
    Ok(Json(DonationFund::list(&state.db, church.id, true).await?))
}

pub async fn prayer_requests(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Vec<PublicPrayerRequest>>> {
    let church = load_prayer_site(&state.db, &slug).await?;
    Ok(Json(PrayerRequest::list_public(&state.db, church.id, PRAYER_WALL_LIMIT).await?))
}

/// Visitor submissions always start PENDING; only the public view is echoed
pub async fn submit_prayer_request(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(submission): Json<PublicPrayerSubmission>,
) -> ApiResult<(StatusCode, Json<PublicPrayerRequest>)> {
    validate_request(&submission)?;
    let church = load_prayer_site(&state.db, &slug).await?;
    let request = PrayerRequest::submit_public(&state.db, church.id, submission).await?;
    tracing::info!(church_id = %church.id, prayer_request_id = %request.id, "Public prayer request submitted");
    Ok((StatusCode::CREATED, Json(request.into())))
}
