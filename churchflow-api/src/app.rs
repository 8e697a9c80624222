/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use churchflow_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let app = build_router(AppState::new(pool, config));
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{
        modules::{module_gate, ModuleGate},
        rate_limit::{public_rate_limit_layer, RateLimiter},
        security::SecurityHeadersLayer,
    },
    routes,
};
use axum::{
    extract::FromRef,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use churchflow_shared::{
    auth::middleware::create_session_middleware, models::church::ChurchModule,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,

    /// Per-client budget for public form submissions
    pub public_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        let public_limiter = Arc::new(RateLimiter::per_minute(config.api.public_rate_limit_per_minute));
        Self {
            db,
            config: Arc::new(config),
            public_limiter,
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

/// Builds the complete router
///
/// ```text
/// /health                      public
/// /sw.js, /offline, /manifest.webmanifest
/// /c/:slug/...                 public church site (website module)
/// /api/auth/*                  register, login, logout, refresh (public)
/// /api/...                     session required; module routes gated
/// ```
pub fn build_router(state: AppState) -> Router {
    let gate = |module: ChurchModule| {
        axum::middleware::from_fn_with_state(ModuleGate::new(state.db.clone(), module), module_gate)
    };

    let public_auth = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/logout", post(routes::auth::logout))
        .route("/refresh", post(routes::auth::refresh));

    let members = Router::new()
        .route("/", get(routes::members::list_members).post(routes::members::create_member))
        .route("/search", get(routes::members::search_members))
        .route(
            "/:id",
            get(routes::members::get_member)
                .put(routes::members::update_member)
                .delete(routes::members::delete_member),
        )
        .route_layer(gate(ChurchModule::Members));

    let families = Router::new()
        .route("/", get(routes::families::list_families).post(routes::families::create_family))
        .route(
            "/:id",
            get(routes::families::get_family)
                .put(routes::families::update_family)
                .delete(routes::families::delete_family),
        )
        .route("/:id/members", get(routes::families::list_family_members))
        .route_layer(gate(ChurchModule::Members));

    let events = Router::new()
        .route("/", get(routes::events::list_events).post(routes::events::create_event))
        .route("/upcoming", get(routes::events::upcoming_events))
        .route(
            "/:id",
            get(routes::events::get_event)
                .put(routes::events::update_event)
                .delete(routes::events::delete_event),
        )
        .route("/:id/checkins", get(routes::checkin::list_event_checkins))
        .route_layer(gate(ChurchModule::Events));

    let checkin = Router::new()
        .route("/checkin", post(routes::checkin::create_checkin))
        .route("/checkin/:id", delete(routes::checkin::delete_checkin))
        .route(
            "/attendance",
            get(routes::checkin::list_attendance).post(routes::checkin::record_attendance),
        )
        .route("/attendance/:id", delete(routes::checkin::delete_attendance))
        .route_layer(gate(ChurchModule::CheckIn));

    let donations = Router::new()
        .route("/", get(routes::donations::list_donations).post(routes::donations::create_donation))
        .route("/summary", get(routes::donations::donation_summary))
        .route(
            "/:id",
            get(routes::donations::get_donation)
                .put(routes::donations::update_donation)
                .delete(routes::donations::delete_donation),
        )
        .route_layer(gate(ChurchModule::Donations));

    let funds = Router::new()
        .route("/", get(routes::donations::list_funds).post(routes::donations::create_fund))
        .route(
            "/:id",
            put(routes::donations::update_fund).delete(routes::donations::delete_fund),
        )
        .route_layer(gate(ChurchModule::Donations));

    let volunteers = Router::new()
        .route(
            "/",
            get(routes::volunteers::list_volunteers).post(routes::volunteers::assign_volunteer),
        )
        .route("/member-search", get(routes::volunteers::member_search))
        .route(
            "/roles",
            get(routes::volunteers::list_roles).post(routes::volunteers::create_role),
        )
        .route(
            "/roles/:id",
            put(routes::volunteers::update_role).delete(routes::volunteers::delete_role),
        )
        .route("/shifts/upcoming", get(routes::volunteers::upcoming_shifts))
        .route("/shifts/:id", delete(routes::volunteers::delete_shift))
        .route(
            "/:id",
            get(routes::volunteers::get_volunteer)
                .put(routes::volunteers::update_volunteer)
                .delete(routes::volunteers::remove_volunteer),
        )
        .route(
            "/:id/shifts",
            get(routes::volunteers::list_shifts).post(routes::volunteers::create_shift),
        )
        .route_layer(gate(ChurchModule::Volunteers));

    let communications = Router::new()
        .route(
            "/",
            get(routes::communications::list_communications)
                .post(routes::communications::create_communication),
        )
        .route("/stats", get(routes::communications::communication_stats))
        .route(
            "/templates",
            get(routes::communications::list_templates).post(routes::communications::create_template),
        )
        .route(
            "/templates/:id",
            get(routes::communications::get_template)
                .put(routes::communications::update_template)
                .delete(routes::communications::delete_template),
        )
        .route(
            "/:id",
            get(routes::communications::get_communication)
                .put(routes::communications::update_communication)
                .delete(routes::communications::delete_communication),
        )
        .route("/:id/send", post(routes::communications::send_communication))
        .route_layer(gate(ChurchModule::Communications));

    let groups = Router::new()
        .route("/", get(routes::groups::list_groups).post(routes::groups::create_group))
        .route(
            "/:id",
            get(routes::groups::get_group)
                .put(routes::groups::update_group)
                .delete(routes::groups::delete_group),
        )
        .route(
            "/:id/members",
            get(routes::groups::list_group_members).post(routes::groups::add_group_member),
        )
        .route("/:id/members/:member_id", delete(routes::groups::remove_group_member))
        .route_layer(gate(ChurchModule::Groups));

    let prayer_requests = Router::new()
        .route(
            "/",
            get(routes::prayer_requests::list_prayer_requests)
                .post(routes::prayer_requests::create_prayer_request),
        )
        .route(
            "/:id",
            get(routes::prayer_requests::get_prayer_request)
                .put(routes::prayer_requests::update_prayer_request)
                .delete(routes::prayer_requests::delete_prayer_request),
        )
        .route("/:id/status", put(routes::prayer_requests::set_prayer_status))
        .route_layer(gate(ChurchModule::PrayerRequests));

    let website = Router::new()
        .route("/pages", get(routes::website::list_pages).post(routes::website::create_page))
        .route(
            "/pages/:id",
            get(routes::website::get_page)
                .put(routes::website::update_page)
                .delete(routes::website::delete_page),
        )
        .route("/media", get(routes::website::list_media).post(routes::website::create_media))
        .route(
            "/media/:id",
            put(routes::website::update_media).delete(routes::website::delete_media),
        )
        .route_layer(gate(ChurchModule::Website));

    let session = Router::new()
        .route("/auth/session", get(routes::auth::session))
        .route("/onboarding/validate", post(routes::onboarding::validate_step))
        .route("/onboarding", post(routes::onboarding::complete))
        .route("/church", get(routes::church::get_church).put(routes::church::update_church))
        .route("/church/users", get(routes::church::list_church_users))
        .route(
            "/church/users/:user_id",
            put(routes::church::change_user_role).delete(routes::church::remove_church_user),
        )
        .route(
            "/user/profile",
            get(routes::user::get_profile).put(routes::user::update_profile),
        )
        .route("/user/password", put(routes::user::change_password))
        .route("/dashboard", get(routes::dashboard::dashboard))
        .nest("/members", members)
        .nest("/families", families)
        .nest("/events", events)
        .merge(checkin)
        .nest("/donations", donations)
        .nest("/funds", funds)
        .nest("/volunteers", volunteers)
        .nest("/communications", communications)
        .nest("/groups", groups)
        .nest("/prayer-requests", prayer_requests)
        .nest("/website", website)
        .layer(axum::middleware::from_fn(create_session_middleware(
            state.config.jwt.secret.clone(),
            state.config.session.cookie_name.clone(),
        )));

    let api = Router::new().nest("/auth", public_auth).merge(session);

    let public_site = Router::new()
        .route("/:slug", get(routes::public::church_profile))
        .route("/:slug/pages/:page", get(routes::public::page))
        .route("/:slug/events", get(routes::public::events))
        .route("/:slug/funds", get(routes::public::funds))
        .route(
            "/:slug/prayer-requests",
            get(routes::public::prayer_requests).merge(
                post(routes::public::submit_prayer_request).route_layer(
                    axum::middleware::from_fn_with_state(state.clone(), public_rate_limit_layer),
                ),
            ),
        );

    let pwa = Router::new()
        .route("/sw.js", get(routes::pwa::service_worker))
        .route("/offline", get(routes::pwa::offline_page))
        .route("/manifest.webmanifest", get(routes::pwa::manifest));

    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(pwa)
        .nest("/api", api)
        .nest("/c", public_site)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::{Request, StatusCode}};
    use churchflow_shared::db::pool::{create_lazy_pool, DatabaseConfig};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let config = Config::for_tests("postgresql://localhost:1/unreachable");
        let pool = create_lazy_pool(&DatabaseConfig::from_url(config.database.url.clone())).unwrap();
        AppState::new(pool, config)
    }

    async fn status_of(request: Request<Body>) -> StatusCode {
        build_router(test_state()).oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_protected_routes_require_session() {
        for uri in ["/api/members", "/api/church", "/api/dashboard", "/api/auth/session"] {
            let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
            assert_eq!(status_of(request).await, StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_pwa_routes_are_public() {
        let request = Request::builder().uri("/sw.js").body(Body::empty()).unwrap();
        assert_eq!(status_of(request).await, StatusCode::OK);

        let request = Request::builder().uri("/manifest.webmanifest").body(Body::empty()).unwrap();
        assert_eq!(status_of(request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_precache_urls_are_served() {
        for uri in churchflow_shared::offline::PRECACHE_URLS {
            let request = Request::builder().uri(*uri).body(Body::empty()).unwrap();
            assert_eq!(status_of(request).await, StatusCode::OK, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();
        assert_eq!(status_of(request).await, StatusCode::NOT_FOUND);
    }
}
