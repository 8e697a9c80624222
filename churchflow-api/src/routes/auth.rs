/// Authentication endpoints
///
/// - `POST /api/auth/register`: create an account and start a session
/// - `POST /api/auth/login`: verify credentials and start a session
/// - `POST /api/auth/logout`: clear the session cookie
/// - `POST /api/auth/refresh`: exchange a refresh token for a new session
/// - `GET  /api/auth/session`: current user, church and role
///
/// A fresh account has no church; its session carries no `church_id` and
/// church routes answer 403 `onboarding_required` until onboarding completes.

use crate::{
    app::AppState,
    error::{validate_request, ApiError, ApiResult},
    session::{clear_session, session_cookie, start_session},
};
use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use churchflow_shared::{
    auth::{jwt, middleware::AuthContext, password},
    models::{
        church::Church,
        church_user::{ChurchRole, ChurchUser},
        non_blank,
        user::{CreateUser, User},
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// Body returned when a session starts
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub church_id: Option<Uuid>,
    pub role: Option<ChurchRole>,
    pub onboarding_required: bool,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub church: Option<Church>,
    pub role: Option<ChurchRole>,
    pub onboarding_required: bool,
}

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// `POST /api/auth/register`
///
/// # Errors
///
/// - 422: invalid email or weak password
/// - 409: email already registered
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, CookieJar, Json<AuthResponse>)> {
    validate_request(&req)?;
    password::validate_password_strength(&req.password)
        .map_err(|message| ApiError::invalid("password", message))?;

    if User::find_by_email(&state.db, &req.email).await?.is_some() {
        return Err(ApiError::Conflict("Email already exists".to_string()));
    }

    let password_hash = password::hash_password(&req.password)?;
    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email,
            password_hash,
            name: non_blank(req.name),
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "User registered");

    let (jar, tokens) = start_session(jar, &state, user.id, None)?;

    Ok((
        StatusCode::CREATED,
        jar,
        Json(AuthResponse {
            user,
            church_id: None,
            role: None,
            onboarding_required: true,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.expires_at,
        }),
    ))
}

/// `POST /api/auth/login`
///
/// The session opens in the first church the user joined.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<AuthResponse>)> {
    validate_request(&req)?;

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Password mismatch");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let membership = ChurchUser::first_for_user(&state.db, user.id).await?;
    User::update_last_login(&state.db, user.id).await?;

    let church_id = membership.as_ref().map(|m| m.church_id);
    let (jar, tokens) = start_session(jar, &state, user.id, church_id)?;

    tracing::info!(user_id = %user.id, church_id = ?church_id, "User logged in");

    Ok((
        jar,
        Json(AuthResponse {
            user,
            church_id,
            role: membership.map(|m| m.role),
            onboarding_required: church_id.is_none(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.expires_at,
        }),
    ))
}

/// `POST /api/auth/logout`
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (StatusCode, CookieJar) {
    (StatusCode::NO_CONTENT, clear_session(jar, &state.config))
}

/// `POST /api/auth/refresh`
///
/// Also replaces the session cookie with the new access token.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<(CookieJar, Json<RefreshResponse>)> {
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;
    let jar = jar.add(session_cookie(&state.config, access_token.clone()));

    Ok((jar, Json(RefreshResponse { access_token })))
}

/// `GET /api/auth/session`
pub async fn session(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<SessionResponse>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

    let (church, role) = match auth.church_id {
        Some(church_id) => {
            let role = ChurchUser::get_role(&state.db, church_id, user.id).await?;
            let church = match role {
                Some(_) => Church::find_by_id(&state.db, church_id).await?,
                None => None,
            };
            (church, role)
        }
        None => (None, None),
    };

    Ok(Json(SessionResponse {
        onboarding_required: church.is_none(),
        user,
        church,
        role,
    }))
}
