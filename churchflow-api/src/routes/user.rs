/// Account endpoints for the signed-in user
///
/// - `GET /api/user/profile`
/// - `PUT /api/user/profile`
/// - `PUT /api/user/password`

use crate::{
    app::AppState,
    error::{validate_request, ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Json};
use churchflow_shared::{
    auth::{middleware::AuthContext, password},
    models::user::{UpdateUser, User},
};
use serde::Deserialize;
use validator::{Validate, ValidateEmail};

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<User>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(user))
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(data): Json<UpdateUser>,
) -> ApiResult<Json<User>> {
    if let Some(email) = &data.email {
        if !email.validate_email() {
            return Err(ApiError::invalid("email", "Invalid email format"));
        }
    }

    if data.is_empty() {
        return get_profile(State(state), auth).await;
    }

    let user = User::update(&state.db, auth.user_id, data)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(user))
}

/// Requires the current password; the session stays valid
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    validate_request(&req)?;
    password::validate_password_strength(&req.new_password)
        .map_err(|message| ApiError::invalid("new_password", message))?;

    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    if !password::verify_password(&req.current_password, &user.password_hash)? {
        return Err(ApiError::invalid("current_password", "Current password is incorrect"));
    }

    let hash = password::hash_password(&req.new_password)?;
    User::update_password(&state.db, user.id, &hash).await?;

    tracing::info!(user_id = %user.id, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}
