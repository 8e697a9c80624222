/// Onboarding endpoints
///
/// - `POST /api/onboarding/validate`: check one wizard step
/// - `POST /api/onboarding`: validate everything and create the church
///
/// Both require a session but not a church.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    session::start_session,
};
use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use churchflow_shared::{
    auth::middleware::AuthContext,
    models::{church::Church, church_user::ChurchRole},
    onboarding::{OnboardingForm, OnboardingWizard, StepResult, StepSubmission},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct OnboardingResponse {
    pub church: Church,
    pub role: ChurchRole,
    pub access_token: String,
    pub refresh_token: String,
}

/// `POST /api/onboarding/validate`
///
/// Returns 422 with the offending field when the step does not validate,
/// so the client stays on that step.
pub async fn validate_step(
    _auth: AuthContext,
    Json(submission): Json<StepSubmission>,
) -> ApiResult<Json<StepResult>> {
    let wizard = OnboardingWizard::new(submission.form);
    Ok(Json(wizard.check_step(submission.step)?))
}

/// `POST /api/onboarding`
///
/// Creates the church with the caller as OWNER and re-issues the session
/// with the new church.
pub async fn complete(
    State(state): State<AppState>,
    auth: AuthContext,
    jar: CookieJar,
    Json(form): Json<OnboardingForm>,
) -> ApiResult<(StatusCode, CookieJar, Json<OnboardingResponse>)> {
    if auth.church_id.is_some() {
        return Err(ApiError::Conflict("Onboarding already completed".to_string()));
    }

    let data = OnboardingWizard::new(form).finish()?;
    let church = Church::create_with_owner(&state.db, data, auth.user_id).await?;

    tracing::info!(church_id = %church.id, slug = %church.slug, user_id = %auth.user_id, "Church created");

    let (jar, tokens) = start_session(jar, &state, auth.user_id, Some(church.id))?;

    Ok((
        StatusCode::CREATED,
        jar,
        Json(OnboardingResponse {
            church,
            role: ChurchRole::Owner,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }),
    ))
}
