/// Church settings and church users
///
/// - `GET    /api/church`: current church (any member)
/// - `PUT    /api/church`: settings, branding and modules (ADMIN+)
/// - `GET    /api/church/users`: accounts with access (ADMIN+)
/// - `PUT    /api/church/users/:user_id`: change a role (ADMIN+, OWNER for owners)
/// - `DELETE /api/church/users/:user_id`: revoke access

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use churchflow_shared::{
    auth::{
        authorization::{require_permission, require_role_change, ResourcePermission},
        middleware::ChurchContext,
    },
    models::{
        church::{overlong_field, Church, UpdateChurch},
        church_user::{ChurchRole, ChurchUser, ChurchUserDetail},
    },
    onboarding::MAX_NAME_LENGTH,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::{ValidateEmail, ValidateUrl};

#[derive(Debug, Deserialize)]
pub struct RoleChange {
    pub role: ChurchRole,
}

fn is_hex_color(value: &str) -> bool {
    let Some(hex) = value.strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// Field checks for a settings update
pub fn validate_settings(data: &UpdateChurch) -> Result<(), Vec<ValidationErrorDetail>> {
    let mut errors = Vec::new();

    let name = data.name.trim();
    if name.is_empty() {
        errors.push(ValidationErrorDetail::new("name", "Church name is required"));
    } else if name.chars().count() > MAX_NAME_LENGTH {
        errors.push(ValidationErrorDetail::new(
            "name",
            format!("Church name must be at most {} characters", MAX_NAME_LENGTH),
        ));
    }

    if data.timezone.trim().is_empty() {
        errors.push(ValidationErrorDetail::new("timezone", "Timezone is required"));
    }

    if let Some(email) = data.email.as_deref().filter(|e| !e.is_empty()) {
        if !email.validate_email() {
            errors.push(ValidationErrorDetail::new("email", "Invalid email address"));
        }
    }

    for (field, value) in [("website_url", &data.website_url), ("logo_url", &data.logo_url)] {
        if let Some(url) = value.as_deref().filter(|u| !u.is_empty()) {
            if !url.validate_url() {
                errors.push(ValidationErrorDetail::new(field, "Invalid URL"));
            }
        }
    }

    if let Some(color) = data.primary_color.as_deref().filter(|c| !c.is_empty()) {
        if !is_hex_color(color) {
            errors.push(ValidationErrorDetail::new(
                "primary_color",
                "Colour must look like #1a2b3c",
            ));
        }
    }

    if let Some((field, max)) = overlong_field([
        ("timezone", Some(data.timezone.as_str())),
        ("email", data.email.as_deref()),
        ("phone", data.phone.as_deref()),
        ("address", data.address.as_deref()),
        ("city", data.city.as_deref()),
        ("state", data.state.as_deref()),
        ("postal_code", data.postal_code.as_deref()),
        ("country", data.country.as_deref()),
        ("website_url", data.website_url.as_deref()),
        ("logo_url", data.logo_url.as_deref()),
        ("tagline", data.tagline.as_deref()),
    ]) {
        errors.push(ValidationErrorDetail::new(
            field,
            format!("Must be at most {} characters", max),
        ));
    }

    if matches!(&data.enabled_modules, Some(modules) if modules.is_empty()) {
        errors.push(ValidationErrorDetail::new("enabled_modules", "Select at least one module"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub async fn get_church(
    State(state): State<AppState>,
    ctx: ChurchContext,
) -> ApiResult<Json<Church>> {
    let church = Church::find_by_id(&state.db, ctx.church_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Church"))?;
    Ok(Json(church))
}

pub async fn update_church(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Json(data): Json<UpdateChurch>,
) -> ApiResult<Json<Church>> {
    require_permission(&ctx, ResourcePermission::Manage)?;
    validate_settings(&data).map_err(ApiError::ValidationError)?;

    let church = Church::update(&state.db, ctx.church_id, data)
        .await?
        .ok_or_else(|| ApiError::not_found("Church"))?;

    tracing::info!(church_id = %church.id, modules = ?church.enabled_modules, "Church settings updated");
    Ok(Json(church))
}

pub async fn list_church_users(
    State(state): State<AppState>,
    ctx: ChurchContext,
) -> ApiResult<Json<Vec<ChurchUserDetail>>> {
    require_permission(&ctx, ResourcePermission::Manage)?;
    Ok(Json(ChurchUser::list_by_church(&state.db, ctx.church_id).await?))
}

pub async fn change_user_role(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(user_id): Path<Uuid>,
    Json(change): Json<RoleChange>,
) -> ApiResult<Json<ChurchUser>> {
    require_role_change(&state.db, &ctx, user_id, Some(change.role)).await?;

    let updated = ChurchUser::update_role(&state.db, ctx.church_id, user_id, change.role)
        .await?
        .ok_or_else(|| ApiError::not_found("Church user"))?;

    tracing::info!(church_id = %ctx.church_id, user_id = %user_id, role = change.role.as_str(), "Role changed");
    Ok(Json(updated))
}

pub async fn remove_church_user(
    State(state): State<AppState>,
    ctx: ChurchContext,
    Path(user_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_role_change(&state.db, &ctx, user_id, None).await?;

    if !ChurchUser::remove(&state.db, ctx.church_id, user_id).await? {
        return Err(ApiError::not_found("Church user"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use churchflow_shared::models::church::ChurchModule;

    fn settings() -> UpdateChurch {
        UpdateChurch {
            name: "Grace".to_string(),
            timezone: "America/Chicago".to_string(),
            email: Some("office@grace.org".to_string()),
            phone: None,
            address: None,
            city: None,
            state: None,
            postal_code: None,
            country: None,
            website_url: Some("https://grace.org".to_string()),
            logo_url: None,
            primary_color: Some("#336699".to_string()),
            tagline: None,
            enabled_modules: Some(vec![ChurchModule::Members]),
        }
    }

    #[test]
    fn test_valid_settings() {
        assert!(validate_settings(&settings()).is_ok());
    }

    #[test]
    fn test_invalid_settings_report_each_field() {
        let mut data = settings();
        data.name = "  ".to_string();
        data.email = Some("not-an-email".to_string());
        data.primary_color = Some("blue".to_string());
        data.enabled_modules = Some(vec![]);

        let fields: Vec<String> = validate_settings(&data)
            .unwrap_err()
            .into_iter()
            .map(|d| d.field)
            .collect();
        assert_eq!(fields, vec!["name", "email", "primary_color", "enabled_modules"]);
    }

    #[test]
    fn test_settings_wider_than_columns_rejected() {
        let mut data = settings();
        data.postal_code = Some("6".repeat(21));

        let details = validate_settings(&data).unwrap_err();
        assert_eq!(
            details,
            vec![ValidationErrorDetail::new("postal_code", "Must be at most 20 characters")]
        );
    }

    #[test]
    fn test_hex_color() {
        assert!(is_hex_color("#abc"));
        assert!(is_hex_color("#A1B2C3"));
        assert!(!is_hex_color("A1B2C3"));
        assert!(!is_hex_color("#12345"));
    }
}
