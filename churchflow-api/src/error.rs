/// Error handling for the API server
///
/// Every handler returns `ApiResult<T>`. Errors render as
///
/// ```json
/// { "error": "not_found", "message": "Member not found" }
/// ```
///
/// with an optional `details` array of `{ field, message }` for validation
/// failures.
///
/// # Example
///
/// ```no_run
/// use churchflow_api::error::{ApiError, ApiResult};
/// use axum::Json;
///
/// async fn handler() -> ApiResult<Json<serde_json::Value>> {
///     Err(ApiError::NotFound("Event not found".to_string()))
/// }
/// ```

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use churchflow_shared::{
    auth::{authorization::AuthzError, jwt::JwtError, middleware::AuthError, password::PasswordError},
    models::{
        church::ChurchModule,
        communication::CommunicationWriteError,
        donation::DonationReferenceError,
    },
    onboarding::OnboardingError,
    plan_limits::PlanLimitError,
    website::BlockError,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{Validate, ValidationErrors};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    /// 400
    BadRequest(String),

    /// 401
    Unauthorized(String),

    /// 403
    Forbidden(String),

    /// 403, signed in without a church
    OnboardingRequired,

    /// 403, subscription tier limit reached
    PlanLimitExceeded(String),

    /// 404
    NotFound(String),

    /// 404, module switched off for this church
    ModuleDisabled(ChurchModule),

    /// 409
    Conflict(String),

    /// 422
    ValidationError(Vec<ValidationErrorDetail>),

    /// 429
    RateLimitExceeded { retry_after: u64, message: String },

    /// 500; the message is logged, never returned
    InternalError(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// Single-field validation failure
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail::new(field, message)])
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::OnboardingRequired => write!(f, "Onboarding required"),
            ApiError::PlanLimitExceeded(msg) => write!(f, "Plan limit exceeded: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::ModuleDisabled(module) => write!(f, "Module disabled: {}", module),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::RateLimitExceeded { message, .. } => write!(f, "Rate limit exceeded: {}", message),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::RateLimitExceeded { retry_after, message } = &self {
            let body = Json(ErrorResponse {
                error: "rate_limit_exceeded".to_string(),
                message: message.clone(),
                details: None,
            });

            let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
            return response;
        }

        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::OnboardingRequired => (
                StatusCode::FORBIDDEN,
                "onboarding_required",
                "Create a church to continue".to_string(),
                None,
            ),
            ApiError::PlanLimitExceeded(msg) => {
                (StatusCode::FORBIDDEN, "plan_limit_exceeded", msg, None)
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::ModuleDisabled(module) => (
                StatusCode::NOT_FOUND,
                "module_disabled",
                format!("The {} module is not enabled for this church", module),
                None,
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::RateLimitExceeded { message, .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded", message, None)
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Runs `validator` checks and maps failures to a 422
pub fn validate_request<T: Validate>(value: &T) -> ApiResult<()> {
    value.validate().map_err(ApiError::from)
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                let field = if field == "__all__" {
                    "body".to_string()
                } else {
                    field.to_string()
                };
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.clone(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", error.code)),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    let constraint = db_err.constraint().unwrap_or_default();
                    let message = if constraint.contains("email") {
                        "Email already exists".to_string()
                    } else if constraint.contains("slug") {
                        "Slug already in use".to_string()
                    } else if constraint == "volunteers_role_member_key" {
                        "Member already serves in this role".to_string()
                    } else if constraint.contains("name") {
                        "Name already in use".to_string()
                    } else {
                        "Record already exists".to_string()
                    };
                    return ApiError::Conflict(message);
                }

                if db_err.is_foreign_key_violation() {
                    return ApiError::BadRequest("Referenced record does not exist".to_string());
                }

                // string_data_right_truncation
                if db_err.code().as_deref() == Some("22001") {
                    return ApiError::invalid("body", "A value is longer than its field allows");
                }

                if db_err.is_check_violation() {
                    return ApiError::BadRequest(format!(
                        "Constraint violation: {}",
                        db_err.constraint().unwrap_or("check")
                    ));
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::Unauthorized("Authentication required".to_string()),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
            AuthError::OnboardingRequired => ApiError::OnboardingRequired,
            AuthError::NotMember => ApiError::Forbidden("Not a member of this church".to_string()),
            AuthError::Database(err) => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotMember(_) => ApiError::Forbidden("Not a member of this church".to_string()),
            AuthzError::InsufficientRole { .. } => {
                ApiError::Forbidden("Insufficient permissions".to_string())
            }
            AuthzError::LastOwner => ApiError::Conflict(err.to_string()),
            AuthzError::DatabaseError(err) => {
                ApiError::InternalError(format!("Database error: {}", err))
            }
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => ApiError::InternalError(format!("Token creation failed: {}", msg)),
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer { .. } => ApiError::Unauthorized("Invalid token issuer".to_string()),
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

impl From<PlanLimitError> for ApiError {
    fn from(err: PlanLimitError) -> Self {
        match err {
            PlanLimitError::LimitExceeded { .. } => ApiError::PlanLimitExceeded(err.to_string()),
            PlanLimitError::ChurchNotFound(_) => ApiError::not_found("Church"),
            PlanLimitError::DatabaseError(err) => {
                ApiError::InternalError(format!("Database error: {}", err))
            }
        }
    }
}

impl From<OnboardingError> for ApiError {
    fn from(err: OnboardingError) -> Self {
        ApiError::invalid(err.field(), err.to_string())
    }
}

impl From<BlockError> for ApiError {
    fn from(err: BlockError) -> Self {
        ApiError::invalid("content", err.to_string())
    }
}

impl From<DonationReferenceError> for ApiError {
    fn from(err: DonationReferenceError) -> Self {
        match err {
            DonationReferenceError::MemberNotFound => ApiError::invalid("member_id", "Member not found"),
            DonationReferenceError::FundNotFound => ApiError::invalid("fund_id", "Fund not found"),
            DonationReferenceError::Database(e) => ApiError::from(e),
        }
    }
}

impl From<CommunicationWriteError> for ApiError {
    fn from(err: CommunicationWriteError) -> Self {
        match err {
            CommunicationWriteError::NotFound => ApiError::not_found("Communication"),
            CommunicationWriteError::NotEditable(_) => ApiError::Conflict(err.to_string()),
            CommunicationWriteError::GroupNotFound => ApiError::invalid("group_id", "Group not found"),
            CommunicationWriteError::TemplateNotFound => {
                ApiError::invalid("template_id", "Template not found")
            }
            CommunicationWriteError::EmptyBody => ApiError::invalid("body", "Message body is required"),
            CommunicationWriteError::InvalidStatus(msg) => ApiError::invalid("status", msg),
            CommunicationWriteError::Database(e) => ApiError::from(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::not_found("Member");
        assert_eq!(err.to_string(), "Not found: Member not found");
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::OnboardingRequired, StatusCode::FORBIDDEN),
            (ApiError::PlanLimitExceeded("x".into()), StatusCode::FORBIDDEN),
            (ApiError::ModuleDisabled(ChurchModule::Donations), StatusCode::NOT_FOUND),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT),
            (ApiError::invalid("name", "required"), StatusCode::UNPROCESSABLE_ENTITY),
            (ApiError::InternalError("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = ApiError::RateLimitExceeded {
            retry_after: 12,
            message: "slow down".to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "12");
    }

    #[test]
    fn test_auth_error_mapping() {
        assert!(matches!(ApiError::from(AuthError::OnboardingRequired), ApiError::OnboardingRequired));
        assert!(matches!(ApiError::from(AuthError::MissingCredentials), ApiError::Unauthorized(_)));
    }

    #[test]
    fn test_onboarding_error_is_field_error() {
        match ApiError::from(OnboardingError::NameRequired) {
            ApiError::ValidationError(details) => {
                assert_eq!(details, vec![ValidationErrorDetail::new("name", "Church name is required")]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[derive(Debug)]
    struct TruncationError;

    impl fmt::Display for TruncationError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "value too long for type character varying(20)")
        }
    }

    impl std::error::Error for TruncationError {}

    impl sqlx::error::DatabaseError for TruncationError {
        fn message(&self) -> &str {
            "value too long for type character varying(20)"
        }

        fn code(&self) -> Option<std::borrow::Cow<'_, str>> {
            Some(std::borrow::Cow::Borrowed("22001"))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    #[test]
    fn test_overlong_value_is_client_error() {
        let err = ApiError::from(sqlx::Error::Database(Box::new(TruncationError)));
        assert!(matches!(err, ApiError::ValidationError(_)));
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_write_errors_map_through_one_conversion() {
        use churchflow_shared::models::communication::CommunicationStatus;

        assert!(matches!(
            ApiError::from(CommunicationWriteError::NotEditable(CommunicationStatus::Sent)),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(CommunicationWriteError::Database(sqlx::Error::RowNotFound)),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from(DonationReferenceError::Database(sqlx::Error::PoolTimedOut)),
            ApiError::InternalError(_)
        ));
        match ApiError::from(DonationReferenceError::FundNotFound) {
            ApiError::ValidationError(details) => assert_eq!(details[0].field, "fund_id"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 1, message = "Name is required"))]
        name: String,
        #[validate(email)]
        email: String,
    }

    #[test]
    fn test_validation_errors_mapping() {
        let sample = Sample {
            name: String::new(),
            email: "nope".to_string(),
        };

        match ApiError::from(sample.validate().unwrap_err()) {
            ApiError::ValidationError(details) => {
                assert_eq!(details.len(), 2);
                assert_eq!(details[0].field, "email");
                assert_eq!(details[1], ValidationErrorDetail::new("name", "Name is required"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
