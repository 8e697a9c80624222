/// Session authentication for Axum
///
/// The session token is a JWT access token carried either in the session
/// cookie or in an `Authorization: Bearer <token>` header. The middleware
/// validates it and stores an [`AuthContext`] in the request extensions.
///
/// Handlers then extract one of:
///
/// - [`AuthContext`]: any signed-in user, with or without a church
/// - [`ChurchContext`]: a signed-in user acting inside a church, with the
///   role loaded from `church_users`
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Router};
/// use churchflow_shared::auth::middleware::{create_session_middleware, ChurchContext};
///
/// async fn handler(ctx: ChurchContext) -> String {
///     format!("{} in {}", ctx.user_id, ctx.church_id)
/// }
///
/// # fn build(pool: sqlx::PgPool) -> Router {
/// Router::new()
///     .route("/api/members", get(handler))
///     .layer(middleware::from_fn(create_session_middleware("secret", "churchflow_session")))
///     .with_state(pool)
/// # }
/// ```

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};
use crate::models::church_user::{ChurchRole, ChurchUser};

/// Signed-in user, added to request extensions by the session middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,

    /// Active church; `None` until onboarding creates one
    pub church_id: Option<Uuid>,
}

/// Signed-in user with an active church and their role in it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChurchContext {
    pub user_id: Uuid,
    pub church_id: Uuid,
    pub role: ChurchRole,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingCredentials,

    #[error("{0}")]
    InvalidToken(String),

    /// Signed in, but no church yet
    #[error("Create a church to continue")]
    OnboardingRequired,

    /// Token names a church the user no longer belongs to
    #[error("Not a member of this church")]
    NotMember,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials | AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::OnboardingRequired | AuthError::NotMember => StatusCode::FORBIDDEN,
            AuthError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials | AuthError::InvalidToken(_) => "unauthorized",
            AuthError::OnboardingRequired => "onboarding_required",
            AuthError::NotMember => "forbidden",
            AuthError::Database(_) => "internal_error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match &self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Database error during authentication");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(serde_json::json!({
            "error": self.code(),
            "message": message,
        }));

        (self.status_code(), body).into_response()
    }
}

/// Session token from the cookie, falling back to a Bearer header
pub fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(cookie_name) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Validates the session token and adds [`AuthContext`] to the request
///
/// Returns 401 when the token is missing, malformed, expired or not an
/// access token.
pub async fn session_auth_middleware(
    secret: String,
    cookie_name: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_token(req.headers(), &cookie_name).ok_or(AuthError::MissingCredentials)?;

    let claims = validate_access_token(&token, &secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Session expired".to_string()),
        JwtError::WrongTokenType { .. } => AuthError::InvalidToken("Not an access token".to_string()),
        _ => AuthError::InvalidToken("Invalid session".to_string()),
    })?;

    req.extensions_mut().insert(AuthContext {
        user_id: claims.sub,
        church_id: claims.church_id,
    });

    Ok(next.run(req).await)
}

/// Builds the session middleware closure for `axum::middleware::from_fn`
pub fn create_session_middleware(
    secret: impl Into<String>,
    cookie_name: impl Into<String>,
) -> impl Fn(Request, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AuthError>> + Send>> + Clone {
    let secret = secret.into();
    let cookie_name = cookie_name.into();
    move |req, next| {
        let secret = secret.clone();
        let cookie_name = cookie_name.clone();
        Box::pin(session_auth_middleware(secret, cookie_name, req, next))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or(AuthError::MissingCredentials)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ChurchContext
where
    PgPool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<ChurchContext>() {
            return Ok(*ctx);
        }

        let auth = AuthContext::from_request_parts(parts, state).await?;
        let church_id = auth.church_id.ok_or(AuthError::OnboardingRequired)?;

        let pool = PgPool::from_ref(state);
        let role = ChurchUser::get_role(&pool, church_id, auth.user_id)
            .await?
            .ok_or(AuthError::NotMember)?;

        let ctx = ChurchContext {
            user_id: auth.user_id,
            church_id,
            role,
        };
        parts.extensions.insert(ctx);

        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_token_prefers_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; cf_session=cookie-token"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer header-token"));

        assert_eq!(extract_token(&headers, "cf_session").as_deref(), Some("cookie-token"));
    }

    #[test]
    fn test_extract_token_bearer_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer header-token"));
        assert_eq!(extract_token(&headers, "cf_session").as_deref(), Some("header-token"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_token(&headers, "cf_session"), None);
    }

    #[test]
    fn test_extract_token_ignores_empty_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("cf_session="));
        assert_eq!(extract_token(&headers, "cf_session"), None);
    }

    #[test]
    fn test_auth_error_codes() {
        assert_eq!(AuthError::MissingCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::MissingCredentials.code(), "unauthorized");
        assert_eq!(AuthError::OnboardingRequired.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::OnboardingRequired.code(), "onboarding_required");
        assert_eq!(AuthError::NotMember.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_auth_context_missing_is_unauthorized() {
        let (mut parts, _) = axum::http::Request::new(()).into_parts();
        let result = AuthContext::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AuthError::MissingCredentials)));
    }

    #[tokio::test]
    async fn test_auth_context_from_extensions() {
        let (mut parts, _) = axum::http::Request::new(()).into_parts();
        let ctx = AuthContext {
            user_id: Uuid::new_v4(),
            church_id: None,
        };
        parts.extensions.insert(ctx);

        let extracted = AuthContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(extracted, ctx);
    }
}
