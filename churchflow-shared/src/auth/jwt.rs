/// Session tokens
///
/// Sessions are HS256-signed JWTs. The access token rides in the session
/// cookie (or an `Authorization: Bearer` header); the refresh token is handed
/// to the client at login and exchanged at `/api/auth/refresh`.
///
/// `church_id` is `None` until the user finishes onboarding. After the church
/// is created the session is re-issued with the new id.
///
/// # Example
///
/// ```
/// use churchflow_shared::auth::jwt::{create_token, validate_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-secret-of-at-least-thirty-two-bytes!";
/// let user_id = Uuid::new_v4();
///
/// let claims = Claims::new(user_id, None, TokenType::Access);
/// let token = create_token(&claims, secret)?;
///
/// let validated = validate_token(&token, secret)?;
/// assert_eq!(validated.sub, user_id);
/// assert!(validated.church_id.is_none());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Value of the `iss` claim on every token this crate issues
pub const ISSUER: &str = "churchflow";

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid issuer: expected {expected}")]
    InvalidIssuer { expected: String },

    #[error("Expected {expected} token")]
    WrongTokenType { expected: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Access => Duration::hours(24),
            TokenType::Refresh => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// JWT claims
///
/// Standard `sub`/`iss`/`iat`/`exp`/`nbf` plus the active church and the
/// token type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,

    /// Active church; absent until onboarding completes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub church_id: Option<Uuid>,

    pub token_type: TokenType,
}

impl Claims {
    pub fn new(user_id: Uuid, church_id: Option<Uuid>, token_type: TokenType) -> Self {
        Self::with_expiration(user_id, church_id, token_type, token_type.default_expiration())
    }

    pub fn with_expiration(
        user_id: Uuid,
        church_id: Option<Uuid>,
        token_type: TokenType,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            church_id,
            token_type,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Access and refresh token pair returned at login
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs `claims` with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::CreateError(e.to_string()))
}

/// Issues a fresh access/refresh pair for `user_id` in `church_id`
pub fn issue_token_pair(
    user_id: Uuid,
    church_id: Option<Uuid>,
    secret: &str,
) -> Result<TokenPair, JwtError> {
    let access = Claims::new(user_id, church_id, TokenType::Access);
    let refresh = Claims::new(user_id, church_id, TokenType::Refresh);

    let expires_at = access
        .expires_at()
        .ok_or_else(|| JwtError::CreateError("expiration out of range".to_string()))?;

    Ok(TokenPair {
        access_token: create_token(&access, secret)?,
        refresh_token: create_token(&refresh, secret)?,
        expires_at,
    })
}

/// Checks signature, expiry, `nbf` and issuer, then returns the claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidIssuer => JwtError::InvalidIssuer {
                expected: ISSUER.to_string(),
            },
            _ => JwtError::ValidationError(e.to_string()),
        })
}

pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;
    if claims.token_type != TokenType::Access {
        return Err(JwtError::WrongTokenType { expected: "access" });
    }
    Ok(claims)
}

pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;
    if claims.token_type != TokenType::Refresh {
        return Err(JwtError::WrongTokenType {
            expected: "refresh",
        });
    }
    Ok(claims)
}

/// Exchanges a refresh token for a new access token with the same user and church
pub fn refresh_access_token(refresh_token: &str, secret: &str) -> Result<String, JwtError> {
    let refresh = validate_refresh_token(refresh_token, secret)?;
    let access = Claims::new(refresh.sub, refresh.church_id, TokenType::Access);
    create_token(&access, secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-that-is-long-enough-32";

    #[test]
    fn test_token_type_expiration() {
        assert_eq!(TokenType::Access.default_expiration(), Duration::hours(24));
        assert_eq!(TokenType::Refresh.default_expiration(), Duration::days(30));
    }

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let church_id = Uuid::new_v4();
        let claims = Claims::new(user_id, Some(church_id), TokenType::Access);

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.church_id, Some(church_id));
        assert_eq!(claims.iss, ISSUER);
        assert!(claims.exp > claims.iat);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_create_and_validate_token() {
        let user_id = Uuid::new_v4();
        let church_id = Uuid::new_v4();
        let token = create_token(&Claims::new(user_id, Some(church_id), TokenType::Access), SECRET)
            .unwrap();

        let claims = validate_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.church_id, Some(church_id));
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn test_token_without_church_omits_claim() {
        let claims = Claims::new(Uuid::new_v4(), None, TokenType::Access);
        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("church_id").is_none());

        let token = create_token(&claims, SECRET).unwrap();
        assert!(validate_token(&token, SECRET).unwrap().church_id.is_none());
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let token = create_token(&Claims::new(Uuid::new_v4(), None, TokenType::Access), SECRET)
            .unwrap();
        assert!(validate_token(&token, "another-secret-that-is-long-enough!!").is_err());
    }

    #[test]
    fn test_validate_expired_token() {
        let claims = Claims::with_expiration(
            Uuid::new_v4(),
            None,
            TokenType::Access,
            Duration::seconds(-10),
        );
        let token = create_token(&claims, SECRET).unwrap();

        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_validate_wrong_issuer() {
        let mut claims = Claims::new(Uuid::new_v4(), None, TokenType::Access);
        claims.iss = "someone-else".to_string();
        let token = create_token(&claims, SECRET).unwrap();

        assert!(matches!(
            validate_token(&token, SECRET),
            Err(JwtError::InvalidIssuer { .. })
        ));
    }

    #[test]
    fn test_access_and_refresh_are_not_interchangeable() {
        let pair = issue_token_pair(Uuid::new_v4(), None, SECRET).unwrap();

        assert!(validate_access_token(&pair.access_token, SECRET).is_ok());
        assert!(validate_refresh_token(&pair.refresh_token, SECRET).is_ok());
        assert!(validate_access_token(&pair.refresh_token, SECRET).is_err());
        assert!(validate_refresh_token(&pair.access_token, SECRET).is_err());
    }

    #[test]
    fn test_refresh_access_token_keeps_church() {
        let user_id = Uuid::new_v4();
        let church_id = Uuid::new_v4();
        let pair = issue_token_pair(user_id, Some(church_id), SECRET).unwrap();

        let access = refresh_access_token(&pair.refresh_token, SECRET).unwrap();
        let claims = validate_access_token(&access, SECRET).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.church_id, Some(church_id));
    }
}
