/// Session cookie handling
///
/// The access token is stored in an HTTP-only, `SameSite=Lax` cookie scoped
/// to `/`. `Secure` is added in production.

use crate::{app::AppState, config::Config, error::ApiResult};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use churchflow_shared::auth::jwt::{issue_token_pair, TokenPair};
use uuid::Uuid;

pub fn session_cookie(config: &Config, token: String) -> Cookie<'static> {
    Cookie::build((config.session.cookie_name.clone(), token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.session.secure)
        .build()
}

/// Expires the session cookie
pub fn clear_session(jar: CookieJar, config: &Config) -> CookieJar {
    jar.remove(Cookie::build((config.session.cookie_name.clone(), String::new())).path("/"))
}

/// Issues tokens for `user_id` in `church_id` and sets the session cookie
pub fn start_session(
    jar: CookieJar,
    state: &AppState,
    user_id: Uuid,
    church_id: Option<Uuid>,
) -> ApiResult<(CookieJar, TokenPair)> {
    let tokens = issue_token_pair(user_id, church_id, state.jwt_secret())?;
    let jar = jar.add(session_cookie(&state.config, tokens.access_token.clone()));
    Ok((jar, tokens))
}
