/// Module gate
///
/// Every feature area (members, events, donations, ...) can be switched off
/// per church. Routes of a disabled module answer 404 `module_disabled`, as
/// if they did not exist for that church.
///
/// Runs inside the session middleware, so an [`AuthContext`] is present.

use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use churchflow_shared::{
    auth::middleware::AuthContext,
    models::church::{Church, ChurchModule},
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct ModuleGate {
    db: PgPool,
    module: ChurchModule,
}

impl ModuleGate {
    pub fn new(db: PgPool, module: ChurchModule) -> Self {
        Self { db, module }
    }
}

pub async fn module_gate(
    State(gate): State<ModuleGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = request
        .extensions()
        .get::<AuthContext>()
        .copied()
        .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    let church_id = auth.church_id.ok_or(ApiError::OnboardingRequired)?;

    let church = Church::find_by_id(&gate.db, church_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Church"))?;

    if !church.has_module(gate.module) {
        tracing::debug!(church_id = %church.id, module = %gate.module, "Module disabled");
        return Err(ApiError::ModuleDisabled(gate.module));
    }

    request.extensions_mut().insert(church);
    Ok(next.run(request).await)
}
