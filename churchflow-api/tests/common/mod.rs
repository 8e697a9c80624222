//! Common test utilities for integration tests
//!
//! Database-backed tests read `TEST_DATABASE_URL` (falling back to
//! `DATABASE_URL`), run the migrations and create a fresh church with an
//! OWNER per context, so tests never see each other's rows. With neither
//! variable set those helpers return `None` and the test returns early.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use churchflow_api::{
    app::{build_router, AppState},
    config::Config,
};
use churchflow_shared::{
    auth::{jwt::issue_token_pair, password::hash_password},
    db::{
        migrations::run_migrations,
        pool::{create_lazy_pool, create_pool, DatabaseConfig},
    },
    models::{
        church::{Church, ChurchModule, CreateChurch},
        user::{CreateUser, User},
    },
};
use serde_json::Value;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "Sunday-Service-2025";

/// Never dialled; backs the lazy pool of [`offline_app`]
pub const OFFLINE_DATABASE_URL: &str = "postgres://churchflow@127.0.0.1:1/offline";

pub fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!("skipping: TEST_DATABASE_URL / DATABASE_URL not set");
            None
        }
    }
}

/// Router over a pool that never connects; for routes that fail before
/// touching the database
pub fn offline_app() -> Router {
    let config = Config::for_tests(OFFLINE_DATABASE_URL);
    let pool = create_lazy_pool(&DatabaseConfig::from_url(config.database.url.clone()))
        .expect("lazy pool");
    build_router(AppState::new(pool, config))
}

/// Router over a migrated database with no church or user set up
pub async fn offline_app_with_db() -> anyhow::Result<Option<Router>> {
    let Some(url) = database_url() else {
        return Ok(None);
    };
    let config = Config::for_tests(url);
    let db = create_pool(DatabaseConfig::from_url(config.database.url.clone())).await?;
    run_migrations(&db).await?;
    Ok(Some(build_router(AppState::new(db, config))))
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub app: Router,
    pub config: Config,
    pub church: Church,
    pub user: User,
    pub token: String,
}

impl TestContext {
    /// Church with every module enabled
    pub async fn new() -> anyhow::Result<Option<Self>> {
        Self::with_modules(ChurchModule::ALL.to_vec()).await
    }

    pub async fn with_modules(modules: Vec<ChurchModule>) -> anyhow::Result<Option<Self>> {
        let Some(url) = database_url() else {
            return Ok(None);
        };
        let config = Config::for_tests(url);
        let db = create_pool(DatabaseConfig::from_url(config.database.url.clone())).await?;
        run_migrations(&db).await?;

        let user = create_user(&db).await?;
        let church = Church::create_with_owner(
            &db,
            CreateChurch {
                name: format!("Grace Test {}", Uuid::new_v4()),
                timezone: "America/Chicago".to_string(),
                email: None,
                phone: None,
                address: None,
                city: None,
                state: None,
                postal_code: None,
                country: None,
                website_url: None,
                enabled_modules: modules,
            },
            user.id,
        )
        .await?;

        let token = issue_token_pair(user.id, Some(church.id), &config.jwt.secret)?.access_token;
        let app = build_router(AppState::new(db.clone(), config.clone()));

        Ok(Some(Self {
            db,
            app,
            config,
            church,
            user,
            token,
        }))
    }

    /// Authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        send(&self.app, "GET", uri, Some(&self.auth_header()), None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        send(&self.app, "POST", uri, Some(&self.auth_header()), Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        send(&self.app, "PUT", uri, Some(&self.auth_header()), Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        send(&self.app, "DELETE", uri, Some(&self.auth_header()), None).await
    }

    /// Deletes the church; tenant rows cascade
    pub async fn cleanup(&self) -> anyhow::Result<()> {
        Church::delete(&self.db, self.church.id).await?;
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(self.user.id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

pub async fn create_user(db: &PgPool) -> anyhow::Result<User> {
    let user = User::create(
        db,
        CreateUser {
            email: format!("test-{}@example.com", Uuid::new_v4()),
            password_hash: hash_password(TEST_PASSWORD)?,
            name: Some("Test User".to_string()),
        },
    )
    .await?;
    Ok(user)
}

/// Sends one request and decodes the JSON body (`Value::Null` when empty)
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
