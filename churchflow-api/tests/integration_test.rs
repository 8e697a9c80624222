/// Integration tests for the ChurchFlow API
///
/// The first group runs against a lazily connected pool and covers routes
/// that answer before any query. The rest need PostgreSQL and return early
/// when no database is configured:
///
/// ```bash
/// TEST_DATABASE_URL=postgres://... cargo test -p churchflow-api
/// ```

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use churchflow_shared::models::church::{
    Church, ChurchModule, SubscriptionStatus, SubscriptionTier,
};
use common::{send, TestContext, TEST_PASSWORD};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_protected_routes_need_a_session() {
    let app = common::offline_app();
    for uri in ["/api/members", "/api/dashboard", "/api/church", "/api/auth/session"] {
        let (status, body) = send(&app, "GET", uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["error"], "unauthorized");
    }
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let app = common::offline_app();
    let (status, _) = send(&app, "GET", "/api/events", Some("Bearer not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_pwa_assets_are_public() {
    let app = common::offline_app();
    let (status, manifest) = send(&app, "GET", "/manifest.webmanifest", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(manifest["name"], "ChurchFlow");

    let (status, _) = send(&app, "GET", "/sw.js", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_register_onboard_and_add_member() {
    let Some(app) = common::offline_app_with_db().await.unwrap() else {
        return;
    };
    let email = format!("pastor-{}@example.com", Uuid::new_v4());

    let (status, registered) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "email": email, "password": TEST_PASSWORD, "name": "Pastor Sam" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{registered}");
    assert_eq!(registered["onboarding_required"], true);
    let token = format!("Bearer {}", registered["access_token"].as_str().unwrap());

    // no church yet
    let (status, body) = send(&app, "GET", "/api/members", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "onboarding_required");

    let (status, step) = send(
        &app,
        "POST",
        "/api/onboarding/validate",
        Some(&token),
        Some(json!({ "step": 1, "name": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(step["details"][0]["field"], "name");

    let (status, step) = send(
        &app,
        "POST",
        "/api/onboarding/validate",
        Some(&token),
        Some(json!({ "step": 1, "name": "Grace Fellowship" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(step["next_step"], 2);

    let (status, onboarded) = send(
        &app,
        "POST",
        "/api/onboarding",
        Some(&token),
        Some(json!({ "name": "Grace Fellowship", "timezone": "America/Chicago" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{onboarded}");
    assert_eq!(onboarded["role"], "OWNER");
    let church_id = onboarded["church"]["id"].as_str().unwrap().to_string();
    let token = format!("Bearer {}", onboarded["access_token"].as_str().unwrap());

    let (status, member) = send(
        &app,
        "POST",
        "/api/members",
        Some(&token),
        Some(json!({ "first_name": "Ruth", "last_name": "Moabite", "email": "Ruth@Example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{member}");
    assert_eq!(member["email"], "ruth@example.com");

    // same email again updates instead of duplicating
    let (status, _) = send(
        &app,
        "POST",
        "/api/members",
        Some(&token),
        Some(json!({ "first_name": "Ruth", "last_name": "Boaz", "email": "ruth@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, page) = send(&app, "GET", "/api/members?q=ruth", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["last_name"], "Boaz");

    let (status, session) = send(&app, "GET", "/api/auth/session", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["church"]["id"], church_id.as_str());
    assert_eq!(session["onboarding_required"], false);
}

#[tokio::test]
async fn test_disabled_module_returns_404() {
    let Some(ctx) = TestContext::with_modules(vec![ChurchModule::Members, ChurchModule::Events])
        .await
        .unwrap()
    else {
        return;
    };

    let (status, _) = ctx.get("/api/members").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = ctx.get("/api/donations").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "module_disabled");

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_tenants_cannot_see_each_other() {
    let Some(a) = TestContext::new().await.unwrap() else {
        return;
    };
    let Some(b) = TestContext::new().await.unwrap() else {
        return;
    };

    let (status, member) = a
        .post("/api/members", json!({ "first_name": "Lydia", "last_name": "Thyatira" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = member["id"].as_str().unwrap();

    let (status, _) = b.get(&format!("/api/members/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = b.delete(&format!("/api/members/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, page) = b.get("/api/members").await;
    assert_eq!(page["total"], 0);

    let (status, _) = a.get(&format!("/api/members/{id}")).await;
    assert_eq!(status, StatusCode::OK);

    a.cleanup().await.unwrap();
    b.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_checkin_replay_is_idempotent() {
    let Some(ctx) = TestContext::new().await.unwrap() else {
        return;
    };

    let (_, event) = ctx
        .post(
            "/api/events",
            json!({
                "title": "Sunday Worship",
                "starts_at": Utc::now() + Duration::hours(1),
                "check_in_enabled": true
            }),
        )
        .await;
    let (_, member) = ctx
        .post("/api/members", json!({ "first_name": "Timothy", "last_name": "Lystra" }))
        .await;

    let body = json!({ "event_id": event["id"], "member_id": member["id"] });
    let (first, created) = ctx.post("/api/checkin", body.clone()).await;
    let (second, replayed) = ctx.post("/api/checkin", body).await;
    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(created["id"], replayed["id"]);

    let (_, checkins) = ctx
        .get(&format!("/api/events/{}/checkins", event["id"].as_str().unwrap()))
        .await;
    assert_eq!(checkins.as_array().map(Vec::len), Some(1));

    let attendance = json!({
        "member_id": member["id"],
        "service_date": Utc::now().date_naive(),
        "service_name": "Sunday 9am"
    });
    let (first, _) = ctx.post("/api/attendance", attendance.clone()).await;
    let (second, _) = ctx.post("/api/attendance", attendance).await;
    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::OK);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_sent_communication_is_locked() {
    let Some(ctx) = TestContext::new().await.unwrap() else {
        return;
    };

    let draft = json!({ "channel": "EMAIL", "subject": "Picnic", "body": "Bring a dish" });
    let (status, created) = ctx.post("/api/communications", draft.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["status"], "DRAFT");
    let id = created["id"].as_str().unwrap();

    let (status, queued) = ctx.post(&format!("/api/communications/{id}/send"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queued["status"], "SENDING");

    let (status, _) = ctx.put(&format!("/api/communications/{id}"), draft).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, stats) = ctx.get("/api/communications/stats").await;
    assert_eq!(stats["sending"], 1);
    assert_eq!(stats["sent"], 0);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_page_limit_on_free_tier() {
    let Some(ctx) = TestContext::new().await.unwrap() else {
        return;
    };
    Church::update_subscription(
        &ctx.db,
        ctx.church.id,
        SubscriptionTier::Free,
        SubscriptionStatus::Active,
    )
    .await
    .unwrap();

    for n in 0..3 {
        let (status, _) = ctx
            .post("/api/website/pages", json!({ "title": format!("Page {n}") }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = ctx.post("/api/website/pages", json!({ "title": "One too many" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "plan_limit_exceeded");

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
async fn test_public_prayer_wall() {
    let Some(ctx) = TestContext::new().await.unwrap() else {
        return;
    };
    let slug = ctx.church.slug.clone();

    let (status, submitted) = send(
        &ctx.app,
        "POST",
        &format!("/c/{slug}/prayer-requests"),
        None,
        Some(json!({
            "name": "Anna",
            "title": "Healing",
            "body": "Please pray for my mother",
            "is_public": true,
            "is_anonymous": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{submitted}");
    assert_eq!(submitted["status"], "PENDING");
    assert!(submitted["requester_name"].is_null());

    let (status, wall) = send(&ctx.app, "GET", &format!("/c/{slug}/prayer-requests"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(wall.as_array().map(Vec::len), Some(1));

    let (status, _) = send(&ctx.app, "GET", "/c/no-such-church", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}
