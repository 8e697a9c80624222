/// Queue and delivery tests against PostgreSQL
///
/// ```bash
/// TEST_DATABASE_URL=postgres://... cargo test -p churchflow-worker
/// ```
///
/// Without `TEST_DATABASE_URL` or `DATABASE_URL` every test returns early.
///
/// `claim_due` is not scoped to a church, so each test filters the claimed
/// rows down to the church it created.

use async_trait::async_trait;
use churchflow_shared::{
    db::{
        migrations::run_migrations,
        pool::{create_pool, DatabaseConfig},
    },
    models::communication::{Communication, CommunicationStatus},
};
use churchflow_worker::{
    config::WorkerConfig,
    dispatcher::{DispatchError, DispatchReport, DispatchResult, Dispatcher, LogDispatcher, OutboundMessage},
    orchestrator::{DeliveryOutcome, Worker, NO_RECIPIENTS},
    queue::CommunicationQueue,
};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

struct FlakyDispatcher;

#[async_trait]
impl Dispatcher for FlakyDispatcher {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn dispatch(&self, _message: &OutboundMessage) -> DispatchResult<DispatchReport> {
        Err(DispatchError::Transient("relay unavailable".to_string()))
    }
}

fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!("skipping: TEST_DATABASE_URL / DATABASE_URL not set");
            None
        }
    }
}

async fn setup() -> Option<(PgPool, WorkerConfig, Uuid)> {
    let config = WorkerConfig::for_tests(database_url()?);
    let pool = create_pool(DatabaseConfig::from_url(config.database_url.clone()))
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();

    let slug = format!("worker-test-{}", Uuid::new_v4());
    let (church_id,): (Uuid,) =
        sqlx::query_as("INSERT INTO churches (name, slug) VALUES ('Worker Test', $1) RETURNING id")
            .bind(&slug)
            .fetch_one(&pool)
            .await
            .unwrap();

    Some((pool, config, church_id))
}

fn queue_for(pool: &PgPool, config: &WorkerConfig) -> CommunicationQueue {
    CommunicationQueue::new(pool.clone(), config.lock_timeout(), config.max_attempts)
        .with_retry_backoff(config.retry_backoff())
}

async fn add_member(pool: &PgPool, church_id: Uuid, first_name: &str, email: Option<&str>) {
    sqlx::query(
        "INSERT INTO members (church_id, first_name, last_name, email, status) VALUES ($1, $2, 'Tester', $3, 'member')",
    )
    .bind(church_id)
    .bind(first_name)
    .bind(email)
    .execute(pool)
    .await
    .unwrap();
}

async fn insert_communication(pool: &PgPool, church_id: Uuid, status: &str, in_hours: Option<i64>) -> Uuid {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO communications (church_id, channel, status, subject, body, scheduled_for)
        VALUES ($1, 'email', $2::communication_status, 'Picnic', 'Bring a dish',
                CASE WHEN $3::bigint IS NULL THEN NULL ELSE NOW() + make_interval(hours => $3::int) END)
        RETURNING id
        "#,
    )
    .bind(church_id)
    .bind(status)
    .bind(in_hours)
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

async fn claim(queue: &CommunicationQueue, id: Uuid) -> Option<Communication> {
    queue
        .claim_due(1000)
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.id == id)
}

async fn cleanup(pool: &PgPool, church_id: Uuid) {
    sqlx::query("DELETE FROM churches WHERE id = $1")
        .bind(church_id)
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_claim_takes_due_rows_only() {
    let Some((pool, config, church_id)) = setup().await else {
        return;
    };
    let queue = queue_for(&pool, &config);

    let sending = insert_communication(&pool, church_id, "sending", None).await;
    let overdue = insert_communication(&pool, church_id, "scheduled", Some(-1)).await;
    let future = insert_communication(&pool, church_id, "scheduled", Some(24)).await;
    let draft = insert_communication(&pool, church_id, "draft", None).await;

    let claimed: Vec<Uuid> = queue
        .claim_due(1000)
        .await
        .unwrap()
        .into_iter()
        .filter(|c| c.church_id == church_id)
        .map(|c| c.id)
        .collect();

    assert!(claimed.contains(&sending));
    assert!(claimed.contains(&overdue));
    assert!(!claimed.contains(&future));
    assert!(!claimed.contains(&draft));

    let promoted = Communication::find_by_id(&pool, church_id, overdue).await.unwrap().unwrap();
    assert_eq!(promoted.status, CommunicationStatus::Sending);
    assert_eq!(promoted.attempts, 1);
    assert!(promoted.locked_until.is_some());

    // still locked
    assert!(claim(&queue, sending).await.is_none());

    cleanup(&pool, church_id).await;
}

#[tokio::test]
async fn test_delivery_marks_sent_with_recipient_count() {
    let Some((pool, config, church_id)) = setup().await else {
        return;
    };
    add_member(&pool, church_id, "Priscilla", Some("priscilla@example.com")).await;
    add_member(&pool, church_id, "Aquila", Some("aquila@example.com")).await;
    add_member(&pool, church_id, "Apollos", None).await;

    let queue = queue_for(&pool, &config);
    let worker = Worker::new(pool.clone(), Arc::new(LogDispatcher::new()), config);

    let id = insert_communication(&pool, church_id, "sending", None).await;
    let claimed = claim(&queue, id).await.unwrap();

    let outcome = worker.process_one(&claimed).await.unwrap();
    assert_eq!(outcome, DeliveryOutcome::Sent { delivered: 2 });

    let sent = Communication::find_by_id(&pool, church_id, id).await.unwrap().unwrap();
    assert_eq!(sent.status, CommunicationStatus::Sent);
    assert_eq!(sent.recipient_count, 2);
    assert!(sent.sent_at.is_some());
    assert!(sent.locked_until.is_none());

    cleanup(&pool, church_id).await;
}

#[tokio::test]
async fn test_no_recipients_fails_immediately() {
    let Some((pool, config, church_id)) = setup().await else {
        return;
    };
    let queue = queue_for(&pool, &config);
    let worker = Worker::new(pool.clone(), Arc::new(LogDispatcher::new()), config);

    let id = insert_communication(&pool, church_id, "sending", None).await;
    let claimed = claim(&queue, id).await.unwrap();

    assert_eq!(worker.process_one(&claimed).await.unwrap(), DeliveryOutcome::Failed);

    let failed = Communication::find_by_id(&pool, church_id, id).await.unwrap().unwrap();
    assert_eq!(failed.status, CommunicationStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some(NO_RECIPIENTS));

    cleanup(&pool, church_id).await;
}

#[tokio::test]
async fn test_transient_failure_waits_out_backoff() {
    let Some((pool, mut config, church_id)) = setup().await else {
        return;
    };
    config.retry_backoff_secs = 600;
    add_member(&pool, church_id, "Lydia", Some("lydia@example.com")).await;

    let queue = queue_for(&pool, &config);
    let worker = Worker::new(pool.clone(), Arc::new(FlakyDispatcher), config);

    let id = insert_communication(&pool, church_id, "sending", None).await;
    let first = claim(&queue, id).await.unwrap();
    assert_eq!(worker.process_one(&first).await.unwrap(), DeliveryOutcome::Retrying);

    let (waiting,): (bool,) =
        sqlx::query_as("SELECT locked_until > NOW() + INTERVAL '5 minutes' FROM communications WHERE id = $1")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(waiting);

    // a tight poll loop must not burn the remaining attempts
    for _ in 0..5 {
        assert!(claim(&queue, id).await.is_none());
    }
    let released = Communication::find_by_id(&pool, church_id, id).await.unwrap().unwrap();
    assert_eq!(released.status, CommunicationStatus::Sending);
    assert_eq!(released.attempts, 1);

    cleanup(&pool, church_id).await;
}

#[tokio::test]
async fn test_transient_failures_retry_until_attempts_run_out() {
    let Some((pool, mut config, church_id)) = setup().await else {
        return;
    };
    config.max_attempts = 2;
    config.retry_backoff_secs = 0;
    add_member(&pool, church_id, "Phoebe", Some("phoebe@example.com")).await;

    let queue = queue_for(&pool, &config);
    let worker = Worker::new(pool.clone(), Arc::new(FlakyDispatcher), config);

    let id = insert_communication(&pool, church_id, "sending", None).await;

    let first = claim(&queue, id).await.unwrap();
    assert_eq!(worker.process_one(&first).await.unwrap(), DeliveryOutcome::Retrying);

    let released = Communication::find_by_id(&pool, church_id, id).await.unwrap().unwrap();
    assert_eq!(released.status, CommunicationStatus::Sending);
    assert!(released.locked_until.is_none());

    let second = claim(&queue, id).await.unwrap();
    assert_eq!(second.attempts, 2);
    assert_eq!(worker.process_one(&second).await.unwrap(), DeliveryOutcome::Failed);

    let failed = Communication::find_by_id(&pool, church_id, id).await.unwrap().unwrap();
    assert_eq!(failed.status, CommunicationStatus::Failed);
    assert!(failed
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("relay unavailable")));

    cleanup(&pool, church_id).await;
}
