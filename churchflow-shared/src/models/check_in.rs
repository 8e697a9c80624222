/// Event check-ins
///
/// One row per `(event_id, member_id)`. Recording a check-in twice returns the
/// original row, which makes offline replays from the service worker safe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CheckIn {
    pub id: Uuid,
    pub church_id: Uuid,
    pub event_id: Uuid,
    pub member_id: Uuid,
    pub checked_in_by: Option<Uuid>,
    pub checked_in_at: DateTime<Utc>,
}

/// Check-in joined with the member's name, for the event roster
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CheckInDetail {
    pub id: Uuid,
    pub member_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub checked_in_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CreateCheckIn {
    pub event_id: Uuid,
    pub member_id: Uuid,
    /// Client time of the scan; offline replays carry the original moment
    pub checked_in_at: Option<DateTime<Utc>>,
}

/// Outcome of `CheckIn::record`
#[derive(Debug, Clone)]
pub enum CheckInOutcome {
    Created(CheckIn),
    AlreadyCheckedIn(CheckIn),
    EventNotFound,
    CheckInDisabled,
    MemberNotFound,
}

impl CheckIn {
    /// Records a check-in unless one exists for the same event and member
    ///
    /// The event must belong to `church_id` and have `check_in_enabled`; the
    /// member must belong to `church_id`.
    pub async fn record(
        pool: &PgPool,
        church_id: Uuid,
        data: CreateCheckIn,
        recorded_by: Option<Uuid>,
    ) -> Result<CheckInOutcome, sqlx::Error> {
        let event: Option<(bool,)> =
            sqlx::query_as("SELECT check_in_enabled FROM events WHERE church_id = $1 AND id = $2")
                .bind(church_id)
                .bind(data.event_id)
                .fetch_optional(pool)
                .await?;

        match event {
            None => return Ok(CheckInOutcome::EventNotFound),
            Some((false,)) => return Ok(CheckInOutcome::CheckInDisabled),
            Some((true,)) => {}
        }

        if !super::member::Member::exists(pool, church_id, data.member_id).await? {
            return Ok(CheckInOutcome::MemberNotFound);
        }

        let inserted = sqlx::query_as::<_, CheckIn>(
            r#"
            INSERT INTO check_ins (church_id, event_id, member_id, checked_in_by, checked_in_at)
            VALUES ($1, $2, $3, $4, COALESCE($5, NOW()))
            ON CONFLICT (event_id, member_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(data.event_id)
        .bind(data.member_id)
        .bind(recorded_by)
        .bind(data.checked_in_at)
        .fetch_optional(pool)
        .await?;

        if let Some(check_in) = inserted {
            return Ok(CheckInOutcome::Created(check_in));
        }

        let existing = sqlx::query_as::<_, CheckIn>(
            "SELECT * FROM check_ins WHERE church_id = $1 AND event_id = $2 AND member_id = $3",
        )
        .bind(church_id)
        .bind(data.event_id)
        .bind(data.member_id)
        .fetch_one(pool)
        .await?;

        Ok(CheckInOutcome::AlreadyCheckedIn(existing))
    }

    pub async fn list_for_event(
        pool: &PgPool,
        church_id: Uuid,
        event_id: Uuid,
    ) -> Result<Vec<CheckInDetail>, sqlx::Error> {
        sqlx::query_as::<_, CheckInDetail>(
            r#"
            SELECT c.id, c.member_id, m.first_name, m.last_name, c.checked_in_at
            FROM check_ins c
            JOIN members m ON m.id = c.member_id
            WHERE c.church_id = $1 AND c.event_id = $2
            ORDER BY c.checked_in_at ASC
            "#,
        )
        .bind(church_id)
        .bind(event_id)
        .fetch_all(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, church_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM check_ins WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
