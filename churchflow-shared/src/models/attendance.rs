/// Service attendance
///
/// Unlike check-ins, attendance is not tied to an event row: it records that a
/// member attended a named service on a date. `(church_id, member_id,
/// service_date, service_name)` is unique and repeated submissions return the
/// existing row.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_SERVICE_NAME: &str = "Sunday Service";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Attendance {
    pub id: Uuid,
    pub church_id: Uuid,
    pub member_id: Uuid,
    pub service_date: NaiveDate,
    pub service_name: String,
    pub recorded_by: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AttendanceDetail {
    pub id: Uuid,
    pub member_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub service_name: String,
    pub recorded_at: DateTime<Utc>,
}

/// Headcount per service on one date
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ServiceHeadcount {
    pub service_name: String,
    pub count: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAttendance {
    pub member_id: Uuid,
    pub service_date: NaiveDate,
    #[validate(length(min = 1, max = 100))]
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

impl Attendance {
    /// Records attendance; returns the row and whether it was new
    ///
    /// `None` when the member is not in `church_id`.
    pub async fn record(
        pool: &PgPool,
        church_id: Uuid,
        data: CreateAttendance,
        recorded_by: Option<Uuid>,
    ) -> Result<Option<(Self, bool)>, sqlx::Error> {
        if !super::member::Member::exists(pool, church_id, data.member_id).await? {
            return Ok(None);
        }

        let service_name = data.service_name.trim();

        let inserted = sqlx::query_as::<_, Attendance>(
            r#"
            INSERT INTO attendance (church_id, member_id, service_date, service_name, recorded_by)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (church_id, member_id, service_date, service_name) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(data.member_id)
        .bind(data.service_date)
        .bind(service_name)
        .bind(recorded_by)
        .fetch_optional(pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(Some((row, true)));
        }

        let existing = sqlx::query_as::<_, Attendance>(
            r#"
            SELECT * FROM attendance
            WHERE church_id = $1 AND member_id = $2 AND service_date = $3 AND service_name = $4
            "#,
        )
        .bind(church_id)
        .bind(data.member_id)
        .bind(data.service_date)
        .bind(service_name)
        .fetch_one(pool)
        .await?;

        Ok(Some((existing, false)))
    }

    pub async fn list_for_date(
        pool: &PgPool,
        church_id: Uuid,
        service_date: NaiveDate,
    ) -> Result<Vec<AttendanceDetail>, sqlx::Error> {
        sqlx::query_as::<_, AttendanceDetail>(
            r#"
            SELECT a.id, a.member_id, m.first_name, m.last_name, a.service_name, a.recorded_at
            FROM attendance a
            JOIN members m ON m.id = a.member_id
            WHERE a.church_id = $1 AND a.service_date = $2
            ORDER BY a.service_name ASC, m.last_name ASC, m.first_name ASC
            "#,
        )
        .bind(church_id)
        .bind(service_date)
        .fetch_all(pool)
        .await
    }

    pub async fn headcounts(
        pool: &PgPool,
        church_id: Uuid,
        service_date: NaiveDate,
    ) -> Result<Vec<ServiceHeadcount>, sqlx::Error> {
        sqlx::query_as::<_, ServiceHeadcount>(
            r#"
            SELECT service_name, COUNT(*) AS count
            FROM attendance
            WHERE church_id = $1 AND service_date = $2
            GROUP BY service_name
            ORDER BY service_name ASC
            "#,
        )
        .bind(church_id)
        .bind(service_date)
        .fetch_all(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, church_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM attendance WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name_defaults() {
        let data: CreateAttendance = serde_json::from_value(serde_json::json!({
            "member_id": Uuid::nil(),
            "service_date": "2026-03-01"
        }))
        .unwrap();
        assert_eq!(data.service_name, DEFAULT_SERVICE_NAME);
        assert!(data.validate().is_ok());
    }

    #[test]
    fn test_blank_service_name_rejected() {
        let data = CreateAttendance {
            member_id: Uuid::nil(),
            service_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            service_name: String::new(),
        };
        assert!(data.validate().is_err());
    }
}
