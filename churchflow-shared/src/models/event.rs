/// Events
///
/// An event is a single scheduled occurrence. Recurring events keep their
/// `recurrence_rule` exactly as entered (typically an RFC 5545 RRULE string);
/// occurrences are never expanded server-side. Upcoming listings therefore
/// include every recurring event alongside one-off events that have not ended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{non_blank, ListParams, Page};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: Uuid,
    pub church_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_recurring: bool,
    pub recurrence_rule: Option<String>,
    pub check_in_enabled: bool,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_event_times", skip_on_field_errors = false))]
pub struct EventInput {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(max = 255))]
    pub location: Option<String>,
    #[validate(length(max = 50))]
    pub category: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_recurring: bool,
    pub recurrence_rule: Option<String>,
    #[serde(default)]
    pub check_in_enabled: bool,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_public() -> bool {
    true
}

fn validate_event_times(input: &EventInput) -> Result<(), ValidationError> {
    if let Some(ends_at) = input.ends_at {
        if ends_at < input.starts_at {
            let mut error = ValidationError::new("ends_before_start");
            error.message = Some("End time must not be before start time".into());
            return Err(error);
        }
    }
    Ok(())
}

/// `GET /api/events` filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub category: Option<String>,
}

impl Event {
    pub async fn create(pool: &PgPool, church_id: Uuid, data: EventInput) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (
                church_id, title, description, location, category, starts_at, ends_at,
                is_recurring, recurrence_rule, check_in_enabled, is_public
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(data.title.trim())
        .bind(non_blank(data.description))
        .bind(non_blank(data.location))
        .bind(non_blank(data.category))
        .bind(data.starts_at)
        .bind(data.ends_at)
        .bind(data.is_recurring)
        .bind(&data.recurrence_rule)
        .bind(data.check_in_enabled)
        .bind(data.is_public)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        church_id: Uuid,
        filter: &EventFilter,
        params: ListParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, church_id: Uuid, filter: &EventFilter) {
            builder.push(" WHERE church_id = ").push_bind(church_id);
            if let Some(from) = filter.from {
                builder.push(" AND starts_at >= ").push_bind(from);
            }
            if let Some(to) = filter.to {
                builder.push(" AND starts_at < ").push_bind(to);
            }
            if let Some(category) = filter.category.clone().filter(|c| !c.trim().is_empty()) {
                builder.push(" AND category = ").push_bind(category);
            }
        }

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM events");
        push_filters(&mut count, church_id, filter);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM events");
        push_filters(&mut select, church_id, filter);
        select
            .push(" ORDER BY starts_at ASC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let items = select.build_query_as::<Event>().fetch_all(pool).await?;
        Ok(Page::new(items, total, params))
    }

    /// Events that have not finished yet, plus every recurring event
    ///
    /// `public_only` restricts to `is_public` events for the church website.
    pub async fn upcoming(
        pool: &PgPool,
        church_id: Uuid,
        limit: i64,
        public_only: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            r#"
            SELECT * FROM events
            WHERE church_id = $1
              AND (starts_at >= NOW() OR ends_at >= NOW() OR is_recurring)
              AND (is_public OR NOT $2)
            ORDER BY starts_at ASC
            LIMIT $3
            "#,
        )
        .bind(church_id)
        .bind(public_only)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
        data: EventInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET title = $3,
                description = $4,
                location = $5,
                category = $6,
                starts_at = $7,
                ends_at = $8,
                is_recurring = $9,
                recurrence_rule = $10,
                check_in_enabled = $11,
                is_public = $12,
                updated_at = NOW()
            WHERE church_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(id)
        .bind(data.title.trim())
        .bind(non_blank(data.description))
        .bind(non_blank(data.location))
        .bind(non_blank(data.category))
        .bind(data.starts_at)
        .bind(data.ends_at)
        .bind(data.is_recurring)
        .bind(&data.recurrence_rule)
        .bind(data.check_in_enabled)
        .bind(data.is_public)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, church_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM events WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Idempotent insert keyed on `(church_id, title, starts_at)`, used by the seed loader
    pub async fn ensure(pool: &PgPool, church_id: Uuid, data: EventInput) -> Result<Self, sqlx::Error> {
        let existing = sqlx::query_as::<_, Event>(
            "SELECT * FROM events WHERE church_id = $1 AND title = $2 AND starts_at = $3",
        )
        .bind(church_id)
        .bind(data.title.trim())
        .bind(data.starts_at)
        .fetch_optional(pool)
        .await?;

        match existing {
            Some(event) => Ok(event),
            None => Self::create(pool, church_id, data).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn input(starts_at: DateTime<Utc>, ends_at: Option<DateTime<Utc>>) -> EventInput {
        EventInput {
            title: "Sunday Worship".to_string(),
            description: None,
            location: Some("Sanctuary".to_string()),
            category: Some("service".to_string()),
            starts_at,
            ends_at,
            is_recurring: true,
            recurrence_rule: Some("FREQ=WEEKLY;BYDAY=SU".to_string()),
            check_in_enabled: true,
            is_public: true,
        }
    }

    #[test]
    fn test_event_end_before_start_rejected() {
        let start = Utc::now();
        assert!(input(start, Some(start + Duration::hours(1))).validate().is_ok());
        assert!(input(start, Some(start)).validate().is_ok());
        assert!(input(start, None).validate().is_ok());
        assert!(input(start, Some(start - Duration::minutes(1))).validate().is_err());
    }

    #[test]
    fn test_event_input_defaults() {
        let input: EventInput = serde_json::from_value(serde_json::json!({
            "title": "Potluck",
            "starts_at": "2026-06-07T17:00:00Z"
        }))
        .unwrap();

        assert!(input.is_public);
        assert!(!input.is_recurring);
        assert!(!input.check_in_enabled);
        assert!(input.recurrence_rule.is_none());
    }

    #[test]
    fn test_recurrence_rule_kept_verbatim() {
        let rule = "FREQ=MONTHLY;BYDAY=1SU;COUNT=12";
        let input: EventInput = serde_json::from_value(serde_json::json!({
            "title": "Communion",
            "starts_at": "2026-06-07T10:00:00Z",
            "is_recurring": true,
            "recurrence_rule": rule
        }))
        .unwrap();
        assert_eq!(input.recurrence_rule.as_deref(), Some(rule));
    }
}
