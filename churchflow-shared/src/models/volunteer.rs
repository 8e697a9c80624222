/// Volunteer roles, assignments and shifts
///
/// - `VolunteerRole`: a job that needs people (greeter, sound desk, nursery)
/// - `Volunteer`: assignment of one member to one role, unique per pair
/// - `VolunteerShift`: a scheduled slot for an assignment, optionally tied to
///   an event; `ends_at` must be after `starts_at`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::non_blank;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "volunteer_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolunteerStatus {
    Active,
    Inactive,
}

impl Default for VolunteerStatus {
    fn default() -> Self {
        VolunteerStatus::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VolunteerRole {
    pub id: Uuid,
    pub church_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub ministry: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VolunteerRoleInput {
    #[validate(length(min = 1, max = 255, message = "Role name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub ministry: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Volunteer {
    pub id: Uuid,
    pub church_id: Uuid,
    pub member_id: Uuid,
    pub role_id: Uuid,
    pub status: VolunteerStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Assignment joined with member and role names
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VolunteerDetail {
    pub id: Uuid,
    pub member_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub role_id: Uuid,
    pub role_name: String,
    pub status: VolunteerStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignVolunteer {
    pub member_id: Uuid,
    pub role_id: Uuid,
    #[serde(default)]
    pub status: VolunteerStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateVolunteer {
    pub status: VolunteerStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VolunteerShift {
    pub id: Uuid,
    pub church_id: Uuid,
    pub volunteer_id: Uuid,
    pub event_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Shift joined with who is serving and in which role
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ShiftDetail {
    pub id: Uuid,
    pub volunteer_id: Uuid,
    pub event_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub member_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub role_name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_shift_times"))]
pub struct ShiftInput {
    pub event_id: Option<Uuid>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub notes: Option<String>,
}

fn validate_shift_times(input: &ShiftInput) -> Result<(), ValidationError> {
    if input.ends_at <= input.starts_at {
        let mut error = ValidationError::new("ends_before_start");
        error.message = Some("Shift must end after it starts".into());
        return Err(error);
    }
    Ok(())
}

impl VolunteerRole {
    pub async fn create(
        pool: &PgPool,
        church_id: Uuid,
        data: VolunteerRoleInput,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, VolunteerRole>(
            r#"
            INSERT INTO volunteer_roles (church_id, name, description, ministry)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(data.name.trim())
        .bind(non_blank(data.description))
        .bind(non_blank(data.ministry))
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, VolunteerRole>(
            "SELECT * FROM volunteer_roles WHERE church_id = $1 AND id = $2",
        )
        .bind(church_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(pool: &PgPool, church_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, VolunteerRole>(
            "SELECT * FROM volunteer_roles WHERE church_id = $1 ORDER BY ministry ASC NULLS LAST, name ASC",
        )
        .bind(church_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
        data: VolunteerRoleInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, VolunteerRole>(
            r#"
            UPDATE volunteer_roles
            SET name = $3, description = $4, ministry = $5, updated_at = NOW()
            WHERE church_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(id)
        .bind(data.name.trim())
        .bind(non_blank(data.description))
        .bind(non_blank(data.ministry))
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, church_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM volunteer_roles WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl Volunteer {
    /// Assigns a member to a role
    ///
    /// `None` when the member or the role is not in `church_id`. A duplicate
    /// assignment surfaces as a unique violation.
    pub async fn assign(
        pool: &PgPool,
        church_id: Uuid,
        data: AssignVolunteer,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Volunteer>(
            r#"
            INSERT INTO volunteers (church_id, member_id, role_id, status, notes)
            SELECT $1, m.id, r.id, $4, $5
            FROM members m
            JOIN volunteer_roles r ON r.church_id = m.church_id
            WHERE m.church_id = $1 AND m.id = $2 AND r.id = $3
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(data.member_id)
        .bind(data.role_id)
        .bind(data.status)
        .bind(non_blank(data.notes))
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Volunteer>("SELECT * FROM volunteers WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(
        pool: &PgPool,
        church_id: Uuid,
        role_id: Option<Uuid>,
    ) -> Result<Vec<VolunteerDetail>, sqlx::Error> {
        sqlx::query_as::<_, VolunteerDetail>(
            r#"
            SELECT v.id, v.member_id, m.first_name, m.last_name, v.role_id,
                   r.name AS role_name, v.status, v.notes, v.created_at
            FROM volunteers v
            JOIN members m ON m.id = v.member_id
            JOIN volunteer_roles r ON r.id = v.role_id
            WHERE v.church_id = $1 AND ($2::uuid IS NULL OR v.role_id = $2)
            ORDER BY r.name ASC, m.last_name ASC, m.first_name ASC
            "#,
        )
        .bind(church_id)
        .bind(role_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
        data: UpdateVolunteer,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Volunteer>(
            r#"
            UPDATE volunteers SET status = $3, notes = $4
            WHERE church_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(id)
        .bind(data.status)
        .bind(non_blank(data.notes))
        .fetch_optional(pool)
        .await
    }

    pub async fn remove(pool: &PgPool, church_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM volunteers WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl VolunteerShift {
    /// Schedules a shift for an assignment
    ///
    /// `None` when the assignment (or the optional event) is not in `church_id`.
    pub async fn create(
        pool: &PgPool,
        church_id: Uuid,
        volunteer_id: Uuid,
        data: ShiftInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, VolunteerShift>(
            r#"
            INSERT INTO volunteer_shifts (church_id, volunteer_id, event_id, starts_at, ends_at, notes)
            SELECT v.church_id, v.id, $3, $4, $5, $6
            FROM volunteers v
            WHERE v.church_id = $1 AND v.id = $2
              AND ($3::uuid IS NULL OR EXISTS (
                  SELECT 1 FROM events e WHERE e.church_id = $1 AND e.id = $3
              ))
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(volunteer_id)
        .bind(data.event_id)
        .bind(data.starts_at)
        .bind(data.ends_at)
        .bind(non_blank(data.notes))
        .fetch_optional(pool)
        .await
    }

    pub async fn list_for_volunteer(
        pool: &PgPool,
        church_id: Uuid,
        volunteer_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, VolunteerShift>(
            r#"
            SELECT * FROM volunteer_shifts
            WHERE church_id = $1 AND volunteer_id = $2
            ORDER BY starts_at ASC
            "#,
        )
        .bind(church_id)
        .bind(volunteer_id)
        .fetch_all(pool)
        .await
    }

    /// Shifts that have not ended, soonest first
    pub async fn upcoming(
        pool: &PgPool,
        church_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ShiftDetail>, sqlx::Error> {
        sqlx::query_as::<_, ShiftDetail>(
            r#"
            SELECT s.id, s.volunteer_id, s.event_id, s.starts_at, s.ends_at, s.notes,
                   m.id AS member_id, m.first_name, m.last_name, r.name AS role_name
            FROM volunteer_shifts s
            JOIN volunteers v ON v.id = s.volunteer_id
            JOIN members m ON m.id = v.member_id
            JOIN volunteer_roles r ON r.id = v.role_id
            WHERE s.church_id = $1 AND s.ends_at >= NOW()
            ORDER BY s.starts_at ASC
            LIMIT $2
            "#,
        )
        .bind(church_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, church_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM volunteer_shifts WHERE church_id = $1 AND id = $2")
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
    use chrono::Duration;

    #[test]
    fn test_shift_must_end_after_start() {
        let start = Utc::now();
        let shift = |ends_at| ShiftInput {
            event_id: None,
            starts_at: start,
            ends_at,
            notes: None,
        };

        assert!(shift(start + Duration::hours(2)).validate().is_ok());
        assert!(shift(start).validate().is_err());
        assert!(shift(start - Duration::hours(1)).validate().is_err());
    }

    #[test]
    fn test_assign_defaults_active() {
        let data: AssignVolunteer = serde_json::from_value(serde_json::json!({
            "member_id": Uuid::new_v4(),
            "role_id": Uuid::new_v4()
        }))
        .unwrap();
        assert_eq!(data.status, VolunteerStatus::Active);
    }
}
