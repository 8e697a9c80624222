/// Small groups, ministries and classes
///
/// Membership rows (`group_members`) repeat the `church_id` so the membership
/// list can be filtered by tenant without joining through `groups`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::non_blank;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: Uuid,
    pub church_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub leader_id: Option<Uuid>,
    pub meeting_schedule: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GroupWithCount {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub group: Group,
    pub member_count: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GroupInput {
    #[validate(length(min = 1, max = 255, message = "Group name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(max = 50))]
    pub category: Option<String>,
    pub leader_id: Option<Uuid>,
    #[validate(length(max = 255))]
    pub meeting_schedule: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GroupMember {
    pub group_id: Uuid,
    pub member_id: Uuid,
    pub church_id: Uuid,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

/// Group membership joined with the member's name and contact details
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GroupMemberDetail {
    pub member_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

impl Group {
    pub async fn create(pool: &PgPool, church_id: Uuid, data: GroupInput) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO groups (church_id, name, description, category, leader_id, meeting_schedule, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(data.name.trim())
        .bind(non_blank(data.description))
        .bind(non_blank(data.category))
        .bind(data.leader_id)
        .bind(non_blank(data.meeting_schedule))
        .bind(data.is_active)
        .fetch_one(pool)
        .await
    }

    /// Idempotent insert keyed on `(church_id, name)`, used by the seed loader
    pub async fn ensure(pool: &PgPool, church_id: Uuid, data: GroupInput) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Group>(
            r#"
            INSERT INTO groups (church_id, name, description, category, meeting_schedule, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (church_id, name) DO UPDATE SET name = EXCLUDED.name
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(data.name.trim())
        .bind(non_blank(data.description))
        .bind(non_blank(data.category))
        .bind(non_blank(data.meeting_schedule))
        .bind(data.is_active)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Group>("SELECT * FROM groups WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool, church_id: Uuid) -> Result<Vec<GroupWithCount>, sqlx::Error> {
        sqlx::query_as::<_, GroupWithCount>(
            r#"
            SELECT g.*, COUNT(gm.member_id) AS member_count
            FROM groups g
            LEFT JOIN group_members gm ON gm.group_id = g.id AND gm.church_id = g.church_id
            WHERE g.church_id = $1
            GROUP BY g.id
            ORDER BY g.name ASC
            "#,
        )
        .bind(church_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
        data: GroupInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Group>(
            r#"
            UPDATE groups
            SET name = $3,
                description = $4,
                category = $5,
                leader_id = $6,
                meeting_schedule = $7,
                is_active = $8,
                updated_at = NOW()
            WHERE church_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(id)
        .bind(data.name.trim())
        .bind(non_blank(data.description))
        .bind(non_blank(data.category))
        .bind(data.leader_id)
        .bind(non_blank(data.meeting_schedule))
        .bind(data.is_active)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, church_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM groups WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Adds a member to a group; re-adding only updates the role
    ///
    /// Returns `None` when either the group or the member is not in `church_id`.
    pub async fn add_member(
        pool: &PgPool,
        church_id: Uuid,
        group_id: Uuid,
        member_id: Uuid,
        role: &str,
    ) -> Result<Option<GroupMember>, sqlx::Error> {
        sqlx::query_as::<_, GroupMember>(
            r#"
            INSERT INTO group_members (group_id, member_id, church_id, role)
            SELECT g.id, m.id, g.church_id, $4
            FROM groups g
            JOIN members m ON m.church_id = g.church_id
            WHERE g.church_id = $1 AND g.id = $2 AND m.id = $3
            ON CONFLICT (group_id, member_id) DO UPDATE SET role = EXCLUDED.role
            RETURNING group_id, member_id, church_id, role, joined_at
            "#,
        )
        .bind(church_id)
        .bind(group_id)
        .bind(member_id)
        .bind(role)
        .fetch_optional(pool)
        .await
    }

    pub async fn remove_member(
        pool: &PgPool,
        church_id: Uuid,
        group_id: Uuid,
        member_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM group_members WHERE church_id = $1 AND group_id = $2 AND member_id = $3",
        )
        .bind(church_id)
        .bind(group_id)
        .bind(member_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_members(
        pool: &PgPool,
        church_id: Uuid,
        group_id: Uuid,
    ) -> Result<Vec<GroupMemberDetail>, sqlx::Error> {
        sqlx::query_as::<_, GroupMemberDetail>(
            r#"
            SELECT m.id AS member_id, m.first_name, m.last_name, m.email, m.phone,
                   gm.role, gm.joined_at
            FROM group_members gm
            JOIN members m ON m.id = gm.member_id
            WHERE gm.church_id = $1 AND gm.group_id = $2
            ORDER BY gm.role ASC, m.last_name ASC, m.first_name ASC
            "#,
        )
        .bind(church_id)
        .bind(group_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_input_defaults_active() {
        let input: GroupInput =
            serde_json::from_value(serde_json::json!({ "name": "Youth" })).unwrap();
        assert!(input.is_active);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_group_input_requires_name() {
        let input: GroupInput = serde_json::from_value(serde_json::json!({ "name": "" })).unwrap();
        assert!(input.validate().is_err());
    }
}
