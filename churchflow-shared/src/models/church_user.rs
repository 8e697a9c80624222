/// Church membership for user accounts
///
/// Links a `User` to a `Church` with a role. A user may belong to several
/// churches; the session carries the one currently active.
///
/// # Roles
///
/// - **OWNER**: everything, including subscription and deleting the church
/// - **ADMIN**: settings, users, all modules
/// - **STAFF**: day-to-day edits (members, events, giving, messages)
/// - **VOLUNTEER**: check-in and attendance
/// - **MEMBER**: read-only

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "church_role", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChurchRole {
    Owner,
    Admin,
    Staff,
    Volunteer,
    Member,
}

impl ChurchRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChurchRole::Owner => "OWNER",
            ChurchRole::Admin => "ADMIN",
            ChurchRole::Staff => "STAFF",
            ChurchRole::Volunteer => "VOLUNTEER",
            ChurchRole::Member => "MEMBER",
        }
    }

    /// True when this role is at least as privileged as `required`
    ///
    /// Hierarchy: OWNER > ADMIN > STAFF > VOLUNTEER > MEMBER
    pub fn has_permission(&self, required: &ChurchRole) -> bool {
        self.level() >= required.level()
    }

    fn level(&self) -> u8 {
        match self {
            ChurchRole::Owner => 5,
            ChurchRole::Admin => 4,
            ChurchRole::Staff => 3,
            ChurchRole::Volunteer => 2,
            ChurchRole::Member => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ChurchUser {
    pub church_id: Uuid,
    pub user_id: Uuid,
    pub role: ChurchRole,
    pub created_at: DateTime<Utc>,
}

/// Church user joined with account details, for the user list
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChurchUserDetail {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: ChurchRole,
    pub created_at: DateTime<Utc>,
}

impl ChurchUser {
    /// Adds a user to a church; an existing membership keeps its role
    pub async fn add(
        pool: &PgPool,
        church_id: Uuid,
        user_id: Uuid,
        role: ChurchRole,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ChurchUser>(
            r#"
            INSERT INTO church_users (church_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (church_id, user_id) DO UPDATE SET role = church_users.role
            RETURNING church_id, user_id, role, created_at
            "#,
        )
        .bind(church_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(pool)
        .await
    }

    pub async fn get_role(
        pool: &PgPool,
        church_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ChurchRole>, sqlx::Error> {
        sqlx::query_scalar::<_, ChurchRole>(
            "SELECT role FROM church_users WHERE church_id = $1 AND user_id = $2",
        )
        .bind(church_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// First church the user joined, used to pick the church at login
    pub async fn first_for_user(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ChurchUser>(
            r#"
            SELECT church_id, user_id, role, created_at
            FROM church_users
            WHERE user_id = $1
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_by_church(
        pool: &PgPool,
        church_id: Uuid,
    ) -> Result<Vec<ChurchUserDetail>, sqlx::Error> {
        sqlx::query_as::<_, ChurchUserDetail>(
            r#"
            SELECT u.id AS user_id, u.email, u.name, cu.role, cu.created_at
            FROM church_users cu
            JOIN users u ON u.id = cu.user_id
            WHERE cu.church_id = $1
            ORDER BY cu.created_at ASC
            "#,
        )
        .bind(church_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update_role(
        pool: &PgPool,
        church_id: Uuid,
        user_id: Uuid,
        role: ChurchRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ChurchUser>(
            r#"
            UPDATE church_users SET role = $3
            WHERE church_id = $1 AND user_id = $2
            RETURNING church_id, user_id, role, created_at
            "#,
        )
        .bind(church_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(pool)
        .await
    }

    pub async fn remove(pool: &PgPool, church_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM church_users WHERE church_id = $1 AND user_id = $2")
            .bind(church_id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_owners(pool: &PgPool, church_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM church_users WHERE church_id = $1 AND role = 'owner'",
        )
        .bind(church_id)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_hierarchy() {
        use ChurchRole::*;

        assert!(Owner.has_permission(&Admin));
        assert!(Admin.has_permission(&Staff));
        assert!(Staff.has_permission(&Volunteer));
        assert!(Volunteer.has_permission(&Member));
        assert!(Staff.has_permission(&Staff));

        assert!(!Member.has_permission(&Volunteer));
        assert!(!Volunteer.has_permission(&Staff));
        assert!(!Admin.has_permission(&Owner));
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&ChurchRole::Staff).unwrap(), "\"STAFF\"");
        let role: ChurchRole = serde_json::from_str("\"VOLUNTEER\"").unwrap();
        assert_eq!(role, ChurchRole::Volunteer);
        assert_eq!(role.as_str(), "VOLUNTEER");
    }
}
