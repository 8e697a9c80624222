/// Families group members into households
///
/// Deleting a family leaves its members in place with `family_id` cleared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::non_blank;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Family {
    pub id: Uuid,
    pub church_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Family row with its member count, for listings
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FamilyWithCount {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub family: Family,
    pub member_count: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FamilyInput {
    #[validate(length(min = 1, max = 255, message = "Family name is required"))]
    pub name: String,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
}

impl Family {
    pub async fn create(pool: &PgPool, church_id: Uuid, data: FamilyInput) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Family>(
            r#"
            INSERT INTO families (church_id, name, address, phone)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(data.name.trim())
        .bind(non_blank(data.address))
        .bind(non_blank(data.phone))
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Family>("SELECT * FROM families WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool, church_id: Uuid) -> Result<Vec<FamilyWithCount>, sqlx::Error> {
        sqlx::query_as::<_, FamilyWithCount>(
            r#"
            SELECT f.*, COUNT(m.id) AS member_count
            FROM families f
            LEFT JOIN members m ON m.family_id = f.id AND m.church_id = f.church_id
            WHERE f.church_id = $1
            GROUP BY f.id
            ORDER BY f.name ASC
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
        data: FamilyInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Family>(
            r#"
            UPDATE families
            SET name = $3, address = $4, phone = $5, updated_at = NOW()
            WHERE church_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(id)
        .bind(data.name.trim())
        .bind(non_blank(data.address))
        .bind(non_blank(data.phone))
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, church_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM families WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn exists(pool: &PgPool, church_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM families WHERE church_id = $1 AND id = $2)")
            .bind(church_id)
            .bind(id)
            .fetch_one(pool)
            .await
    }
}
