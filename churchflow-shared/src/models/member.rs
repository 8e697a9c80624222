/// Church members
///
/// A member is a person on a church's roster. Members do not need a login.
/// Email is optional, stored lowercased, and unique per church: creating a
/// member whose `(church_id, email)` already exists updates that record
/// instead of failing.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use super::{contains_pattern, non_blank, normalize_email, ListParams, Page};

/// Shortest query the member search answers
pub const MIN_SEARCH_LENGTH: usize = 2;

/// Most results the member search returns
pub const MAX_SEARCH_RESULTS: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberStatus {
    Visitor,
    Regular,
    Member,
    Inactive,
}

impl Default for MemberStatus {
    fn default() -> Self {
        MemberStatus::Visitor
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub id: Uuid,
    pub church_id: Uuid,
    pub family_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub status: MemberStatus,
    pub joined_on: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Short form used by search results and pickers
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub status: MemberStatus,
}

/// Body for creating or replacing a member
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MemberInput {
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[serde(default)]
    pub status: MemberStatus,
    pub family_id: Option<Uuid>,
    pub joined_on: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl MemberInput {
    fn normalized(self) -> Self {
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: normalize_email(self.email),
            phone: non_blank(self.phone),
            address: non_blank(self.address),
            notes: non_blank(self.notes),
            ..self
        }
    }
}

/// `GET /api/members` filters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberFilter {
    /// Matches first name, last name, full name or email
    pub q: Option<String>,
    pub status: Option<MemberStatus>,
    pub family_id: Option<Uuid>,
}

#[derive(sqlx::FromRow)]
struct UpsertedMember {
    #[sqlx(flatten)]
    member: Member,
    inserted: bool,
}

impl Member {
    /// Inserts a member, or updates the existing one with the same email
    ///
    /// Returns the row and whether it was newly inserted. Members without an
    /// email are always inserted.
    pub async fn upsert(
        pool: &PgPool,
        church_id: Uuid,
        data: MemberInput,
    ) -> Result<(Self, bool), sqlx::Error> {
        let data = data.normalized();

        let row = sqlx::query_as::<_, UpsertedMember>(
            r#"
            INSERT INTO members (
                church_id, family_id, first_name, last_name, email, phone,
                date_of_birth, address, status, joined_on, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (church_id, email) DO UPDATE
            SET family_id = COALESCE(EXCLUDED.family_id, members.family_id),
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                phone = COALESCE(EXCLUDED.phone, members.phone),
                date_of_birth = COALESCE(EXCLUDED.date_of_birth, members.date_of_birth),
                address = COALESCE(EXCLUDED.address, members.address),
                status = EXCLUDED.status,
                joined_on = COALESCE(EXCLUDED.joined_on, members.joined_on),
                notes = COALESCE(EXCLUDED.notes, members.notes),
                updated_at = NOW()
            RETURNING *, (xmax = 0) AS inserted
            "#,
        )
        .bind(church_id)
        .bind(data.family_id)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(data.date_of_birth)
        .bind(&data.address)
        .bind(data.status)
        .bind(data.joined_on)
        .bind(&data.notes)
        .fetch_one(pool)
        .await?;

        Ok((row.member, row.inserted))
    }

    pub async fn find_by_id(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Member>("SELECT * FROM members WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_email(
        pool: &PgPool,
        church_id: Uuid,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Member>("SELECT * FROM members WHERE church_id = $1 AND email = $2")
            .bind(church_id)
            .bind(email.trim().to_lowercase())
            .fetch_optional(pool)
            .await
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, church_id: Uuid, filter: &MemberFilter) {
        builder.push(" WHERE church_id = ").push_bind(church_id);

        if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = contains_pattern(q);
            builder
                .push(" AND (first_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR last_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR (first_name || ' ' || last_name) ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(family_id) = filter.family_id {
            builder.push(" AND family_id = ").push_bind(family_id);
        }
    }

    pub async fn list(
        pool: &PgPool,
        church_id: Uuid,
        filter: &MemberFilter,
        params: ListParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM members");
        Self::push_filters(&mut count, church_id, filter);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM members");
        Self::push_filters(&mut select, church_id, filter);
        select
            .push(" ORDER BY last_name ASC, first_name ASC LIMIT ")
            .push_bind(params.limit())
            .push(" OFFSET ")
            .push_bind(params.offset());

        let items = select.build_query_as::<Member>().fetch_all(pool).await?;

        Ok(Page::new(items, total, params))
    }

    /// Name/email lookup for pickers
    ///
    /// Queries shorter than two characters return nothing; at most ten rows
    /// come back.
    pub async fn search(
        pool: &PgPool,
        church_id: Uuid,
        query: &str,
    ) -> Result<Vec<MemberSummary>, sqlx::Error> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_LENGTH {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, MemberSummary>(
            r#"
            SELECT id, first_name, last_name, email, status
            FROM members
            WHERE church_id = $1
              AND status <> 'inactive'
              AND (first_name ILIKE $2
                   OR last_name ILIKE $2
                   OR (first_name || ' ' || last_name) ILIKE $2
                   OR email ILIKE $2)
            ORDER BY last_name ASC, first_name ASC
            LIMIT $3
            "#,
        )
        .bind(church_id)
        .bind(contains_pattern(query))
        .bind(MAX_SEARCH_RESULTS)
        .fetch_all(pool)
        .await
    }

    pub async fn list_by_family(
        pool: &PgPool,
        church_id: Uuid,
        family_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Member>(
            r#"
            SELECT * FROM members
            WHERE church_id = $1 AND family_id = $2
            ORDER BY date_of_birth ASC NULLS LAST, first_name ASC
            "#,
        )
        .bind(church_id)
        .bind(family_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
        data: MemberInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        let data = data.normalized();

        sqlx::query_as::<_, Member>(
            r#"
            UPDATE members
            SET family_id = $3,
                first_name = $4,
                last_name = $5,
                email = $6,
                phone = $7,
                date_of_birth = $8,
                address = $9,
                status = $10,
                joined_on = $11,
                notes = $12,
                updated_at = NOW()
            WHERE church_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(id)
        .bind(data.family_id)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(data.date_of_birth)
        .bind(&data.address)
        .bind(data.status)
        .bind(data.joined_on)
        .bind(&data.notes)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, church_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM members WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(pool: &PgPool, church_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM members WHERE church_id = $1")
            .bind(church_id)
            .fetch_one(pool)
            .await
    }

    /// True if `id` is a member of `church_id`
    pub async fn exists(pool: &PgPool, church_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM members WHERE church_id = $1 AND id = $2)")
            .bind(church_id)
            .bind(id)
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> MemberInput {
        MemberInput {
            first_name: "  Ruth ".to_string(),
            last_name: "Naomi".to_string(),
            email: Some(" Ruth@Example.ORG ".to_string()),
            phone: Some("   ".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_member_input_normalized() {
        let data = input().normalized();
        assert_eq!(data.first_name, "Ruth");
        assert_eq!(data.email.as_deref(), Some("ruth@example.org"));
        assert_eq!(data.phone, None);
        assert_eq!(data.status, MemberStatus::Visitor);
    }

    #[test]
    fn test_member_input_validation() {
        assert!(input().validate().is_ok());

        let mut bad = input();
        bad.first_name = String::new();
        bad.email = Some("not-an-email".to_string());
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("first_name"));
        assert!(fields.contains_key("email"));
    }

    #[test]
    fn test_member_status_serde() {
        let status: MemberStatus = serde_json::from_str("\"REGULAR\"").unwrap();
        assert_eq!(status, MemberStatus::Regular);
        assert_eq!(serde_json::to_string(&MemberStatus::Inactive).unwrap(), "\"INACTIVE\"");
    }

    #[test]
    fn test_member_filter_deserializes_from_query_shape() {
        let filter: MemberFilter =
            serde_json::from_value(serde_json::json!({ "q": "smi", "status": "MEMBER" })).unwrap();
        assert_eq!(filter.q.as_deref(), Some("smi"));
        assert_eq!(filter.status, Some(MemberStatus::Member));
        assert!(filter.family_id.is_none());
    }
}
