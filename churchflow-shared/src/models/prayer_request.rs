/// Prayer requests
///
/// Staff manage the full list. Visitors can submit through the public church
/// site; those submissions always start PENDING. The public prayer wall shows
/// only `is_public` requests and hides the requester's name when
/// `is_anonymous` is set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::{non_blank, normalize_email, ListParams, Page};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "prayer_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrayerStatus {
    Pending,
    Praying,
    Answered,
}

impl Default for PrayerStatus {
    fn default() -> Self {
        PrayerStatus::Pending
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PrayerRequest {
    pub id: Uuid,
    pub church_id: Uuid,
    pub member_id: Option<Uuid>,
    pub requester_name: Option<String>,
    pub requester_email: Option<String>,
    pub title: String,
    pub body: String,
    pub status: PrayerStatus,
    pub is_public: bool,
    pub is_anonymous: bool,
    pub answered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the public prayer wall shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicPrayerRequest {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub status: PrayerStatus,
    /// `None` when the requester asked to stay anonymous
    pub requester_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<PrayerRequest> for PublicPrayerRequest {
    fn from(request: PrayerRequest) -> Self {
        Self {
            id: request.id,
            title: request.title,
            body: request.body,
            status: request.status,
            requester_name: if request.is_anonymous {
                None
            } else {
                request.requester_name
            },
            created_at: request.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PrayerRequestInput {
    pub member_id: Option<Uuid>,
    #[validate(length(max = 255))]
    pub requester_name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub requester_email: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 5000, message = "Request text is required"))]
    pub body: String,
    #[serde(default)]
    pub status: PrayerStatus,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_anonymous: bool,
}

/// Body of `POST /c/{slug}/prayer-requests`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PublicPrayerSubmission {
    #[validate(length(max = 255))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 5000, message = "Request text is required"))]
    pub body: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_anonymous: bool,
}

impl From<PublicPrayerSubmission> for PrayerRequestInput {
    fn from(submission: PublicPrayerSubmission) -> Self {
        Self {
            member_id: None,
            requester_name: submission.name,
            requester_email: submission.email,
            title: submission.title,
            body: submission.body,
            status: PrayerStatus::Pending,
            is_public: submission.is_public,
            is_anonymous: submission.is_anonymous,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrayerRequestFilter {
    pub status: Option<PrayerStatus>,
}

impl PrayerRequest {
    pub async fn create(
        pool: &PgPool,
        church_id: Uuid,
        data: PrayerRequestInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        if let Some(member_id) = data.member_id {
            if !super::member::Member::exists(pool, church_id, member_id).await? {
                return Ok(None);
            }
        }

        sqlx::query_as::<_, PrayerRequest>(
            r#"
            INSERT INTO prayer_requests (
                church_id, member_id, requester_name, requester_email, title, body,
                status, is_public, is_anonymous, answered_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9,
                    CASE WHEN $7 = 'answered'::prayer_status THEN NOW() END)
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(data.member_id)
        .bind(non_blank(data.requester_name))
        .bind(normalize_email(data.requester_email))
        .bind(data.title.trim())
        .bind(data.body.trim())
        .bind(data.status)
        .bind(data.is_public)
        .bind(data.is_anonymous)
        .fetch_optional(pool)
        .await
    }

    /// Stores a public submission, always PENDING
    pub async fn submit_public(
        pool: &PgPool,
        church_id: Uuid,
        submission: PublicPrayerSubmission,
    ) -> Result<Self, sqlx::Error> {
        let mut data = PrayerRequestInput::from(submission);
        data.status = PrayerStatus::Pending;

        Self::create(pool, church_id, data)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PrayerRequest>(
            "SELECT * FROM prayer_requests WHERE church_id = $1 AND id = $2",
        )
        .bind(church_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        church_id: Uuid,
        filter: &PrayerRequestFilter,
        params: ListParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM prayer_requests
            WHERE church_id = $1 AND ($2::prayer_status IS NULL OR status = $2)
            "#,
        )
        .bind(church_id)
        .bind(filter.status)
        .fetch_one(pool)
        .await?;

        let items = sqlx::query_as::<_, PrayerRequest>(
            r#"
            SELECT * FROM prayer_requests
            WHERE church_id = $1 AND ($2::prayer_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(church_id)
        .bind(filter.status)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;

        Ok(Page::new(items, total, params))
    }

    /// Public, not-yet-answered requests first, newest first
    pub async fn list_public(
        pool: &PgPool,
        church_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PublicPrayerRequest>, sqlx::Error> {
        let rows = sqlx::query_as::<_, PrayerRequest>(
            r#"
            SELECT * FROM prayer_requests
            WHERE church_id = $1 AND is_public
            ORDER BY (status = 'answered') ASC, created_at DESC
            LIMIT $2
            "#,
        )
        .bind(church_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(PublicPrayerRequest::from).collect())
    }

    pub async fn update(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
        data: PrayerRequestInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PrayerRequest>(
            r#"
            UPDATE prayer_requests
            SET member_id = $3,
                requester_name = $4,
                requester_email = $5,
                title = $6,
                body = $7,
                status = $8,
                is_public = $9,
                is_anonymous = $10,
                answered_at = CASE
                    WHEN $8 = 'answered'::prayer_status THEN COALESCE(answered_at, NOW())
                    ELSE NULL
                END,
                updated_at = NOW()
            WHERE church_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(id)
        .bind(data.member_id)
        .bind(non_blank(data.requester_name))
        .bind(normalize_email(data.requester_email))
        .bind(data.title.trim())
        .bind(data.body.trim())
        .bind(data.status)
        .bind(data.is_public)
        .bind(data.is_anonymous)
        .fetch_optional(pool)
        .await
    }

    /// Moves a request between PENDING, PRAYING and ANSWERED
    pub async fn set_status(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
        status: PrayerStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PrayerRequest>(
            r#"
            UPDATE prayer_requests
            SET status = $3,
                answered_at = CASE
                    WHEN $3 = 'answered'::prayer_status THEN COALESCE(answered_at, NOW())
                    ELSE NULL
                END,
                updated_at = NOW()
            WHERE church_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(id)
        .bind(status)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, church_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM prayer_requests WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_pending(pool: &PgPool, church_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM prayer_requests WHERE church_id = $1 AND status = 'pending'",
        )
        .bind(church_id)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(is_anonymous: bool) -> PrayerRequest {
        PrayerRequest {
            id: Uuid::new_v4(),
            church_id: Uuid::new_v4(),
            member_id: None,
            requester_name: Some("Martha".to_string()),
            requester_email: Some("martha@example.org".to_string()),
            title: "Healing".to_string(),
            body: "For my father's recovery".to_string(),
            status: PrayerStatus::Praying,
            is_public: true,
            is_anonymous,
            answered_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_public_view_hides_anonymous_name() {
        let public = PublicPrayerRequest::from(request(true));
        assert_eq!(public.requester_name, None);

        let public = PublicPrayerRequest::from(request(false));
        assert_eq!(public.requester_name.as_deref(), Some("Martha"));
    }

    #[test]
    fn test_public_view_never_exposes_email() {
        let json = serde_json::to_string(&PublicPrayerRequest::from(request(false))).unwrap();
        assert!(!json.contains("martha@example.org"));
    }

    #[test]
    fn test_public_submission_is_pending() {
        let submission: PublicPrayerSubmission = serde_json::from_value(serde_json::json!({
            "title": "Job search",
            "body": "Please pray",
            "is_public": true
        }))
        .unwrap();
        assert!(submission.validate().is_ok());

        let input = PrayerRequestInput::from(submission);
        assert_eq!(input.status, PrayerStatus::Pending);
        assert!(input.member_id.is_none());
        assert!(input.is_public);
    }
}
