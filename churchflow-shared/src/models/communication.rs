/// Outbound communications and message templates
///
/// # Lifecycle
///
/// ```text
/// DRAFT ──▶ SCHEDULED ──(due)──▶ SENDING ──▶ SENT
///   │                              ▲   └────▶ FAILED
///   └──────────(send now)──────────┘
/// ```
///
/// A communication created or edited as SCHEDULED with a `scheduled_for` in
/// the past (or none at all) goes straight to SENDING, so nothing is ever
/// left scheduled for a moment that has already passed. Only DRAFT and
/// SCHEDULED rows can be edited. The worker picks up SENDING rows and due
/// SCHEDULED rows and finishes them as SENT or FAILED.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::{non_blank, ListParams, Page};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "communication_channel", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommunicationChannel {
    Email,
    Sms,
    Push,
}

impl CommunicationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicationChannel::Email => "email",
            CommunicationChannel::Sms => "sms",
            CommunicationChannel::Push => "push",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "communication_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommunicationStatus {
    Draft,
    Scheduled,
    Sending,
    Sent,
    Failed,
}

impl CommunicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicationStatus::Draft => "DRAFT",
            CommunicationStatus::Scheduled => "SCHEDULED",
            CommunicationStatus::Sending => "SENDING",
            CommunicationStatus::Sent => "SENT",
            CommunicationStatus::Failed => "FAILED",
        }
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, CommunicationStatus::Draft | CommunicationStatus::Scheduled)
    }
}

/// Status a new or edited communication actually gets
///
/// DRAFT stays DRAFT. SCHEDULED stays SCHEDULED only while `scheduled_for`
/// is in the future; otherwise it becomes SENDING. Any other request is
/// refused.
pub fn initial_status(
    requested: CommunicationStatus,
    scheduled_for: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<CommunicationStatus, &'static str> {
    match requested {
        CommunicationStatus::Draft => Ok(CommunicationStatus::Draft),
        CommunicationStatus::Scheduled => match scheduled_for {
            Some(at) if at > now => Ok(CommunicationStatus::Scheduled),
            _ => Ok(CommunicationStatus::Sending),
        },
        CommunicationStatus::Sending => Ok(CommunicationStatus::Sending),
        CommunicationStatus::Sent | CommunicationStatus::Failed => {
            Err("status must be DRAFT, SCHEDULED or SENDING")
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Communication {
    pub id: Uuid,
    pub church_id: Uuid,
    pub channel: CommunicationChannel,
    pub status: CommunicationStatus,
    pub subject: Option<String>,
    pub body: String,
    /// Audience; `None` means every active member
    pub group_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub recipient_count: i32,
    pub error_message: Option<String>,
    pub attempts: i32,
    #[serde(skip_serializing)]
    pub locked_until: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CommunicationInput {
    pub channel: CommunicationChannel,
    #[validate(length(max = 255))]
    pub subject: Option<String>,
    /// May be blank when `template_id` supplies the body
    #[serde(default)]
    pub body: String,
    pub group_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default = "default_status")]
    pub status: CommunicationStatus,
}

fn default_status() -> CommunicationStatus {
    CommunicationStatus::Draft
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommunicationFilter {
    pub status: Option<CommunicationStatus>,
    pub channel: Option<CommunicationChannel>,
}

/// Counts per status; `sent` counts only SENT rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommunicationStats {
    pub draft: i64,
    pub scheduled: i64,
    pub sending: i64,
    pub sent: i64,
    pub failed: i64,
    /// Sum of `recipient_count` over SENT rows
    pub recipients_reached: i64,
}

impl CommunicationStats {
    fn add(&mut self, status: CommunicationStatus, count: i64, recipients: i64) {
        match status {
            CommunicationStatus::Draft => self.draft += count,
            CommunicationStatus::Scheduled => self.scheduled += count,
            CommunicationStatus::Sending => self.sending += count,
            CommunicationStatus::Sent => {
                self.sent += count;
                self.recipients_reached += recipients;
            }
            CommunicationStatus::Failed => self.failed += count,
        }
    }

    pub fn from_rows(rows: &[(CommunicationStatus, i64, i64)]) -> Self {
        let mut stats = Self::default();
        for &(status, count, recipients) in rows {
            stats.add(status, count, recipients);
        }
        stats
    }
}

/// One resolved delivery target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipient {
    pub member_id: Uuid,
    pub name: String,
    /// Email address, phone number, or member id for push
    pub address: String,
}

/// Why a communication write was refused
#[derive(Debug, thiserror::Error)]
pub enum CommunicationWriteError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Communication not found")]
    NotFound,
    #[error("Communication is {} and can no longer be changed", .0.as_str())]
    NotEditable(CommunicationStatus),
    #[error("Group not found")]
    GroupNotFound,
    #[error("Template not found")]
    TemplateNotFound,
    #[error("Message body is required")]
    EmptyBody,
    #[error("Invalid status: {0}")]
    InvalidStatus(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageTemplate {
    pub id: Uuid,
    pub church_id: Uuid,
    pub name: String,
    pub channel: CommunicationChannel,
    pub subject: Option<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TemplateInput {
    #[validate(length(min = 1, max = 255, message = "Template name is required"))]
    pub name: String,
    pub channel: CommunicationChannel,
    #[validate(length(max = 255))]
    pub subject: Option<String>,
    #[validate(length(min = 1, message = "Template body is required"))]
    pub body: String,
}

/// Subject and body after applying the template, if any
struct ResolvedContent {
    subject: Option<String>,
    body: String,
}

impl Communication {
    async fn resolve_content(
        pool: &PgPool,
        church_id: Uuid,
        data: &CommunicationInput,
    ) -> Result<ResolvedContent, CommunicationWriteError> {
        if let Some(group_id) = data.group_id {
            if super::group::Group::find_by_id(pool, church_id, group_id).await?.is_none() {
                return Err(CommunicationWriteError::GroupNotFound);
            }
        }

        let mut subject = non_blank(data.subject.clone());
        let mut body = data.body.trim().to_string();

        if let Some(template_id) = data.template_id {
            let Some(template) = MessageTemplate::find_by_id(pool, church_id, template_id).await? else {
                return Err(CommunicationWriteError::TemplateNotFound);
            };
            if subject.is_none() {
                subject = template.subject;
            }
            if body.is_empty() {
                body = template.body;
            }
        }

        if body.is_empty() {
            return Err(CommunicationWriteError::EmptyBody);
        }

        Ok(ResolvedContent { subject, body })
    }

    pub async fn create(
        pool: &PgPool,
        church_id: Uuid,
        created_by: Option<Uuid>,
        data: CommunicationInput,
    ) -> Result<Self, CommunicationWriteError> {
        let status = initial_status(data.status, data.scheduled_for, Utc::now())
            .map_err(CommunicationWriteError::InvalidStatus)?;
        let content = Self::resolve_content(pool, church_id, &data).await?;

        let communication = sqlx::query_as::<_, Communication>(
            r#"
            INSERT INTO communications (
                church_id, channel, status, subject, body, group_id, template_id,
                scheduled_for, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(data.channel)
        .bind(status)
        .bind(&content.subject)
        .bind(&content.body)
        .bind(data.group_id)
        .bind(data.template_id)
        .bind(data.scheduled_for)
        .bind(created_by)
        .fetch_one(pool)
        .await?;

        if status != data.status {
            tracing::info!(
                communication_id = %communication.id,
                requested = ?data.status,
                actual = ?status,
                "Communication scheduled in the past was queued for immediate delivery"
            );
        }

        Ok(communication)
    }

    pub async fn find_by_id(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Communication>(
            "SELECT * FROM communications WHERE church_id = $1 AND id = $2",
        )
        .bind(church_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        church_id: Uuid,
        filter: &CommunicationFilter,
        params: ListParams,
    ) -> Result<Page<Self>, sqlx::Error> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM communications
            WHERE church_id = $1
              AND ($2::communication_status IS NULL OR status = $2)
              AND ($3::communication_channel IS NULL OR channel = $3)
            "#,
        )
        .bind(church_id)
        .bind(filter.status)
        .bind(filter.channel)
        .fetch_one(pool)
        .await?;

        let items = sqlx::query_as::<_, Communication>(
            r#"
            SELECT * FROM communications
            WHERE church_id = $1
              AND ($2::communication_status IS NULL OR status = $2)
              AND ($3::communication_channel IS NULL OR channel = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(church_id)
        .bind(filter.status)
        .bind(filter.channel)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;

        Ok(Page::new(items, total, params))
    }

    /// Replaces an editable communication
    pub async fn update(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
        data: CommunicationInput,
    ) -> Result<Self, CommunicationWriteError> {
        let Some(current) = Self::find_by_id(pool, church_id, id).await? else {
            return Err(CommunicationWriteError::NotFound);
        };
        if !current.status.is_editable() {
            return Err(CommunicationWriteError::NotEditable(current.status));
        }

        let status = initial_status(data.status, data.scheduled_for, Utc::now())
            .map_err(CommunicationWriteError::InvalidStatus)?;
        let content = Self::resolve_content(pool, church_id, &data).await?;

        let updated = sqlx::query_as::<_, Communication>(
            r#"
            UPDATE communications
            SET channel = $3,
                status = $4,
                subject = $5,
                body = $6,
                group_id = $7,
                template_id = $8,
                scheduled_for = $9,
                updated_at = NOW()
            WHERE church_id = $1 AND id = $2 AND status IN ('draft', 'scheduled')
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(id)
        .bind(data.channel)
        .bind(status)
        .bind(&content.subject)
        .bind(&content.body)
        .bind(data.group_id)
        .bind(data.template_id)
        .bind(data.scheduled_for)
        .fetch_optional(pool)
        .await?;

        // Lost a race with the worker or a concurrent send
        updated.ok_or(CommunicationWriteError::NotEditable(CommunicationStatus::Sending))
    }

    /// Queues a DRAFT or SCHEDULED communication for immediate delivery
    pub async fn send_now(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
    ) -> Result<Self, CommunicationWriteError> {
        let queued = sqlx::query_as::<_, Communication>(
            r#"
            UPDATE communications
            SET status = 'sending', scheduled_for = NOW(), updated_at = NOW()
            WHERE church_id = $1 AND id = $2 AND status IN ('draft', 'scheduled')
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(id)
        .fetch_optional(pool)
        .await?;

        if let Some(communication) = queued {
            return Ok(communication);
        }

        match Self::find_by_id(pool, church_id, id).await? {
            None => Err(CommunicationWriteError::NotFound),
            Some(existing) => Err(CommunicationWriteError::NotEditable(existing.status)),
        }
    }

    pub async fn delete(pool: &PgPool, church_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM communications WHERE church_id = $1 AND id = $2 AND status <> 'sending'",
        )
        .bind(church_id)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn stats(pool: &PgPool, church_id: Uuid) -> Result<CommunicationStats, sqlx::Error> {
        let rows: Vec<(CommunicationStatus, i64, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*), COALESCE(SUM(recipient_count), 0)::BIGINT
            FROM communications
            WHERE church_id = $1
            GROUP BY status
            "#,
        )
        .bind(church_id)
        .fetch_all(pool)
        .await?;

        Ok(CommunicationStats::from_rows(&rows))
    }

    /// Members this communication reaches on its channel
    ///
    /// Email needs an email address and SMS a phone number; push reaches every
    /// member in the audience. Inactive members are skipped.
    pub async fn recipients(
        pool: &PgPool,
        church_id: Uuid,
        group_id: Option<Uuid>,
        channel: CommunicationChannel,
    ) -> Result<Vec<Recipient>, sqlx::Error> {
        sqlx::query_as::<_, Recipient>(
            r#"
            SELECT m.id AS member_id,
                   m.first_name || ' ' || m.last_name AS name,
                   CASE $3
                       WHEN 'email' THEN m.email
                       WHEN 'sms' THEN m.phone
                       ELSE m.id::text
                   END AS address
            FROM members m
            WHERE m.church_id = $1
              AND m.status <> 'inactive'
              AND ($2::uuid IS NULL OR EXISTS (
                  SELECT 1 FROM group_members gm
                  WHERE gm.church_id = $1 AND gm.group_id = $2 AND gm.member_id = m.id
              ))
              AND CASE $3
                      WHEN 'email' THEN m.email IS NOT NULL AND m.email <> ''
                      WHEN 'sms' THEN m.phone IS NOT NULL AND m.phone <> ''
                      ELSE TRUE
                  END
            ORDER BY m.last_name ASC, m.first_name ASC
            "#,
        )
        .bind(church_id)
        .bind(group_id)
        .bind(channel.as_str())
        .fetch_all(pool)
        .await
    }

    pub async fn mark_sent(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
        recipient_count: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE communications
            SET status = 'sent', sent_at = NOW(), recipient_count = $3,
                error_message = NULL, locked_until = NULL, updated_at = NOW()
            WHERE church_id = $1 AND id = $2 AND status = 'sending'
            "#,
        )
        .bind(church_id)
        .bind(id)
        .bind(recipient_count)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_failed(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
        error_message: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE communications
            SET status = 'failed', error_message = $3, locked_until = NULL, updated_at = NOW()
            WHERE church_id = $1 AND id = $2 AND status = 'sending'
            "#,
        )
        .bind(church_id)
        .bind(id)
        .bind(error_message)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Releases a claimed row for another attempt once `retry_in` has passed
    ///
    /// A zero delay makes the row claimable straight away.
    pub async fn release(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
        error_message: &str,
        retry_in: std::time::Duration,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE communications
            SET locked_until = CASE
                    WHEN $4::float8 > 0 THEN NOW() + make_interval(secs => $4::float8)
                    ELSE NULL
                END,
                error_message = $3,
                updated_at = NOW()
            WHERE church_id = $1 AND id = $2 AND status = 'sending'
            "#,
        )
        .bind(church_id)
        .bind(id)
        .bind(error_message)
        .bind(retry_in.as_secs_f64())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl MessageTemplate {
    pub async fn create(pool: &PgPool, church_id: Uuid, data: TemplateInput) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, MessageTemplate>(
            r#"
            INSERT INTO message_templates (church_id, name, channel, subject, body)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(data.name.trim())
        .bind(data.channel)
        .bind(non_blank(data.subject))
        .bind(&data.body)
        .fetch_one(pool)
        .await
    }

    /// Returns the template with this name, creating it if needed
    pub async fn ensure(pool: &PgPool, church_id: Uuid, data: TemplateInput) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, MessageTemplate>(
            r#"
            INSERT INTO message_templates (church_id, name, channel, subject, body)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (church_id, name) DO UPDATE SET name = EXCLUDED.name
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(data.name.trim())
        .bind(data.channel)
        .bind(non_blank(data.subject))
        .bind(&data.body)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MessageTemplate>(
            "SELECT * FROM message_templates WHERE church_id = $1 AND id = $2",
        )
        .bind(church_id)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(pool: &PgPool, church_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, MessageTemplate>(
            "SELECT * FROM message_templates WHERE church_id = $1 ORDER BY name ASC",
        )
        .bind(church_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
        data: TemplateInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MessageTemplate>(
            r#"
            UPDATE message_templates
            SET name = $3, channel = $4, subject = $5, body = $6, updated_at = NOW()
            WHERE church_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(id)
        .bind(data.name.trim())
        .bind(data.channel)
        .bind(non_blank(data.subject))
        .bind(&data.body)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, church_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM message_templates WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
