/// Media library metadata
///
/// Only metadata is stored; the bytes live wherever `url` points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::non_blank;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MediaFile {
    pub id: Uuid,
    pub church_id: Uuid,
    pub file_name: String,
    pub url: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub alt_text: Option<String>,
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MediaFileInput {
    #[validate(length(min = 1, max = 255, message = "File name is required"))]
    pub file_name: String,
    #[validate(url(message = "Invalid URL"), length(max = 1024))]
    pub url: String,
    #[validate(length(min = 1, max = 100))]
    pub mime_type: String,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub size_bytes: i64,
    #[validate(length(max = 255))]
    pub alt_text: Option<String>,
}

impl MediaFile {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub async fn create(
        pool: &PgPool,
        church_id: Uuid,
        uploaded_by: Option<Uuid>,
        data: MediaFileInput,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, MediaFile>(
            r#"
            INSERT INTO media_files (church_id, file_name, url, mime_type, size_bytes, alt_text, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(data.file_name.trim())
        .bind(data.url.trim())
        .bind(data.mime_type.trim().to_lowercase())
        .bind(data.size_bytes)
        .bind(non_blank(data.alt_text))
        .bind(uploaded_by)
        .fetch_one(pool)
        .await
    }

    pub async fn list(
        pool: &PgPool,
        church_id: Uuid,
        images_only: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, MediaFile>(
            r#"
            SELECT * FROM media_files
            WHERE church_id = $1 AND (NOT $2 OR mime_type LIKE 'image/%')
            ORDER BY created_at DESC
            "#,
        )
        .bind(church_id)
        .bind(images_only)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MediaFile>("SELECT * FROM media_files WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Only the alt text is editable after upload
    pub async fn update_alt_text(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
        alt_text: Option<String>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MediaFile>(
            "UPDATE media_files SET alt_text = $3 WHERE church_id = $1 AND id = $2 RETURNING *",
        )
        .bind(church_id)
        .bind(id)
        .bind(non_blank(alt_text))
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, church_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM media_files WHERE church_id = $1 AND id = $2")
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
    fn test_media_input_validation() {
        let input = MediaFileInput {
            file_name: "baptism.jpg".to_string(),
            url: "https://cdn.example.org/baptism.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            size_bytes: 1024,
            alt_text: None,
        };
        assert!(input.validate().is_ok());

        let bad = MediaFileInput {
            url: "not a url".to_string(),
            size_bytes: -1,
            ..input
        };
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("url"));
        assert!(errors.field_errors().contains_key("size_bytes"));
    }

    #[test]
    fn test_media_url_fits_column() {
        let input = MediaFileInput {
            file_name: "sermon.mp3".to_string(),
            url: format!("https://cdn.example.org/{}", "a".repeat(1024)),
            mime_type: "audio/mpeg".to_string(),
            size_bytes: 0,
            alt_text: None,
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("url"));
    }
}
