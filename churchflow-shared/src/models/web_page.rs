/// Website pages
///
/// `content` is a JSONB array of content blocks (see `crate::website`).
/// Slugs are unique per church; the public site serves only published pages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::non_blank;
use crate::website::ContentBlock;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WebPage {
    pub id: Uuid,
    pub church_id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: Json<Vec<ContentBlock>>,
    pub is_published: bool,
    pub seo_description: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Navigation entry for the public site
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PageLink {
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct WebPageInput {
    #[validate(length(min = 1, max = 255, message = "Title is required"))]
    pub title: String,
    /// Derived from the title when omitted
    pub slug: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub is_published: bool,
    #[validate(length(max = 320))]
    pub seo_description: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

impl WebPageInput {
    /// Slug to store: the given one or one built from the title
    pub fn resolved_slug(&self) -> String {
        let source = self
            .slug
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.title);
        let slug = crate::models::church::slugify(source);
        if slug == "church" && !source.trim().eq_ignore_ascii_case("church") {
            "page".to_string()
        } else {
            slug
        }
    }
}

impl WebPage {
    pub async fn create(pool: &PgPool, church_id: Uuid, data: WebPageInput) -> Result<Self, sqlx::Error> {
        let slug = data.resolved_slug();

        sqlx::query_as::<_, WebPage>(
            r#"
            INSERT INTO web_pages (church_id, title, slug, content, is_published, seo_description, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(data.title.trim())
        .bind(slug)
        .bind(Json(&data.content))
        .bind(data.is_published)
        .bind(non_blank(data.seo_description))
        .bind(data.sort_order)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        church_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, WebPage>("SELECT * FROM web_pages WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_published(
        pool: &PgPool,
        church_id: Uuid,
        slug: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, WebPage>(
            "SELECT * FROM web_pages WHERE church_id = $1 AND slug = $2 AND is_published",
        )
        .bind(church_id)
        .bind(slug.to_lowercase())
        .fetch_optional(pool)
        .await
    }

    pub async fn list(pool: &PgPool, church_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, WebPage>(
            "SELECT * FROM web_pages WHERE church_id = $1 ORDER BY sort_order ASC, title ASC",
        )
        .bind(church_id)
        .fetch_all(pool)
        .await
    }

    pub async fn published_links(pool: &PgPool, church_id: Uuid) -> Result<Vec<PageLink>, sqlx::Error> {
        sqlx::query_as::<_, PageLink>(
            r#"
            SELECT title, slug FROM web_pages
            WHERE church_id = $1 AND is_published
            ORDER BY sort_order ASC, title ASC
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
        data: WebPageInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        let slug = data.resolved_slug();

        sqlx::query_as::<_, WebPage>(
            r#"
            UPDATE web_pages
            SET title = $3,
                slug = $4,
                content = $5,
                is_published = $6,
                seo_description = $7,
                sort_order = $8,
                updated_at = NOW()
            WHERE church_id = $1 AND id = $2
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(id)
        .bind(data.title.trim())
        .bind(slug)
        .bind(Json(&data.content))
        .bind(data.is_published)
        .bind(non_blank(data.seo_description))
        .bind(data.sort_order)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, church_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM web_pages WHERE church_id = $1 AND id = $2")
            .bind(church_id)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(pool: &PgPool, church_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM web_pages WHERE church_id = $1")
            .bind(church_id)
            .fetch_one(pool)
            .await
    }

    /// Inserts the page unless the slug already exists
    pub async fn ensure(pool: &PgPool, church_id: Uuid, data: WebPageInput) -> Result<Self, sqlx::Error> {
        let slug = data.resolved_slug();

        sqlx::query_as::<_, WebPage>(
            r#"
            INSERT INTO web_pages (church_id, title, slug, content, is_published, seo_description, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (church_id, slug) DO UPDATE SET slug = EXCLUDED.slug
            RETURNING *
            "#,
        )
        .bind(church_id)
        .bind(data.title.trim())
        .bind(slug)
        .bind(Json(&data.content))
        .bind(data.is_published)
        .bind(non_blank(data.seo_description))
        .bind(data.sort_order)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: &str, slug: Option<&str>) -> WebPageInput {
        WebPageInput {
            title: title.to_string(),
            slug: slug.map(str::to_string),
            content: Vec::new(),
            is_published: false,
            seo_description: None,
            sort_order: 0,
        }
    }

    #[test]
    fn test_resolved_slug_from_title() {
        assert_eq!(input("About Us", None).resolved_slug(), "about-us");
        assert_eq!(input("About Us", Some("  ")).resolved_slug(), "about-us");
    }

    #[test]
    fn test_resolved_slug_prefers_explicit() {
        assert_eq!(input("About Us", Some("Who We Are")).resolved_slug(), "who-we-are");
    }

    #[test]
    fn test_resolved_slug_fallback() {
        assert_eq!(input("???", None).resolved_slug(), "page");
    }
}
