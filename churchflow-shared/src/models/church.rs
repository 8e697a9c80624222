/// Church (tenant root) model
///
/// A church owns every other tenant-scoped row. Besides its profile and
/// branding it carries the subscription tier that drives plan limits and the
/// list of enabled modules that gates whole route groups.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE churches (
///     id UUID PRIMARY KEY,
///     name VARCHAR(255) NOT NULL,
///     slug VARCHAR(100) NOT NULL UNIQUE,
///     timezone VARCHAR(64) NOT NULL DEFAULT 'UTC',
///     -- contact + branding columns ...
///     subscription_tier subscription_tier NOT NULL DEFAULT 'free',
///     subscription_status subscription_status NOT NULL DEFAULT 'trialing',
///     enabled_modules TEXT[] NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL
/// );
/// ```

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::church_user::ChurchRole;

/// Longest slug generated from a church name (before any suffix)
const MAX_SLUG_BASE_LENGTH: usize = 60;

/// Attempts at finding a free slug before giving up
const SLUG_ATTEMPTS: usize = 5;

/// Width of the `churches` column behind an editable text field
pub fn column_limit(field: &str) -> Option<usize> {
    match field {
        "postal_code" => Some(20),
        "phone" => Some(50),
        "timezone" => Some(64),
        "city" | "state" | "country" => Some(100),
        "name" | "email" | "address" | "tagline" => Some(255),
        "website_url" | "logo_url" => Some(512),
        "primary_color" => Some(16),
        _ => None,
    }
}

/// First field whose trimmed value is wider than its column
pub fn overlong_field<'a>(
    fields: impl IntoIterator<Item = (&'static str, Option<&'a str>)>,
) -> Option<(&'static str, usize)> {
    fields.into_iter().find_map(|(field, value)| {
        let max = column_limit(field)?;
        let len = value.map(|v| v.trim().chars().count()).unwrap_or(0);
        (len > max).then_some((field, max))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_tier", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionTier {
    Free,
    Starter,
    Growth,
    Enterprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
}

/// Feature areas a church can switch on or off
///
/// Stored as snake_case strings in `churches.enabled_modules`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChurchModule {
    Members,
    Events,
    Donations,
    Volunteers,
    Communications,
    Groups,
    Website,
    CheckIn,
    PrayerRequests,
}

impl ChurchModule {
    pub const ALL: [ChurchModule; 9] = [
        ChurchModule::Members,
        ChurchModule::Events,
        ChurchModule::Donations,
        ChurchModule::Volunteers,
        ChurchModule::Communications,
        ChurchModule::Groups,
        ChurchModule::Website,
        ChurchModule::CheckIn,
        ChurchModule::PrayerRequests,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChurchModule::Members => "members",
            ChurchModule::Events => "events",
            ChurchModule::Donations => "donations",
            ChurchModule::Volunteers => "volunteers",
            ChurchModule::Communications => "communications",
            ChurchModule::Groups => "groups",
            ChurchModule::Website => "website",
            ChurchModule::CheckIn => "check_in",
            ChurchModule::PrayerRequests => "prayer_requests",
        }
    }
}

impl fmt::Display for ChurchModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChurchModule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChurchModule::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown module '{}'", s))
    }
}

/// Deduplicates while keeping first-seen order
pub fn module_names(modules: &[ChurchModule]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(modules.len());
    for module in modules {
        let name = module.as_str().to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Church {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub timezone: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub website_url: Option<String>,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub tagline: Option<String>,
    pub subscription_tier: SubscriptionTier,
    pub subscription_status: SubscriptionStatus,
    pub enabled_modules: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Church {
    /// Enabled modules; unknown names left over from older releases are skipped
    pub fn modules(&self) -> Vec<ChurchModule> {
        self.enabled_modules
            .iter()
            .filter_map(|name| name.parse().ok())
            .collect()
    }

    pub fn has_module(&self, module: ChurchModule) -> bool {
        self.enabled_modules.iter().any(|m| m == module.as_str())
    }
}

/// Input for a new church, produced by the onboarding wizard
#[derive(Debug, Clone, Deserialize)]
pub struct CreateChurch {
    pub name: String,
    pub timezone: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub website_url: Option<String>,
    pub enabled_modules: Vec<ChurchModule>,
}

/// Full replacement of the editable church settings
///
/// `enabled_modules: None` leaves the module list untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateChurch {
    pub name: String,
    pub timezone: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub website_url: Option<String>,
    pub logo_url: Option<String>,
    pub primary_color: Option<String>,
    pub tagline: Option<String>,
    pub enabled_modules: Option<Vec<ChurchModule>>,
}

/// Lowercase ASCII slug made of `[a-z0-9-]`
///
/// Runs of other characters collapse to one hyphen; leading and trailing
/// hyphens are dropped. Falls back to `"church"` when nothing survives.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }

        if slug.len() >= MAX_SLUG_BASE_LENGTH {
            break;
        }
    }

    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "church".to_string()
    } else {
        slug
    }
}

fn slug_with_suffix(base: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("{}-{}", base, suffix)
}

impl Church {
    /// Creates the church and makes `owner_id` its OWNER in one transaction
    ///
    /// The slug is derived from the name; if it is taken a short random
    /// suffix is appended.
    pub async fn create_with_owner(
        pool: &PgPool,
        data: CreateChurch,
        owner_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let base = slugify(&data.name);
        let slug = Self::available_slug(pool, &base).await?;

        let mut tx = pool.begin().await?;

        let church = sqlx::query_as::<_, Church>(
            r#"
            INSERT INTO churches (
                name, slug, timezone, email, phone, address, city, state,
                postal_code, country, website_url, enabled_modules
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(data.name.trim())
        .bind(&slug)
        .bind(&data.timezone)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(&data.address)
        .bind(&data.city)
        .bind(&data.state)
        .bind(&data.postal_code)
        .bind(&data.country)
        .bind(&data.website_url)
        .bind(module_names(&data.enabled_modules))
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO church_users (church_id, user_id, role) VALUES ($1, $2, $3)")
            .bind(church.id)
            .bind(owner_id)
            .bind(ChurchRole::Owner)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(church_id = %church.id, slug = %church.slug, "Church created");
        Ok(church)
    }

    async fn available_slug(pool: &PgPool, base: &str) -> Result<String, sqlx::Error> {
        let mut candidate = base.to_string();

        for _ in 0..SLUG_ATTEMPTS {
            if !Self::slug_exists(pool, &candidate).await? {
                return Ok(candidate);
            }
            candidate = slug_with_suffix(base);
        }

        // Let the unique constraint report the conflict
        Ok(candidate)
    }

    pub async fn slug_exists(pool: &PgPool, slug: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM churches WHERE slug = $1)")
            .bind(slug)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Church>("SELECT * FROM churches WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Church>("SELECT * FROM churches WHERE slug = $1")
            .bind(slug.to_lowercase())
            .fetch_optional(pool)
            .await
    }

    /// Churches the user belongs to, oldest membership first
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Church>(
            r#"
            SELECT c.*
            FROM churches c
            JOIN church_users cu ON cu.church_id = c.id
            WHERE cu.user_id = $1
            ORDER BY cu.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateChurch,
    ) -> Result<Option<Self>, sqlx::Error> {
        let modules = data.enabled_modules.as_deref().map(module_names);

        sqlx::query_as::<_, Church>(
            r#"
            UPDATE churches
            SET name = $2,
                timezone = $3,
                email = $4,
                phone = $5,
                address = $6,
                city = $7,
                state = $8,
                postal_code = $9,
                country = $10,
                website_url = $11,
                logo_url = $12,
                primary_color = $13,
                tagline = $14,
                enabled_modules = COALESCE($15, enabled_modules),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.name.trim())
        .bind(&data.timezone)
        .bind(&data.email)
        .bind(&data.phone)
        .bind(&data.address)
        .bind(&data.city)
        .bind(&data.state)
        .bind(&data.postal_code)
        .bind(&data.country)
        .bind(&data.website_url)
        .bind(&data.logo_url)
        .bind(&data.primary_color)
        .bind(&data.tagline)
        .bind(modules)
        .fetch_optional(pool)
        .await
    }

    pub async fn update_subscription(
        pool: &PgPool,
        id: Uuid,
        tier: SubscriptionTier,
        status: SubscriptionStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Church>(
            r#"
            UPDATE churches
            SET subscription_tier = $2, subscription_status = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tier)
        .bind(status)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM churches WHERE id = $1")
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
    fn test_slugify() {
        assert_eq!(slugify("Grace Community Church"), "grace-community-church");
        assert_eq!(slugify("  St. Mary's  "), "st-mary-s");
        assert_eq!(slugify("First Baptist -- Downtown!"), "first-baptist-downtown");
        assert_eq!(slugify("Église Réformée"), "glise-r-form-e");
        assert_eq!(slugify("!!!"), "church");
    }

    #[test]
    fn test_slugify_limits_length() {
        let long = "a".repeat(200);
        assert!(slugify(&long).len() <= MAX_SLUG_BASE_LENGTH);
    }

    #[test]
    fn test_overlong_field_uses_column_widths() {
        let postal = "9".repeat(21);
        let city = "c".repeat(100);
        assert_eq!(
            overlong_field([("city", Some(city.as_str())), ("postal_code", Some(postal.as_str()))]),
            Some(("postal_code", 20))
        );
        assert_eq!(overlong_field([("city", Some(city.as_str())), ("phone", None)]), None);
        assert_eq!(column_limit("unknown"), None);
    }

    #[test]
    fn test_slug_with_suffix() {
        let slug = slug_with_suffix("grace");
        assert!(slug.starts_with("grace-"));
        assert_eq!(slug.len(), "grace-".len() + 5);
        assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn test_module_round_trip_names() {
        for module in ChurchModule::ALL {
            assert_eq!(module.as_str().parse::<ChurchModule>().unwrap(), module);
            assert_eq!(
                serde_json::to_value(module).unwrap(),
                serde_json::Value::String(module.as_str().to_string())
            );
        }
        assert!("billing".parse::<ChurchModule>().is_err());
    }

    #[test]
    fn test_module_names_dedupes() {
        let names = module_names(&[
            ChurchModule::Events,
            ChurchModule::Members,
            ChurchModule::Events,
        ]);
        assert_eq!(names, vec!["events", "members"]);
    }

    #[test]
    fn test_tier_serializes_screaming_case() {
        assert_eq!(
            serde_json::to_string(&SubscriptionTier::Growth).unwrap(),
            "\"GROWTH\""
        );
        assert_eq!(
            serde_json::to_string(&SubscriptionStatus::PastDue).unwrap(),
            "\"PAST_DUE\""
        );
    }
}
