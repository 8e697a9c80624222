//! Demo data
//!
//! Creates one church with an admin login and enough sample records to click
//! through every module. Every write is an upsert keyed on a natural key
//! (slug, email, name), so running the seed twice changes nothing.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::password::{hash_password, PasswordError};
use crate::models::church::{slugify, Church, ChurchModule, CreateChurch};
use crate::models::church_user::{ChurchRole, ChurchUser};
use crate::models::communication::{CommunicationChannel, MessageTemplate, TemplateInput};
use crate::models::donation::{DonationFund, FundInput};
use crate::models::event::{Event, EventInput};
use crate::models::group::{Group, GroupInput};
use crate::models::member::{Member, MemberInput, MemberStatus};
use crate::models::user::{CreateUser, User};
use crate::models::web_page::{WebPage, WebPageInput};
use crate::website::{
    BlockContent, ContactBlock, ContentBlock, DonationBlock, EventsBlock, HeroBlock, TextBlock,
};

pub const DEMO_CHURCH_NAME: &str = "Grace Community Church";
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@churchflow.dev";
pub const DEFAULT_ADMIN_PASSWORD: &str = "churchflow2024";

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Password error: {0}")]
    Password(#[from] PasswordError),
}

#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub admin_email: String,
    pub admin_password: String,
    pub admin_name: String,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            admin_name: "Demo Admin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub church_id: Uuid,
    pub church_slug: String,
    pub admin_email: String,
    pub created_church: bool,
    pub members: usize,
    pub groups: usize,
    pub events: usize,
    pub funds: usize,
    pub templates: usize,
    pub pages: usize,
}

pub async fn run(pool: &PgPool, options: &SeedOptions) -> Result<SeedReport, SeedError> {
    let admin = ensure_admin(pool, options).await?;
    let (church, created_church) = ensure_church(pool, admin.id).await?;
    ChurchUser::add(pool, church.id, admin.id, ChurchRole::Owner).await?;

    let members = seed_members(pool, church.id).await?;
    let groups = seed_groups(pool, church.id, &members).await?;
    let events = seed_events(pool, church.id).await?;
    let funds = seed_funds(pool, church.id).await?;
    let templates = seed_templates(pool, church.id).await?;
    let pages = seed_pages(pool, church.id).await?;

    let report = SeedReport {
        church_id: church.id,
        church_slug: church.slug,
        admin_email: admin.email,
        created_church,
        members: members.len(),
        groups,
        events,
        funds,
        templates,
        pages,
    };

    tracing::info!(
        church_id = %report.church_id,
        slug = %report.church_slug,
        created = report.created_church,
        "Seed complete"
    );

    Ok(report)
}

async fn ensure_admin(pool: &PgPool, options: &SeedOptions) -> Result<User, SeedError> {
    if let Some(user) = User::find_by_email(pool, &options.admin_email).await? {
        return Ok(user);
    }

    let user = User::create(
        pool,
        CreateUser {
            email: options.admin_email.clone(),
            password_hash: hash_password(&options.admin_password)?,
            name: Some(options.admin_name.clone()),
        },
    )
    .await?;

    tracing::info!(email = %user.email, "Created seed admin");
    Ok(user)
}

async fn ensure_church(pool: &PgPool, owner_id: Uuid) -> Result<(Church, bool), SeedError> {
    if let Some(church) = Church::find_by_slug(pool, &slugify(DEMO_CHURCH_NAME)).await? {
        return Ok((church, false));
    }

    let church = Church::create_with_owner(
        pool,
        CreateChurch {
            name: DEMO_CHURCH_NAME.to_string(),
            timezone: "America/Chicago".to_string(),
            email: Some("hello@gracecommunity.org".to_string()),
            phone: Some("(555) 010-4477".to_string()),
            address: Some("1200 Main Street".to_string()),
            city: Some("Springfield".to_string()),
            state: Some("IL".to_string()),
            postal_code: Some("62701".to_string()),
            country: Some("US".to_string()),
            website_url: None,
            enabled_modules: ChurchModule::ALL.to_vec(),
        },
        owner_id,
    )
    .await?;

    Ok((church, true))
}

async fn seed_members(pool: &PgPool, church_id: Uuid) -> Result<Vec<Member>, SeedError> {
    let people = [
        ("Ruth", "Alvarez", "ruth.alvarez@example.org", MemberStatus::Member),
        ("Samuel", "Okafor", "samuel.okafor@example.org", MemberStatus::Member),
        ("Hannah", "Lee", "hannah.lee@example.org", MemberStatus::Regular),
        ("Daniel", "Brooks", "daniel.brooks@example.org", MemberStatus::Regular),
        ("Esther", "Nguyen", "esther.nguyen@example.org", MemberStatus::Visitor),
        ("Caleb", "Martin", "caleb.martin@example.org", MemberStatus::Inactive),
    ];

    let mut members = Vec::with_capacity(people.len());
    for (first_name, last_name, email, status) in people {
        let (member, _) = Member::upsert(
            pool,
            church_id,
            MemberInput {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                email: Some(email.to_string()),
                status,
                ..Default::default()
            },
        )
        .await?;
        members.push(member);
    }

    Ok(members)
}

async fn seed_groups(pool: &PgPool, church_id: Uuid, members: &[Member]) -> Result<usize, SeedError> {
    let groups = [
        ("Worship Team", "ministry", "Thursdays 7pm"),
        ("Young Adults", "small_group", "Fridays 7:30pm"),
        ("Men's Breakfast", "fellowship", "First Saturday 8am"),
    ];

    for (index, (name, category, schedule)) in groups.iter().enumerate() {
        let group = Group::ensure(
            pool,
            church_id,
            GroupInput {
                name: name.to_string(),
                description: None,
                category: Some(category.to_string()),
                leader_id: None,
                meeting_schedule: Some(schedule.to_string()),
                is_active: true,
            },
        )
        .await?;

        for member in members.iter().skip(index).step_by(2) {
            Group::add_member(pool, church_id, group.id, member.id, "member").await?;
        }
    }

    Ok(groups.len())
}

fn anchor(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Recurring events with fixed anchors, so repeated seeds find the same rows
async fn seed_events(pool: &PgPool, church_id: Uuid) -> Result<usize, SeedError> {
    let events = [
        EventInput {
            title: "Sunday Service".to_string(),
            description: Some("Worship, teaching and kids' church.".to_string()),
            location: Some("Main Sanctuary".to_string()),
            category: Some("service".to_string()),
            starts_at: anchor(2025, 1, 5, 16, 0),
            ends_at: Some(anchor(2025, 1, 5, 17, 30)),
            is_recurring: true,
            recurrence_rule: Some("FREQ=WEEKLY;BYDAY=SU".to_string()),
            check_in_enabled: true,
            is_public: true,
        },
        EventInput {
            title: "Midweek Bible Study".to_string(),
            description: None,
            location: Some("Fellowship Hall".to_string()),
            category: Some("study".to_string()),
            starts_at: anchor(2025, 1, 8, 1, 0),
            ends_at: Some(anchor(2025, 1, 8, 2, 30)),
            is_recurring: true,
            recurrence_rule: Some("FREQ=WEEKLY;BYDAY=WE".to_string()),
            check_in_enabled: true,
            is_public: true,
        },
        EventInput {
            title: "Elders Meeting".to_string(),
            description: None,
            location: Some("Room 204".to_string()),
            category: Some("leadership".to_string()),
            starts_at: anchor(2025, 1, 13, 0, 30),
            ends_at: None,
            is_recurring: true,
            recurrence_rule: Some("FREQ=MONTHLY;BYDAY=2MO".to_string()),
            check_in_enabled: false,
            is_public: false,
        },
    ];

    let count = events.len();
    for event in events {
        Event::ensure(pool, church_id, event).await?;
    }
    Ok(count)
}

async fn seed_funds(pool: &PgPool, church_id: Uuid) -> Result<usize, SeedError> {
    let funds = [
        ("General Fund", None),
        ("Building Fund", Some(25_000_000)),
        ("Missions", Some(5_000_000)),
    ];

    for (name, goal_cents) in funds {
        DonationFund::ensure(
            pool,
            church_id,
            FundInput {
                name: name.to_string(),
                description: None,
                goal_cents,
                is_active: true,
            },
        )
        .await?;
    }
    Ok(funds.len())
}

async fn seed_templates(pool: &PgPool, church_id: Uuid) -> Result<usize, SeedError> {
    let templates = [
        TemplateInput {
            name: "Welcome Visitor".to_string(),
            channel: CommunicationChannel::Email,
            subject: Some("Great to meet you!".to_string()),
            body: "Thanks for visiting us on Sunday. We'd love to see you again.".to_string(),
        },
        TemplateInput {
            name: "Service Reminder".to_string(),
            channel: CommunicationChannel::Sms,
            subject: None,
            body: "Reminder: Sunday service starts at 10am. See you there!".to_string(),
        },
    ];

    let count = templates.len();
    for template in templates {
        MessageTemplate::ensure(pool, church_id, template).await?;
    }
    Ok(count)
}

fn block(id: &str, content: BlockContent) -> ContentBlock {
    ContentBlock {
        id: id.to_string(),
        content,
    }
}

async fn seed_pages(pool: &PgPool, church_id: Uuid) -> Result<usize, SeedError> {
    let home = WebPageInput {
        title: "Home".to_string(),
        slug: Some("home".to_string()),
        content: vec![
            block(
                "hero",
                BlockContent::Hero(HeroBlock {
                    title: Some("Welcome to Grace".to_string()),
                    subtitle: Some("A church for the whole city".to_string()),
                    cta_label: Some("Plan a visit".to_string()),
                    cta_url: Some("/c/grace-community-church/pages/visit".to_string()),
                    ..Default::default()
                }),
            ),
            block(
                "events",
                BlockContent::Events(EventsBlock {
                    heading: Some("This week".to_string()),
                    ..Default::default()
                }),
            ),
            block(
                "give",
                BlockContent::Donation(DonationBlock {
                    heading: Some("Give online".to_string()),
                    ..Default::default()
                }),
            ),
        ],
        is_published: true,
        seo_description: Some("Grace Community Church in Springfield".to_string()),
        sort_order: 0,
    };

    let visit = WebPageInput {
        title: "Plan a Visit".to_string(),
        slug: Some("visit".to_string()),
        content: vec![
            block(
                "intro",
                BlockContent::Text(TextBlock {
                    heading: Some("What to expect".to_string()),
                    body: Some("Services last about 90 minutes. Kids' church runs during the sermon.".to_string()),
                }),
            ),
            block(
                "contact",
                BlockContent::Contact(ContactBlock {
                    email: Some("hello@gracecommunity.org".to_string()),
                    show_map: true,
                    show_prayer_form: true,
                    ..Default::default()
                }),
            ),
        ],
        is_published: true,
        seo_description: None,
        sort_order: 1,
    };

    WebPage::ensure(pool, church_id, home).await?;
    WebPage::ensure(pool, church_id, visit).await?;
    Ok(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::website::validate_blocks;

    #[test]
    fn test_default_options() {
        let options = SeedOptions::default();
        assert_eq!(options.admin_email, DEFAULT_ADMIN_EMAIL);
        assert!(crate::auth::password::validate_password_strength(&options.admin_password).is_ok());
    }

    #[test]
    fn test_demo_slug() {
        assert_eq!(slugify(DEMO_CHURCH_NAME), "grace-community-church");
    }

    #[test]
    fn test_anchor_is_fixed() {
        assert_eq!(anchor(2025, 1, 5, 16, 0), anchor(2025, 1, 5, 16, 0));
        assert_eq!(anchor(2025, 1, 5, 16, 0).to_rfc3339(), "2025-01-05T16:00:00+00:00");
    }

    #[test]
    fn test_seed_blocks_validate() {
        let blocks = vec![
            block("a", BlockContent::Events(EventsBlock::default())),
            block("b", BlockContent::Contact(ContactBlock::default())),
        ];
        assert!(validate_blocks(&blocks).is_ok());
    }
}
