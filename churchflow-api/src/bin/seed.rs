//! Loads the demo church
//!
//! ```bash
//! cargo run -p churchflow-api --bin churchflow-seed
//! ```
//!
//! `SEED_ADMIN_EMAIL`, `SEED_ADMIN_PASSWORD` and `SEED_ADMIN_NAME` override
//! the demo admin. Safe to run repeatedly.

use churchflow_shared::{
    db::{
        migrations::{ensure_database_exists, run_migrations},
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    seed::{self, SeedOptions},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "churchflow_shared=info,churchflow_seed=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

    ensure_database_exists(&database_url).await?;
    let pool = create_pool(DatabaseConfig::from_url(database_url)).await?;
    run_migrations(&pool).await?;

    let defaults = SeedOptions::default();
    let options = SeedOptions {
        admin_email: std::env::var("SEED_ADMIN_EMAIL").unwrap_or(defaults.admin_email),
        admin_password: std::env::var("SEED_ADMIN_PASSWORD").unwrap_or(defaults.admin_password),
        admin_name: std::env::var("SEED_ADMIN_NAME").unwrap_or(defaults.admin_name),
    };

    let report = seed::run(&pool, &options).await?;
    tracing::info!(
        church = %report.church_slug,
        admin = %report.admin_email,
        created = report.created_church,
        members = report.members,
        events = report.events,
        "Seed complete"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    close_pool(pool).await;
    Ok(())
}
