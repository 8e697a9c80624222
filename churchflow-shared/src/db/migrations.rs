/// Schema migrations
///
/// The SQL files under `churchflow-shared/migrations/` are embedded at compile
/// time with `sqlx::migrate!`, so the API server, the seed loader and the
/// integration tests all apply the same schema. Files are forward-only.
///
/// # Example
///
/// ```no_run
/// use churchflow_shared::db::pool::{create_pool, DatabaseConfig};
/// use churchflow_shared::db::migrations::{run_migrations, get_migration_status};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::from_url(std::env::var("DATABASE_URL")?)).await?;
/// run_migrations(&pool).await?;
///
/// let status = get_migration_status(&pool).await?;
/// assert!(status.is_up_to_date);
/// # Ok(())
/// # }
/// ```

use sqlx::{migrate::MigrateDatabase, migrate::Migrator, postgres::PgPool, Postgres};
use tracing::{debug, error, info};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// What `_sqlx_migrations` says about the schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied_migrations: usize,
    pub embedded_migrations: usize,
    pub latest_version: Option<i64>,
    pub is_up_to_date: bool,
}

/// Applies every embedded migration not yet recorded in the database
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!(
        embedded = MIGRATOR.migrations.len(),
        "Applying database migrations"
    );

    MIGRATOR.run(pool).await.map_err(|e| {
        error!(error = %e, "Database migration failed");
        e
    })?;

    info!("Database schema is up to date");
    Ok(())
}

/// Number of migrations compiled into this binary
pub fn embedded_migration_count() -> usize {
    MIGRATOR.migrations.len()
}

/// Compares applied migrations against the embedded set
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public' AND table_name = '_sqlx_migrations'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    let embedded = embedded_migration_count();

    if !table_exists {
        debug!("_sqlx_migrations does not exist yet");
        return Ok(MigrationStatus {
            applied_migrations: 0,
            embedded_migrations: embedded,
            latest_version: None,
            is_up_to_date: embedded == 0,
        });
    }

    let (applied, latest): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success = true",
    )
    .fetch_one(pool)
    .await?;

    let applied = applied.max(0) as usize;

    Ok(MigrationStatus {
        applied_migrations: applied,
        embedded_migrations: embedded,
        latest_version: latest,
        is_up_to_date: applied >= embedded,
    })
}

/// Creates the database named in `database_url` when it is missing
///
/// Only the seed loader and tests call this; the API server expects the
/// database to exist.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(database_url).await? {
        debug!("Database already exists");
        return Ok(());
    }

    info!("Creating database");
    Postgres::create_database(database_url).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_embedded() {
        assert!(embedded_migration_count() >= 7);
    }

    #[test]
    fn test_embedded_versions_are_ordered() {
        let versions: Vec<i64> = MIGRATOR.migrations.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        assert_eq!(versions, sorted);
    }
}
