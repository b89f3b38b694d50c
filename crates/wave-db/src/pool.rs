use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tracing::info;

use crate::config::DbConfig;
use crate::models::PlanKind;

/// Migrations embedded at compile time from `crates/wave-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(url)
        .await
        .with_context(|| format!("failed to connect to database at {url}"))
}

/// Create a connection pool sized by `config.max_connections`.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    connect(&config.database_url, config.max_connections).await
}

/// Run all pending embedded migrations against the pool.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;

    info!(migrations = MIGRATOR.iter().count(), "plan schema is up to date");
    Ok(())
}

/// Create the configured database through the `postgres` maintenance
/// database unless it already exists. Returns whether it was created.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<bool> {
    let db_name = config
        .database_name()
        .context("could not determine database name from URL")?;

    let maint_pool = connect(&config.maintenance_url(), 1).await?;
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(db_name)
            .fetch_one(&maint_pool)
            .await
            .context("failed to query pg_database")?;

    if !exists {
        // Identifiers cannot be bound; quote instead.
        let stmt = format!("CREATE DATABASE \"{}\"", db_name.replace('"', "\"\""));
        maint_pool
            .execute(stmt.as_str())
            .await
            .with_context(|| format!("failed to create database {db_name}"))?;
        info!(db = db_name, "database created");
    }

    maint_pool.close().await;
    Ok(!exists)
}

/// Tables of the plan graph: plans and days, then the library and relation
/// table of each item kind.
pub fn plan_tables() -> Vec<&'static str> {
    let mut tables = vec!["plans", "daily_plans"];
    for kind in [PlanKind::Meal, PlanKind::Exercise] {
        tables.push(kind.item_table());
        tables.push(kind.map_table());
    }
    tables
}

/// Row count of every plan-graph table, in [`plan_tables`] order.
///
/// Printed by `wave db-init`.
pub async fn table_counts(pool: &PgPool) -> Result<Vec<(&'static str, i64)>> {
    let mut counts = Vec::new();
    for table in plan_tables() {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .with_context(|| format!("failed to count rows in {table}"))?;
        counts.push((table, count));
    }
    Ok(counts)
}
