//! Database query functions for the `daily_plans` table.

use anyhow::{Context, Result};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::classify;
use crate::models::DailyPlan;

/// Insert a day belonging to `plan_id`.
pub async fn insert_daily_plan<'e>(
    executor: impl PgExecutor<'e>,
    plan_id: Uuid,
    day_index: i32,
    health_specialist_id: &str,
) -> Result<DailyPlan> {
    let day = sqlx::query_as::<_, DailyPlan>(
        "INSERT INTO daily_plans (plan_id, day_index, health_specialist_id) \
         VALUES ($1, $2, $3) \
         RETURNING id, plan_id, day_index, health_specialist_id, created_at",
    )
    .bind(plan_id)
    .bind(day_index)
    .bind(health_specialist_id)
    .fetch_one(executor)
    .await
    .map_err(classify)
    .with_context(|| format!("failed to insert day {day_index} of plan {plan_id}"))?;

    Ok(day)
}

/// List the days of a plan in insertion order.
pub async fn list_daily_plans_for_plan<'e>(
    executor: impl PgExecutor<'e>,
    plan_id: Uuid,
) -> Result<Vec<DailyPlan>> {
    let days = sqlx::query_as::<_, DailyPlan>(
        "SELECT id, plan_id, day_index, health_specialist_id, created_at \
         FROM daily_plans WHERE plan_id = $1 ORDER BY seq ASC",
    )
    .bind(plan_id)
    .fetch_all(executor)
    .await
    .context("failed to list daily plans")?;

    Ok(days)
}
