//! Database query functions for the `meal_maps` and `exercise_maps` tables.
//!
//! Both tables share one shape; [`PlanKind`] selects the table and its item
//! column. Table and column names come from `PlanKind`, never from input.

use anyhow::{Context, Result};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::classify;
use crate::models::{PlanKind, RelationMap};

/// Append a relation row. No uniqueness is enforced on the triple.
pub async fn insert_relation_map<'e>(
    executor: impl PgExecutor<'e>,
    kind: PlanKind,
    plan_id: Uuid,
    daily_plan_id: Uuid,
    item_id: Uuid,
) -> Result<RelationMap> {
    let table = kind.map_table();
    let column = kind.item_column();
    let map = sqlx::query_as::<_, RelationMap>(&format!(
        "INSERT INTO {table} (plan_id, daily_plan_id, {column}) \
         VALUES ($1, $2, $3) \
         RETURNING id, plan_id, daily_plan_id, {column} AS item_id, created_at"
    ))
    .bind(plan_id)
    .bind(daily_plan_id)
    .bind(item_id)
    .fetch_one(executor)
    .await
    .map_err(classify)
    .with_context(|| format!("failed to link {kind} {item_id} to day {daily_plan_id}"))?;

    Ok(map)
}

/// List the relation rows of a plan in insertion order.
pub async fn list_relation_maps_for_plan<'e>(
    executor: impl PgExecutor<'e>,
    kind: PlanKind,
    plan_id: Uuid,
) -> Result<Vec<RelationMap>> {
    let table = kind.map_table();
    let column = kind.item_column();
    let maps = sqlx::query_as::<_, RelationMap>(&format!(
        "SELECT id, plan_id, daily_plan_id, {column} AS item_id, created_at \
         FROM {table} WHERE plan_id = $1 ORDER BY seq ASC"
    ))
    .bind(plan_id)
    .fetch_all(executor)
    .await
    .context("failed to list relation maps")?;

    Ok(maps)
}
