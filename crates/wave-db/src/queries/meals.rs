//! Database query functions for the `meals` library.

use anyhow::{Context, Result};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::classify;
use crate::models::{Meal, NewMeal};

const COLUMNS: &str =
    "id, name, health_specialist_id, ingredients, cals, description, meal_type, created_at";

/// Insert a meal unless one with the same (name, specialist) already exists.
///
/// Returns `None` when the natural key is taken, including by a concurrent
/// transaction that committed first. Callers re-read with
/// [`find_meal_by_name_and_owner`].
pub async fn insert_meal_if_absent<'e>(
    executor: impl PgExecutor<'e>,
    new: &NewMeal<'_>,
) -> Result<Option<Meal>> {
    let meal = sqlx::query_as::<_, Meal>(&format!(
        "INSERT INTO meals (name, health_specialist_id, ingredients, cals, description, meal_type) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (name, health_specialist_id) DO NOTHING \
         RETURNING {COLUMNS}"
    ))
    .bind(new.name)
    .bind(new.health_specialist_id)
    .bind(new.ingredients)
    .bind(new.cals)
    .bind(new.description)
    .bind(new.meal_type)
    .fetch_optional(executor)
    .await
    .map_err(classify)
    .with_context(|| format!("failed to insert meal {:?}", new.name))?;

    Ok(meal)
}

/// Fetch a meal by its natural key.
pub async fn find_meal_by_name_and_owner<'e>(
    executor: impl PgExecutor<'e>,
    name: &str,
    health_specialist_id: &str,
) -> Result<Option<Meal>> {
    let meal = sqlx::query_as::<_, Meal>(&format!(
        "SELECT {COLUMNS} FROM meals WHERE name = $1 AND health_specialist_id = $2"
    ))
    .bind(name)
    .bind(health_specialist_id)
    .fetch_optional(executor)
    .await
    .with_context(|| format!("failed to look up meal {name:?}"))?;

    Ok(meal)
}

/// Fetch every meal whose ID is in `ids`.
pub async fn get_meals<'e>(executor: impl PgExecutor<'e>, ids: &[Uuid]) -> Result<Vec<Meal>> {
    let meals = sqlx::query_as::<_, Meal>(&format!(
        "SELECT {COLUMNS} FROM meals WHERE id = ANY($1) ORDER BY name"
    ))
    .bind(ids)
    .fetch_all(executor)
    .await
    .context("failed to fetch meals")?;

    Ok(meals)
}
