//! Database query functions for the `exercises` library.

use anyhow::{Context, Result};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::classify;
use crate::models::{Exercise, NewExercise};

const COLUMNS: &str =
    "id, name, health_specialist_id, reps, sets, description, exercise_type, created_at";

/// Insert an exercise unless one with the same (name, specialist) exists.
///
/// Returns `None` when the natural key is taken.
pub async fn insert_exercise_if_absent<'e>(
    executor: impl PgExecutor<'e>,
    new: &NewExercise<'_>,
) -> Result<Option<Exercise>> {
    let exercise = sqlx::query_as::<_, Exercise>(&format!(
        "INSERT INTO exercises (name, health_specialist_id, reps, sets, description, exercise_type) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (name, health_specialist_id) DO NOTHING \
         RETURNING {COLUMNS}"
    ))
    .bind(new.name)
    .bind(new.health_specialist_id)
    .bind(new.reps)
    .bind(new.sets)
    .bind(new.description)
    .bind(new.exercise_type)
    .fetch_optional(executor)
    .await
    .map_err(classify)
    .with_context(|| format!("failed to insert exercise {:?}", new.name))?;

    Ok(exercise)
}

/// Fetch an exercise by its natural key.
pub async fn find_exercise_by_name_and_owner<'e>(
    executor: impl PgExecutor<'e>,
    name: &str,
    health_specialist_id: &str,
) -> Result<Option<Exercise>> {
    let exercise = sqlx::query_as::<_, Exercise>(&format!(
        "SELECT {COLUMNS} FROM exercises WHERE name = $1 AND health_specialist_id = $2"
    ))
    .bind(name)
    .bind(health_specialist_id)
    .fetch_optional(executor)
    .await
    .with_context(|| format!("failed to look up exercise {name:?}"))?;

    Ok(exercise)
}

/// Fetch every exercise whose ID is in `ids`.
pub async fn get_exercises<'e>(
    executor: impl PgExecutor<'e>,
    ids: &[Uuid],
) -> Result<Vec<Exercise>> {
    let exercises = sqlx::query_as::<_, Exercise>(&format!(
        "SELECT {COLUMNS} FROM exercises WHERE id = ANY($1) ORDER BY name"
    ))
    .bind(ids)
    .fetch_all(executor)
    .await
    .context("failed to fetch exercises")?;

    Ok(exercises)
}
