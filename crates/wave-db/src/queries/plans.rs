//! Database query functions for the `plans` table.
//!
//! Every function takes any Postgres executor so the same statements run
//! against the pool or inside a provisioning transaction.

use anyhow::{Context, Result};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::error::classify;
use crate::models::{Plan, PlanKind};

/// Insert a new plan row. Returns the inserted plan with server-generated
/// defaults (id, created_at).
///
/// A second plan for the same (patient, kind) is rejected by
/// `plans_patient_id_kind_key`; the error carries a
/// [`crate::error::UniqueViolation`].
pub async fn insert_plan<'e>(
    executor: impl PgExecutor<'e>,
    kind: PlanKind,
    health_specialist_id: &str,
    patient_id: &str,
) -> Result<Plan> {
    let plan = sqlx::query_as::<_, Plan>(
        "INSERT INTO plans (kind, health_specialist_id, patient_id) \
         VALUES ($1, $2, $3) \
         RETURNING id, kind, health_specialist_id, patient_id, created_at",
    )
    .bind(kind)
    .bind(health_specialist_id)
    .bind(patient_id)
    .fetch_one(executor)
    .await
    .map_err(classify)
    .with_context(|| format!("failed to insert {kind} plan for patient {patient_id:?}"))?;

    Ok(plan)
}

/// Fetch a plan by its ID.
pub async fn get_plan<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>(
        "SELECT id, kind, health_specialist_id, patient_id, created_at \
         FROM plans WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(executor)
    .await
    .context("failed to fetch plan")?;

    Ok(plan)
}

/// Fetch the plan of the given kind held by a patient, if any.
pub async fn find_plan_for_patient<'e>(
    executor: impl PgExecutor<'e>,
    patient_id: &str,
    kind: PlanKind,
) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>(
        "SELECT id, kind, health_specialist_id, patient_id, created_at \
         FROM plans WHERE patient_id = $1 AND kind = $2",
    )
    .bind(patient_id)
    .bind(kind)
    .fetch_optional(executor)
    .await
    .with_context(|| format!("failed to look up {kind} plan for patient {patient_id:?}"))?;

    Ok(plan)
}
