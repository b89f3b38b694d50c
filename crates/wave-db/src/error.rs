//! Classification of database errors that callers need to tell apart.
//!
//! Query functions return `anyhow::Result`; a unique-constraint violation is
//! wrapped as [`UniqueViolation`] so it can be recovered with
//! `anyhow::Error::downcast_ref` through any added context.

use thiserror::Error;

/// Constraint guarding the one-plan-per-patient-per-kind invariant.
pub const PLAN_PATIENT_KIND_KEY: &str = "plans_patient_id_kind_key";

/// Natural-key constraint on the `meals` table.
pub const MEAL_NAME_OWNER_KEY: &str = "meals_name_health_specialist_id_key";

/// Natural-key constraint on the `exercises` table.
pub const EXERCISE_NAME_OWNER_KEY: &str = "exercises_name_health_specialist_id_key";

/// A write was rejected by a `UNIQUE` constraint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unique constraint {constraint:?} violated")]
pub struct UniqueViolation {
    /// Name of the violated constraint, empty if the server did not report it.
    pub constraint: String,
}

impl UniqueViolation {
    pub fn new(constraint: impl Into<String>) -> Self {
        Self {
            constraint: constraint.into(),
        }
    }

    /// Find a unique violation anywhere in an error chain.
    pub fn find(err: &anyhow::Error) -> Option<&UniqueViolation> {
        err.chain().find_map(|e| e.downcast_ref::<UniqueViolation>())
    }
}

/// Convert a driver error, lifting unique violations into [`UniqueViolation`].
pub fn classify(err: sqlx::Error) -> anyhow::Error {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or_default().to_owned();
            return anyhow::Error::new(UniqueViolation { constraint });
        }
    }
    anyhow::Error::new(err)
}
