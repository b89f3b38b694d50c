//! Errors surfaced by plan provisioning and library-item registration.

use thiserror::Error;
use uuid::Uuid;

use wave_db::error::{PLAN_PATIENT_KIND_KEY, UniqueViolation};
use wave_db::models::PlanKind;

use super::request::ValidationError;

/// Why a plan could not be provisioned. Nothing was persisted in any case.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The request is structurally incomplete; no transaction was opened.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The patient already holds a plan of this kind.
    #[error("patient {patient_id:?} already has an active {kind} plan")]
    Conflict { patient_id: String, kind: PlanKind },

    /// A lookup, write or commit failed; the transaction was rolled back.
    #[error("storage failure")]
    Storage(#[source] anyhow::Error),

    /// The caller cancelled provisioning; the transaction was rolled back.
    #[error("plan provisioning was cancelled")]
    Cancelled,
}

impl ProvisionError {
    /// Whether resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Cancelled)
    }

    /// Classify a failed write or commit.
    ///
    /// A violation of the one-plan-per-patient constraint is the same
    /// conflict the pre-check reports; anything else is a storage fault.
    pub(crate) fn from_write(err: anyhow::Error, patient_id: &str, kind: PlanKind) -> Self {
        match UniqueViolation::find(&err) {
            Some(v) if v.constraint == PLAN_PATIENT_KIND_KEY => Self::Conflict {
                patient_id: patient_id.to_owned(),
                kind,
            },
            _ => Self::Storage(err),
        }
    }
}

/// Why a standalone library item could not be registered.
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An item with the same (name, owner) is already in the library.
    #[error("{kind} {name:?} already exists for specialist {health_specialist_id:?}")]
    AlreadyExists {
        kind: PlanKind,
        name: String,
        health_specialist_id: String,
        id: Uuid,
    },

    #[error("storage failure")]
    Storage(#[source] anyhow::Error),
}
