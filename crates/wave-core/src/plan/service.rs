//! Plan provisioning coordinator.
//!
//! Creates a plan, its days, the library items they reference and the
//! relation rows linking them inside one store transaction. Any failure
//! after the transaction is opened drops it, which rolls every write back.

use std::collections::HashSet;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use wave_db::error::UniqueViolation;
use wave_db::models::LibraryItem;

use super::error::{ProvisionError, RegisterError};
use super::graph::PersistedPlan;
use super::item::LibraryItemSpec;
use super::relation;
use super::request::{PlanRequest, ValidationError};
use super::resolver;
use super::store::{PlanStore, PlanTransaction};

/// Provisions plans and library items against a [`PlanStore`].
#[derive(Debug, Clone)]
pub struct PlanProvisioner<S> {
    store: S,
}

impl<S: PlanStore> PlanProvisioner<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate and persist `request` as one atomic plan graph.
    ///
    /// Either the whole graph is committed or nothing is. The request is
    /// validated before any store access; a patient that already holds a
    /// plan of this kind yields [`ProvisionError::Conflict`] whether that is
    /// seen by the pre-check or by the store's unique constraint.
    pub async fn provision<I: LibraryItemSpec>(
        &self,
        request: PlanRequest<I>,
    ) -> Result<PersistedPlan, ProvisionError> {
        self.run_provision(request, None).await
    }

    /// [`provision`](Self::provision), abandoned if `cancel` fires before
    /// the commit starts.
    ///
    /// A request cancelled while writing leaves nothing behind. A token that
    /// is already cancelled wins before the store is touched. Once the
    /// commit has been issued it runs to completion, so a durable graph is
    /// never reported as cancelled.
    pub async fn provision_with_cancel<I: LibraryItemSpec>(
        &self,
        request: PlanRequest<I>,
        cancel: &CancellationToken,
    ) -> Result<PersistedPlan, ProvisionError> {
        self.run_provision(request, Some(cancel)).await
    }

    async fn run_provision<I: LibraryItemSpec>(
        &self,
        mut request: PlanRequest<I>,
        cancel: Option<&CancellationToken>,
    ) -> Result<PersistedPlan, ProvisionError> {
        request.validate()?;
        request.stamp_ownership();

        let repeated = request.repeated_day_indices();
        if !repeated.is_empty() {
            debug!(
                patient_id = %request.patient_id,
                kind = %I::KIND,
                ?repeated,
                "plan request repeats day indices"
            );
        }

        match self.write_and_commit(&request, cancel).await {
            Ok(persisted) => {
                info!(
                    plan_id = %persisted.plan.id,
                    kind = %I::KIND,
                    patient_id = %request.patient_id,
                    days = persisted.days.len(),
                    items = persisted.items.len(),
                    "plan provisioned"
                );
                Ok(persisted)
            }
            Err(err) => {
                warn!(
                    kind = %I::KIND,
                    patient_id = %request.patient_id,
                    error = %err,
                    "plan provisioning failed, rolled back"
                );
                Err(err)
            }
        }
    }

    /// Write the graph, then commit. Dropping the transaction on any error
    /// or cancellation rolls back.
    async fn write_and_commit<I: LibraryItemSpec>(
        &self,
        request: &PlanRequest<I>,
        cancel: Option<&CancellationToken>,
    ) -> Result<PersistedPlan, ProvisionError> {
        let cancelled = async move {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let write = async {
            let mut tx = self.store.begin().await.map_err(ProvisionError::Storage)?;
            let persisted = write_plan_graph(tx.as_mut(), request).await?;
            Ok::<_, ProvisionError>((tx, persisted))
        };

        let (tx, persisted) = tokio::select! {
            biased;
            _ = cancelled => return Err(ProvisionError::Cancelled),
            written = write => written?,
        };
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(ProvisionError::Cancelled);
        }

        // Not raced against `cancel`: the outcome must match what the store did.
        tx.commit()
            .await
            .map_err(|e| ProvisionError::from_write(e, &request.patient_id, I::KIND))?;
        Ok(persisted)
    }

    /// Add one item to its owner's library.
    ///
    /// Unlike plan provisioning, an existing item with the same name and
    /// owner is an error rather than reused.
    pub async fn register_library_item<I: LibraryItemSpec>(
        &self,
        spec: I,
    ) -> Result<LibraryItem, RegisterError> {
        let missing = spec.missing_fields("");
        if !missing.is_empty() {
            return Err(ValidationError {
                missing_fields: missing.into_iter().map(str::to_owned).collect(),
            }
            .into());
        }

        let mut tx = self.store.begin().await.map_err(RegisterError::Storage)?;
        let (name, owner) = (spec.name(), spec.health_specialist_id());

        let existing = match tx.insert_item_if_absent(&spec.as_new_item()).await {
            Ok(Some(created)) => match tx.commit().await {
                Ok(()) => {
                    info!(kind = %I::KIND, item = name, owner, id = %created.id(), "library item registered");
                    return Ok(created);
                }
                Err(err) if is_natural_key_violation::<I>(&err) => {
                    let mut fresh = self.store.begin().await.map_err(RegisterError::Storage)?;
                    resolver::find_by_name_and_owner(fresh.as_mut(), I::KIND, name, owner)
                        .await
                        .map_err(RegisterError::Storage)?
                        .ok_or(RegisterError::Storage(err))?
                }
                Err(err) => return Err(RegisterError::Storage(err)),
            },
            Ok(None) => resolver::find_by_name_and_owner(tx.as_mut(), I::KIND, name, owner)
                .await
                .and_then(|found| {
                    found.with_context(|| format!("{} {name:?} conflicted but cannot be read", I::KIND))
                })
                .map_err(RegisterError::Storage)?,
            Err(err) => return Err(RegisterError::Storage(err)),
        };

        debug!(kind = %I::KIND, item = name, owner, id = %existing.id(), "library item already registered");
        Err(RegisterError::AlreadyExists {
            kind: I::KIND,
            name: name.to_owned(),
            health_specialist_id: owner.to_owned(),
            id: existing.id(),
        })
    }

    /// Read back a committed plan graph, or `None` if no plan has `plan_id`.
    pub async fn load_plan_graph(&self, plan_id: Uuid) -> Result<Option<PersistedPlan>> {
        // Read-only; the transaction is dropped without commit.
        let mut tx = self.store.begin().await?;

        let Some(plan) = tx
            .get_plan(plan_id)
            .await
            .with_context(|| format!("failed to load plan {plan_id}"))?
        else {
            return Ok(None);
        };
        let days = tx.list_daily_plans(plan_id).await?;
        let relations = tx.list_relation_maps(plan.kind, plan_id).await?;

        let ids = first_reference_order(relations.iter().map(|r| r.item_id));
        let mut fetched = tx.get_items(plan.kind, &ids).await?;
        let mut items = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(pos) = fetched.iter().position(|item| item.id() == *id) {
                items.push(fetched.swap_remove(pos));
            }
        }

        Ok(Some(PersistedPlan {
            plan,
            days,
            relations,
            items,
        }))
    }
}

async fn write_plan_graph<I: LibraryItemSpec>(
    tx: &mut dyn PlanTransaction,
    request: &PlanRequest<I>,
) -> Result<PersistedPlan, ProvisionError> {
    let (owner, patient_id) = (&request.health_specialist_id, &request.patient_id);

    if let Some(existing) = tx
        .find_plan_for_patient(patient_id, I::KIND)
        .await
        .map_err(ProvisionError::Storage)?
    {
        debug!(existing_plan_id = %existing.id, %patient_id, kind = %I::KIND, "plan already exists");
        return Err(ProvisionError::Conflict {
            patient_id: patient_id.clone(),
            kind: I::KIND,
        });
    }

    let plan = tx
        .insert_plan(I::KIND, owner, patient_id)
        .await
        .map_err(|e| ProvisionError::from_write(e, patient_id, I::KIND))?;

    let mut days = Vec::with_capacity(request.days.len());
    let mut relations = Vec::with_capacity(request.item_count());
    let mut items: Vec<LibraryItem> = Vec::new();

    for day_request in &request.days {
        let day = tx
            .insert_daily_plan(plan.id, day_request.day_index, owner)
            .await
            .with_context(|| format!("failed to create day {}", day_request.day_index))
            .map_err(ProvisionError::Storage)?;

        for spec in &day_request.items {
            let resolution = resolver::resolve_or_create(tx, spec)
                .await
                .with_context(|| format!("failed to resolve {} {:?}", I::KIND, spec.name()))
                .map_err(ProvisionError::Storage)?;
            let item_id = resolution.item().id();

            let map = relation::link(tx, I::KIND, plan.id, day.id, item_id)
                .await
                .map_err(ProvisionError::Storage)?;
            relations.push(map);

            if !items.iter().any(|i| i.id() == item_id) {
                items.push(resolution.into_item());
            }
        }
        days.push(day);
    }

    Ok(PersistedPlan {
        plan,
        days,
        relations,
        items,
    })
}

fn is_natural_key_violation<I: LibraryItemSpec>(err: &anyhow::Error) -> bool {
    UniqueViolation::find(err).is_some_and(|v| v.constraint == I::KIND.natural_key_constraint())
}

fn first_reference_order(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}
