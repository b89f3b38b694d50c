//! The transactional store seam the provisioning coordinator runs against.
//!
//! A [`PlanStore`] hands out [`PlanTransaction`]s. Everything written through
//! a transaction is visible to that transaction's own later reads and to no
//! one else until [`PlanTransaction::commit`]. Dropping a transaction without
//! committing discards its writes; this is how every failure path rolls back.
//!
//! Unique-constraint violations are reported as
//! [`wave_db::error::UniqueViolation`] inside the returned `anyhow::Error`.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use wave_db::models::{DailyPlan, LibraryItem, NewLibraryItem, Plan, PlanKind, RelationMap};

/// Source of scoped units of work.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Open a new transaction.
    async fn begin(&self) -> Result<Box<dyn PlanTransaction>>;
}

/// One unit of work against the store.
#[async_trait]
pub trait PlanTransaction: Send {
    /// Point lookup by (patient id, plan kind).
    async fn find_plan_for_patient(
        &mut self,
        patient_id: &str,
        kind: PlanKind,
    ) -> Result<Option<Plan>>;

    /// Create a plan; the id is generated by the store.
    async fn insert_plan(
        &mut self,
        kind: PlanKind,
        health_specialist_id: &str,
        patient_id: &str,
    ) -> Result<Plan>;

    /// Create one day of `plan_id`.
    async fn insert_daily_plan(
        &mut self,
        plan_id: Uuid,
        day_index: i32,
        health_specialist_id: &str,
    ) -> Result<DailyPlan>;

    /// Point lookup by natural key (name, owner).
    async fn find_item(
        &mut self,
        kind: PlanKind,
        name: &str,
        health_specialist_id: &str,
    ) -> Result<Option<LibraryItem>>;

    /// Create a library item, or return `None` if its natural key is taken.
    async fn insert_item_if_absent(
        &mut self,
        item: &NewLibraryItem<'_>,
    ) -> Result<Option<LibraryItem>>;

    /// Append a relation row.
    async fn insert_relation_map(
        &mut self,
        kind: PlanKind,
        plan_id: Uuid,
        daily_plan_id: Uuid,
        item_id: Uuid,
    ) -> Result<RelationMap>;

    async fn get_plan(&mut self, id: Uuid) -> Result<Option<Plan>>;

    /// Days of a plan in insertion order.
    async fn list_daily_plans(&mut self, plan_id: Uuid) -> Result<Vec<DailyPlan>>;

    /// Relation rows of a plan in insertion order.
    async fn list_relation_maps(
        &mut self,
        kind: PlanKind,
        plan_id: Uuid,
    ) -> Result<Vec<RelationMap>>;

    async fn get_items(&mut self, kind: PlanKind, ids: &[Uuid]) -> Result<Vec<LibraryItem>>;

    /// Make every write of this transaction durable and visible.
    async fn commit(self: Box<Self>) -> Result<()>;
}

#[async_trait]
impl<S: PlanStore + ?Sized> PlanStore for Arc<S> {
    async fn begin(&self) -> Result<Box<dyn PlanTransaction>> {
        (**self).begin().await
    }
}

// Both traits are used as trait objects.
const _: () = {
    fn _assert_object_safe(_: &dyn PlanStore, _: &dyn PlanTransaction) {}
};
