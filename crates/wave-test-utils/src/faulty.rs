//! A [`PlanStore`] wrapper for observing and perturbing transactions.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::{Barrier, Notify};
use uuid::Uuid;

use wave_core::plan::{PlanStore, PlanTransaction};
use wave_db::models::{DailyPlan, LibraryItem, NewLibraryItem, Plan, PlanKind, RelationMap};

/// How long a [`slow_commit_ack`](FaultyStore::slow_commit_ack) commit
/// keeps its caller waiting after the data is durable.
pub const SLOW_ACK: Duration = Duration::from_millis(200);

/// One recorded store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreCall {
    Begin,
    FindPlanForPatient,
    InsertPlan,
    InsertDailyPlan,
    FindItem,
    InsertItem,
    InsertRelationMap,
    GetPlan,
    ListDailyPlans,
    ListRelationMaps,
    GetItems,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct Perturbations {
    fail_on_item: Option<String>,
    fail_on_commit: bool,
    gate_after_precheck: Option<Arc<Barrier>>,
    stall_on_item: Option<(String, Arc<Notify>)>,
    slow_commit_ack: Option<Arc<Notify>>,
}

/// Wraps a store, recording every call its transactions make.
///
/// Optional perturbations:
/// - [`fail_on_item`](Self::fail_on_item): the lookup of the named item errors.
/// - [`fail_on_commit`](Self::fail_on_commit): commit errors without committing.
/// - [`gate_after_precheck`](Self::gate_after_precheck): each transaction
///   waits on a barrier right after the plan pre-check, so concurrent
///   requests all pass it before any of them writes.
/// - [`stall_on_item`](Self::stall_on_item): the lookup of the named item
///   signals the given `Notify` and never completes.
/// - [`slow_commit_ack`](Self::slow_commit_ack): commit goes through, then
///   signals the given `Notify` and holds the acknowledgement back for
///   [`SLOW_ACK`].
#[derive(Debug, Clone)]
pub struct FaultyStore<S> {
    inner: S,
    calls: Arc<Mutex<Vec<StoreCall>>>,
    perturb: Perturbations,
}

impl<S: PlanStore> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Arc::default(),
            perturb: Perturbations::default(),
        }
    }

    pub fn fail_on_item(mut self, name: impl Into<String>) -> Self {
        self.perturb.fail_on_item = Some(name.into());
        self
    }

    pub fn fail_on_commit(mut self) -> Self {
        self.perturb.fail_on_commit = true;
        self
    }

    pub fn gate_after_precheck(mut self, barrier: Arc<Barrier>) -> Self {
        self.perturb.gate_after_precheck = Some(barrier);
        self
    }

    pub fn stall_on_item(mut self, name: impl Into<String>, reached: Arc<Notify>) -> Self {
        self.perturb.stall_on_item = Some((name.into(), reached));
        self
    }

    pub fn slow_commit_ack(mut self, committed: Arc<Notify>) -> Self {
        self.perturb.slow_commit_ack = Some(committed);
        self
    }

    /// Every call recorded so far, across all transactions, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().expect("call log lock poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

fn record(calls: &Mutex<Vec<StoreCall>>, call: StoreCall) {
    calls.lock().expect("call log lock poisoned").push(call);
}

#[async_trait]
impl<S: PlanStore> PlanStore for FaultyStore<S> {
    async fn begin(&self) -> Result<Box<dyn PlanTransaction>> {
        record(&self.calls, StoreCall::Begin);
        let inner = self.inner.begin().await?;
        Ok(Box::new(FaultyTransaction {
            inner,
            calls: Arc::clone(&self.calls),
            perturb: self.perturb.clone(),
        }))
    }
}

struct FaultyTransaction {
    inner: Box<dyn PlanTransaction>,
    calls: Arc<Mutex<Vec<StoreCall>>>,
    perturb: Perturbations,
}

impl FaultyTransaction {
    fn record(&self, call: StoreCall) {
        record(&self.calls, call);
    }
}

#[async_trait]
impl PlanTransaction for FaultyTransaction {
    async fn find_plan_for_patient(
        &mut self,
        patient_id: &str,
        kind: PlanKind,
    ) -> Result<Option<Plan>> {
        self.record(StoreCall::FindPlanForPatient);
        let found = self.inner.find_plan_for_patient(patient_id, kind).await?;
        if let Some(barrier) = &self.perturb.gate_after_precheck {
            barrier.wait().await;
        }
        Ok(found)
    }

    async fn insert_plan(
        &mut self,
        kind: PlanKind,
        health_specialist_id: &str,
        patient_id: &str,
    ) -> Result<Plan> {
        self.record(StoreCall::InsertPlan);
        self.inner
            .insert_plan(kind, health_specialist_id, patient_id)
            .await
    }

    async fn insert_daily_plan(
        &mut self,
        plan_id: Uuid,
        day_index: i32,
        health_specialist_id: &str,
    ) -> Result<DailyPlan> {
        self.record(StoreCall::InsertDailyPlan);
        self.inner
            .insert_daily_plan(plan_id, day_index, health_specialist_id)
            .await
    }

    async fn find_item(
        &mut self,
        kind: PlanKind,
        name: &str,
        health_specialist_id: &str,
    ) -> Result<Option<LibraryItem>> {
        self.record(StoreCall::FindItem);
        if self.perturb.fail_on_item.as_deref() == Some(name) {
            bail!("injected fault looking up {kind} {name:?}");
        }
        if let Some((stall_name, reached)) = &self.perturb.stall_on_item {
            if stall_name == name {
                reached.notify_one();
                std::future::pending::<()>().await;
            }
        }
        self.inner.find_item(kind, name, health_specialist_id).await
    }

    async fn insert_item_if_absent(
        &mut self,
        item: &NewLibraryItem<'_>,
    ) -> Result<Option<LibraryItem>> {
        self.record(StoreCall::InsertItem);
        self.inner.insert_item_if_absent(item).await
    }

    async fn insert_relation_map(
        &mut self,
        kind: PlanKind,
        plan_id: Uuid,
        daily_plan_id: Uuid,
        item_id: Uuid,
    ) -> Result<RelationMap> {
        self.record(StoreCall::InsertRelationMap);
        self.inner
            .insert_relation_map(kind, plan_id, daily_plan_id, item_id)
            .await
    }

    async fn get_plan(&mut self, id: Uuid) -> Result<Option<Plan>> {
        self.record(StoreCall::GetPlan);
        self.inner.get_plan(id).await
    }

    async fn list_daily_plans(&mut self, plan_id: Uuid) -> Result<Vec<DailyPlan>> {
        self.record(StoreCall::ListDailyPlans);
        self.inner.list_daily_plans(plan_id).await
    }

    async fn list_relation_maps(
        &mut self,
        kind: PlanKind,
        plan_id: Uuid,
    ) -> Result<Vec<RelationMap>> {
        self.record(StoreCall::ListRelationMaps);
        self.inner.list_relation_maps(kind, plan_id).await
    }

    async fn get_items(&mut self, kind: PlanKind, ids: &[Uuid]) -> Result<Vec<LibraryItem>> {
        self.record(StoreCall::GetItems);
        self.inner.get_items(kind, ids).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.record(StoreCall::Commit);
        let FaultyTransaction { inner, perturb, .. } = *self;
        if perturb.fail_on_commit {
            bail!("injected fault at commit");
        }
        inner.commit().await?;
        if let Some(committed) = perturb.slow_commit_ack {
            committed.notify_one();
            tokio::time::sleep(SLOW_ACK).await;
        }
        Ok(())
    }
}
