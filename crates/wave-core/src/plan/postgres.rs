//! [`PlanStore`] backed by PostgreSQL.
//!
//! Each [`PlanTransaction`] wraps one `sqlx` transaction at the server's
//! default READ COMMITTED isolation. Reads inside it see its own writes;
//! `sqlx` rolls the transaction back when it is dropped uncommitted.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use wave_db::error::classify;
use wave_db::models::{DailyPlan, LibraryItem, NewLibraryItem, Plan, PlanKind, RelationMap};
use wave_db::queries::{daily_plans, exercises, meals, plans, relation_maps};

use super::store::{PlanStore, PlanTransaction};

/// PostgreSQL plan store.
#[derive(Debug, Clone)]
pub struct PgPlanStore {
    pool: PgPool,
}

impl PgPlanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanStore for PgPlanStore {
    async fn begin(&self) -> Result<Box<dyn PlanTransaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .context("failed to begin transaction")?;
        Ok(Box::new(PgPlanTransaction { tx }))
    }
}

struct PgPlanTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl PlanTransaction for PgPlanTransaction {
    async fn find_plan_for_patient(
        &mut self,
        patient_id: &str,
        kind: PlanKind,
    ) -> Result<Option<Plan>> {
        plans::find_plan_for_patient(&mut *self.tx, patient_id, kind).await
    }

    async fn insert_plan(
        &mut self,
        kind: PlanKind,
        health_specialist_id: &str,
        patient_id: &str,
    ) -> Result<Plan> {
        plans::insert_plan(&mut *self.tx, kind, health_specialist_id, patient_id).await
    }

    async fn insert_daily_plan(
        &mut self,
        plan_id: Uuid,
        day_index: i32,
        health_specialist_id: &str,
    ) -> Result<DailyPlan> {
        daily_plans::insert_daily_plan(&mut *self.tx, plan_id, day_index, health_specialist_id)
            .await
    }

    async fn find_item(
        &mut self,
        kind: PlanKind,
        name: &str,
        health_specialist_id: &str,
    ) -> Result<Option<LibraryItem>> {
        let item = match kind {
            PlanKind::Meal => {
                meals::find_meal_by_name_and_owner(&mut *self.tx, name, health_specialist_id)
                    .await?
                    .map(LibraryItem::Meal)
            }
            PlanKind::Exercise => {
                exercises::find_exercise_by_name_and_owner(
                    &mut *self.tx,
                    name,
                    health_specialist_id,
                )
                .await?
                .map(LibraryItem::Exercise)
            }
        };
        Ok(item)
    }

    async fn insert_item_if_absent(
        &mut self,
        item: &NewLibraryItem<'_>,
    ) -> Result<Option<LibraryItem>> {
        let created = match item {
            NewLibraryItem::Meal(new) => meals::insert_meal_if_absent(&mut *self.tx, new)
                .await?
                .map(LibraryItem::Meal),
            NewLibraryItem::Exercise(new) => {
                exercises::insert_exercise_if_absent(&mut *self.tx, new)
                    .await?
                    .map(LibraryItem::Exercise)
            }
        };
        Ok(created)
    }

    async fn insert_relation_map(
        &mut self,
        kind: PlanKind,
        plan_id: Uuid,
        daily_plan_id: Uuid,
        item_id: Uuid,
    ) -> Result<RelationMap> {
        relation_maps::insert_relation_map(&mut *self.tx, kind, plan_id, daily_plan_id, item_id)
            .await
    }

    async fn get_plan(&mut self, id: Uuid) -> Result<Option<Plan>> {
        plans::get_plan(&mut *self.tx, id).await
    }

    async fn list_daily_plans(&mut self, plan_id: Uuid) -> Result<Vec<DailyPlan>> {
        daily_plans::list_daily_plans_for_plan(&mut *self.tx, plan_id).await
    }

    async fn list_relation_maps(
        &mut self,
        kind: PlanKind,
        plan_id: Uuid,
    ) -> Result<Vec<RelationMap>> {
        relation_maps::list_relation_maps_for_plan(&mut *self.tx, kind, plan_id).await
    }

    async fn get_items(&mut self, kind: PlanKind, ids: &[Uuid]) -> Result<Vec<LibraryItem>> {
        let items = match kind {
            PlanKind::Meal => meals::get_meals(&mut *self.tx, ids)
                .await?
                .into_iter()
                .map(LibraryItem::Meal)
                .collect(),
            PlanKind::Exercise => exercises::get_exercises(&mut *self.tx, ids)
                .await?
                .into_iter()
                .map(LibraryItem::Exercise)
                .collect(),
        };
        Ok(items)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(classify)
            .context("failed to commit transaction")
    }
}
