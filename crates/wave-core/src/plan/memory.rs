//! In-memory [`PlanStore`] with private staged writes and unique checks at
//! commit.
//!
//! Each transaction stages its writes privately and reads committed rows
//! plus its own staged rows. Commit re-checks the unique constraints against
//! everything committed in the meantime, so two transactions that both pass
//! the plan pre-check end with the second commit failing with a
//! [`UniqueViolation`], as on PostgreSQL.
//!
//! Concurrent first creation of one (name, owner) item differs: PostgreSQL
//! waits on the conflicting insert and the loser reuses the winner's row,
//! while here the loser only finds out at commit and fails with a
//! retryable storage error.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use wave_db::error::{PLAN_PATIENT_KIND_KEY, UniqueViolation};
use wave_db::models::{
    DailyPlan, Exercise, LibraryItem, Meal, NewLibraryItem, Plan, PlanKind, RelationMap,
};

use super::store::{PlanStore, PlanTransaction};

/// Rows of every entity set.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub plans: Vec<Plan>,
    pub daily_plans: Vec<DailyPlan>,
    pub meals: Vec<Meal>,
    pub exercises: Vec<Exercise>,
    pub meal_maps: Vec<RelationMap>,
    pub exercise_maps: Vec<RelationMap>,
}

impl Tables {
    fn maps(&self, kind: PlanKind) -> &Vec<RelationMap> {
        match kind {
            PlanKind::Meal => &self.meal_maps,
            PlanKind::Exercise => &self.exercise_maps,
        }
    }

    fn maps_mut(&mut self, kind: PlanKind) -> &mut Vec<RelationMap> {
        match kind {
            PlanKind::Meal => &mut self.meal_maps,
            PlanKind::Exercise => &mut self.exercise_maps,
        }
    }

    fn find_plan(&self, patient_id: &str, kind: PlanKind) -> Option<&Plan> {
        self.plans
            .iter()
            .find(|p| p.patient_id == patient_id && p.kind == kind)
    }

    fn find_item(&self, kind: PlanKind, name: &str, owner: &str) -> Option<LibraryItem> {
        match kind {
            PlanKind::Meal => self
                .meals
                .iter()
                .find(|m| m.name == name && m.health_specialist_id == owner)
                .cloned()
                .map(LibraryItem::Meal),
            PlanKind::Exercise => self
                .exercises
                .iter()
                .find(|e| e.name == name && e.health_specialist_id == owner)
                .cloned()
                .map(LibraryItem::Exercise),
        }
    }

    fn items_with_ids(&self, kind: PlanKind, ids: &[Uuid]) -> Vec<LibraryItem> {
        match kind {
            PlanKind::Meal => self
                .meals
                .iter()
                .filter(|m| ids.contains(&m.id))
                .cloned()
                .map(LibraryItem::Meal)
                .collect(),
            PlanKind::Exercise => self
                .exercises
                .iter()
                .filter(|e| ids.contains(&e.id))
                .cloned()
                .map(LibraryItem::Exercise)
                .collect(),
        }
    }

    /// First constraint `staged` would violate against `self`.
    fn conflict_with(&self, staged: &Tables) -> Option<UniqueViolation> {
        if staged
            .plans
            .iter()
            .any(|p| self.find_plan(&p.patient_id, p.kind).is_some())
        {
            return Some(UniqueViolation::new(PLAN_PATIENT_KIND_KEY));
        }
        let meal_taken = staged.meals.iter().any(|m| {
            self.find_item(PlanKind::Meal, &m.name, &m.health_specialist_id)
                .is_some()
        });
        if meal_taken {
            return Some(UniqueViolation::new(PlanKind::Meal.natural_key_constraint()));
        }
        let exercise_taken = staged.exercises.iter().any(|e| {
            self.find_item(PlanKind::Exercise, &e.name, &e.health_specialist_id)
                .is_some()
        });
        if exercise_taken {
            return Some(UniqueViolation::new(
                PlanKind::Exercise.natural_key_constraint(),
            ));
        }
        None
    }

    fn absorb(&mut self, staged: Tables) {
        self.plans.extend(staged.plans);
        self.daily_plans.extend(staged.daily_plans);
        self.meals.extend(staged.meals);
        self.exercises.extend(staged.exercises);
        self.meal_maps.extend(staged.meal_maps);
        self.exercise_maps.extend(staged.exercise_maps);
    }
}

/// Shared in-memory store. Clones share the same committed state.
#[derive(Debug, Clone, Default)]
pub struct MemoryPlanStore {
    committed: Arc<Mutex<Tables>>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of all committed rows.
    ///
    /// # Panics
    ///
    /// If a transaction panicked while holding the store lock.
    pub fn snapshot(&self) -> Tables {
        self.committed
            .lock()
            .expect("in-memory store lock poisoned")
            .clone()
    }
}

fn lock(tables: &Mutex<Tables>) -> Result<MutexGuard<'_, Tables>> {
    tables
        .lock()
        .map_err(|_| anyhow!("in-memory store lock poisoned"))
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn begin(&self) -> Result<Box<dyn PlanTransaction>> {
        Ok(Box::new(MemoryTransaction {
            committed: Arc::clone(&self.committed),
            staged: Tables::default(),
        }))
    }
}

struct MemoryTransaction {
    committed: Arc<Mutex<Tables>>,
    staged: Tables,
}

#[async_trait]
impl PlanTransaction for MemoryTransaction {
    async fn find_plan_for_patient(
        &mut self,
        patient_id: &str,
        kind: PlanKind,
    ) -> Result<Option<Plan>> {
        if let Some(plan) = self.staged.find_plan(patient_id, kind) {
            return Ok(Some(plan.clone()));
        }
        Ok(lock(&self.committed)?.find_plan(patient_id, kind).cloned())
    }

    async fn insert_plan(
        &mut self,
        kind: PlanKind,
        health_specialist_id: &str,
        patient_id: &str,
    ) -> Result<Plan> {
        let taken = self.staged.find_plan(patient_id, kind).is_some()
            || lock(&self.committed)?.find_plan(patient_id, kind).is_some();
        if taken {
            return Err(UniqueViolation::new(PLAN_PATIENT_KIND_KEY).into());
        }
        let plan = Plan {
            id: Uuid::new_v4(),
            kind,
            health_specialist_id: health_specialist_id.to_owned(),
            patient_id: patient_id.to_owned(),
            created_at: Utc::now(),
        };
        self.staged.plans.push(plan.clone());
        Ok(plan)
    }

    async fn insert_daily_plan(
        &mut self,
        plan_id: Uuid,
        day_index: i32,
        health_specialist_id: &str,
    ) -> Result<DailyPlan> {
        let day = DailyPlan {
            id: Uuid::new_v4(),
            plan_id,
            day_index,
            health_specialist_id: health_specialist_id.to_owned(),
            created_at: Utc::now(),
        };
        self.staged.daily_plans.push(day.clone());
        Ok(day)
    }

    async fn find_item(
        &mut self,
        kind: PlanKind,
        name: &str,
        health_specialist_id: &str,
    ) -> Result<Option<LibraryItem>> {
        if let Some(item) = self.staged.find_item(kind, name, health_specialist_id) {
            return Ok(Some(item));
        }
        Ok(lock(&self.committed)?.find_item(kind, name, health_specialist_id))
    }

    async fn insert_item_if_absent(
        &mut self,
        item: &NewLibraryItem<'_>,
    ) -> Result<Option<LibraryItem>> {
        let (kind, name, owner) = (item.kind(), item.name(), item.health_specialist_id());
        let taken = self.staged.find_item(kind, name, owner).is_some()
            || lock(&self.committed)?.find_item(kind, name, owner).is_some();
        if taken {
            return Ok(None);
        }
        let created = match item {
            NewLibraryItem::Meal(new) => {
                let meal = Meal {
                    id: Uuid::new_v4(),
                    name: new.name.to_owned(),
                    health_specialist_id: new.health_specialist_id.to_owned(),
                    ingredients: new.ingredients.to_vec(),
                    cals: new.cals,
                    description: new.description.to_owned(),
                    meal_type: new.meal_type.to_owned(),
                    created_at: Utc::now(),
                };
                self.staged.meals.push(meal.clone());
                LibraryItem::Meal(meal)
            }
            NewLibraryItem::Exercise(new) => {
                let exercise = Exercise {
                    id: Uuid::new_v4(),
                    name: new.name.to_owned(),
                    health_specialist_id: new.health_specialist_id.to_owned(),
                    reps: new.reps,
                    sets: new.sets,
                    description: new.description.to_owned(),
                    exercise_type: new.exercise_type.to_owned(),
                    created_at: Utc::now(),
                };
                self.staged.exercises.push(exercise.clone());
                LibraryItem::Exercise(exercise)
            }
        };
        Ok(Some(created))
    }

    async fn insert_relation_map(
        &mut self,
        kind: PlanKind,
        plan_id: Uuid,
        daily_plan_id: Uuid,
        item_id: Uuid,
    ) -> Result<RelationMap> {
        let map = RelationMap {
            id: Uuid::new_v4(),
            plan_id,
            daily_plan_id,
            item_id,
            created_at: Utc::now(),
        };
        self.staged.maps_mut(kind).push(map.clone());
        Ok(map)
    }

    async fn get_plan(&mut self, id: Uuid) -> Result<Option<Plan>> {
        if let Some(plan) = self.staged.plans.iter().find(|p| p.id == id) {
            return Ok(Some(plan.clone()));
        }
        Ok(lock(&self.committed)?
            .plans
            .iter()
            .find(|p| p.id == id)
            .cloned())
    }

    async fn list_daily_plans(&mut self, plan_id: Uuid) -> Result<Vec<DailyPlan>> {
        let committed = lock(&self.committed)?;
        Ok(committed
            .daily_plans
            .iter()
            .chain(&self.staged.daily_plans)
            .filter(|d| d.plan_id == plan_id)
            .cloned()
            .collect())
    }

    async fn list_relation_maps(
        &mut self,
        kind: PlanKind,
        plan_id: Uuid,
    ) -> Result<Vec<RelationMap>> {
        let committed = lock(&self.committed)?;
        Ok(committed
            .maps(kind)
            .iter()
            .chain(self.staged.maps(kind))
            .filter(|m| m.plan_id == plan_id)
            .cloned()
            .collect())
    }

    async fn get_items(&mut self, kind: PlanKind, ids: &[Uuid]) -> Result<Vec<LibraryItem>> {
        let mut items = lock(&self.committed)?.items_with_ids(kind, ids);
        items.extend(self.staged.items_with_ids(kind, ids));
        items.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(items)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction { committed, staged } = *self;
        let mut tables = lock(&committed)?;
        if let Some(violation) = tables.conflict_with(&staged) {
            return Err(violation.into());
        }
        tables.absorb(staged);
        Ok(())
    }
}
