//! The persisted shape of a provisioned plan.

use serde::Serialize;
use uuid::Uuid;

use wave_db::models::{DailyPlan, LibraryItem, Plan, RelationMap};

/// A plan together with its days, relation rows and the library items
/// those rows reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedPlan {
    pub plan: Plan,
    /// In insertion (request) order.
    pub days: Vec<DailyPlan>,
    /// In insertion order; may contain repeated (day, item) pairs.
    pub relations: Vec<RelationMap>,
    /// Distinct items referenced by `relations`.
    pub items: Vec<LibraryItem>,
}

impl PersistedPlan {
    pub fn relations_for_day(&self, daily_plan_id: Uuid) -> impl Iterator<Item = &RelationMap> {
        self.relations
            .iter()
            .filter(move |r| r.daily_plan_id == daily_plan_id)
    }

    pub fn item(&self, id: Uuid) -> Option<&LibraryItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    /// Items of one day, in the order they were linked.
    pub fn items_for_day(&self, daily_plan_id: Uuid) -> Vec<&LibraryItem> {
        self.relations_for_day(daily_plan_id)
            .filter_map(|r| self.item(r.item_id))
            .collect()
    }
}
