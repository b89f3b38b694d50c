//! Relation mapping: which item belongs to which day of which plan.

use anyhow::{Result, bail};
use uuid::Uuid;

use wave_db::models::{PlanKind, RelationMap};

use super::store::PlanTransaction;

/// Append one (plan, day, item) row.
///
/// Pure append: linking the same triple twice yields two rows.
pub async fn link(
    tx: &mut dyn PlanTransaction,
    kind: PlanKind,
    plan_id: Uuid,
    daily_plan_id: Uuid,
    item_id: Uuid,
) -> Result<RelationMap> {
    let mut missing = Vec::new();
    if plan_id.is_nil() {
        missing.push("plan_id");
    }
    if daily_plan_id.is_nil() {
        missing.push("daily_plan_id");
    }
    if item_id.is_nil() {
        missing.push(kind.item_column());
    }
    if !missing.is_empty() {
        bail!("missing_data: {}", missing.join(", "));
    }

    tx.insert_relation_map(kind, plan_id, daily_plan_id, item_id)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::memory::MemoryPlanStore;
    use crate::plan::store::PlanStore;

    #[tokio::test]
    async fn duplicate_triples_are_kept() {
        let store = MemoryPlanStore::new();
        let mut tx = store.begin().await.unwrap();
        let (plan, day, item) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let a = link(tx.as_mut(), PlanKind::Meal, plan, day, item).await.unwrap();
        let b = link(tx.as_mut(), PlanKind::Meal, plan, day, item).await.unwrap();
        assert_ne!(a.id, b.id);

        let rows = tx.list_relation_maps(PlanKind::Meal, plan).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.item_id == item && r.daily_plan_id == day));
    }

    #[tokio::test]
    async fn nil_ids_are_rejected_before_writing() {
        let store = MemoryPlanStore::new();
        let mut tx = store.begin().await.unwrap();
        let plan = Uuid::new_v4();

        let err = link(tx.as_mut(), PlanKind::Exercise, plan, Uuid::nil(), Uuid::nil())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "missing_data: daily_plan_id, exercise_id");

        let rows = tx.list_relation_maps(PlanKind::Exercise, plan).await.unwrap();
        assert!(rows.is_empty());
    }
}
