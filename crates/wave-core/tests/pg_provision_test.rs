//! Integration tests for plan provisioning against PostgreSQL.
//!
//! Each test creates an isolated temporary database in the shared test
//! instance (see `wave-test-utils`) and drops it on completion.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::Barrier;

use wave_core::plan::{
    DayRequest, ExerciseSpec, MealSpec, PgPlanStore, PlanProvisioner, PlanRequest, ProvisionError,
    RegisterError,
};
use wave_db::models::PlanKind;
use wave_db::pool::table_counts;
use wave_db::queries::{meals, relation_maps};
use wave_test_utils::{FaultyStore, create_test_db, drop_test_db};

fn meal_day(index: i32, names: &[&str]) -> DayRequest<MealSpec> {
    DayRequest::new(index, names.iter().map(|n| MealSpec::named(*n)).collect())
}

async fn total_rows(pool: &PgPool) -> i64 {
    table_counts(pool)
        .await
        .unwrap()
        .into_iter()
        .map(|(_, n)| n)
        .sum()
}

async fn meal_rows(pool: &PgPool) -> i64 {
    table_counts(pool)
        .await
        .unwrap()
        .into_iter()
        .find(|(table, _)| *table == "meals")
        .map_or(0, |(_, n)| n)
}

#[tokio::test]
async fn oatmeal_scenario_on_postgres() {
    let (pool, db_name) = create_test_db().await;
    let svc = PlanProvisioner::new(PgPlanStore::new(pool.clone()));

    let request = PlanRequest::new(
        "spec-1",
        "pat-1",
        vec![meal_day(0, &["Oatmeal"]), meal_day(1, &["Oatmeal"])],
    );
    let persisted = svc.provision(request).await.unwrap();

    assert_eq!(persisted.days.len(), 2);
    assert_eq!(persisted.items.len(), 1);
    let stored = meals::find_meal_by_name_and_owner(&pool, "Oatmeal", "spec-1")
        .await
        .unwrap()
        .expect("oatmeal is in spec-1's library");
    assert_eq!(meal_rows(&pool).await, 1);

    let maps = relation_maps::list_relation_maps_for_plan(&pool, PlanKind::Meal, persisted.plan.id)
        .await
        .unwrap();
    assert_eq!(maps.len(), 2);
    assert!(maps.iter().all(|m| m.item_id == stored.id));

    let loaded = svc.load_plan_graph(persisted.plan.id).await.unwrap();
    assert_eq!(loaded, Some(persisted));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn second_submission_conflicts_without_new_rows() {
    let (pool, db_name) = create_test_db().await;
    let svc = PlanProvisioner::new(PgPlanStore::new(pool.clone()));

    svc.provision(PlanRequest::new("spec-1", "pat-1", vec![meal_day(0, &["Oatmeal"])]))
        .await
        .unwrap();
    let before = total_rows(&pool).await;

    let err = svc
        .provision(PlanRequest::new("spec-1", "pat-1", vec![meal_day(0, &["Rice"])]))
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Conflict { .. }));
    assert_eq!(total_rows(&pool).await, before);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn unique_constraint_backstops_concurrent_precheck() {
    let (pool, db_name) = create_test_db().await;
    let faulty = FaultyStore::new(PgPlanStore::new(pool.clone()))
        .gate_after_precheck(Arc::new(Barrier::new(2)));
    let svc = PlanProvisioner::new(faulty);

    let (a, b) = tokio::join!(
        svc.provision(PlanRequest::new("spec-1", "pat-1", vec![meal_day(0, &["Oatmeal"])])),
        svc.provision(PlanRequest::new("spec-2", "pat-1", vec![meal_day(0, &["Rice"])])),
    );
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser, Err(ProvisionError::Conflict { .. })));

    // Only the winner's graph is left: one plan, one day, one item, one link.
    assert_eq!(total_rows(&pool).await, 4);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn concurrent_creation_of_one_item_resolves_to_a_lookup() {
    let (pool, db_name) = create_test_db().await;
    let faulty = FaultyStore::new(PgPlanStore::new(pool.clone()))
        .gate_after_precheck(Arc::new(Barrier::new(2)));
    let svc = PlanProvisioner::new(faulty);

    let (a, b) = tokio::join!(
        svc.provision(PlanRequest::new("spec-1", "pat-1", vec![meal_day(0, &["Oatmeal"])])),
        svc.provision(PlanRequest::new("spec-1", "pat-2", vec![meal_day(0, &["Oatmeal"])])),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.items[0].id(), b.items[0].id());
    assert_eq!(meal_rows(&pool).await, 1);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn storage_fault_rolls_back_on_postgres() {
    let (pool, db_name) = create_test_db().await;
    let faulty = FaultyStore::new(PgPlanStore::new(pool.clone())).fail_on_item("Stew");
    let svc = PlanProvisioner::new(faulty);

    let request = PlanRequest::new(
        "spec-1",
        "pat-1",
        vec![
            meal_day(0, &["Oatmeal", "Salad"]),
            meal_day(1, &["Eggs", "Soup"]),
            meal_day(2, &["Toast", "Stew"]),
        ],
    );
    let err = svc.provision(request).await.unwrap_err();
    assert!(matches!(err, ProvisionError::Storage(_)));
    assert_eq!(total_rows(&pool).await, 0);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn register_exercise_then_reject_duplicate() {
    let (pool, db_name) = create_test_db().await;
    let svc = PlanProvisioner::new(PgPlanStore::new(pool.clone()));
    let spec = ExerciseSpec {
        health_specialist_id: "spec-1".into(),
        reps: 12,
        sets: 3,
        ..ExerciseSpec::named("Lunge")
    };

    let created = svc.register_library_item(spec.clone()).await.unwrap();
    assert_eq!(created.kind(), PlanKind::Exercise);

    match svc.register_library_item(spec).await.unwrap_err() {
        RegisterError::AlreadyExists { id, .. } => assert_eq!(id, created.id()),
        other => panic!("expected AlreadyExists, got {other:?}"),
    }

    pool.close().await;
    drop_test_db(&db_name).await;
}
