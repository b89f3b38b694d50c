//! Integration tests for the query functions.
//!
//! Each test creates an isolated temporary database in the shared test
//! PostgreSQL and drops it on completion.

use sqlx::PgPool;
use uuid::Uuid;

use wave_db::error::{MEAL_NAME_OWNER_KEY, PLAN_PATIENT_KIND_KEY, UniqueViolation};
use wave_db::models::{NewExercise, NewMeal, PlanKind};
use wave_db::pool::table_counts;
use wave_db::queries::{daily_plans, exercises, meals, plans, relation_maps};
use wave_test_utils::{create_test_db, drop_test_db};

fn new_meal<'a>(name: &'a str, owner: &'a str, ingredients: &'a [String]) -> NewMeal<'a> {
    NewMeal {
        name,
        health_specialist_id: owner,
        ingredients,
        cals: 320,
        description: "",
        meal_type: "breakfast",
    }
}

async fn rows_in(pool: &PgPool, table: &str) -> i64 {
    table_counts(pool)
        .await
        .unwrap()
        .into_iter()
        .find(|(name, _)| *name == table)
        .map(|(_, n)| n)
        .unwrap_or_else(|| panic!("unknown table {table}"))
}

#[tokio::test]
async fn plan_insert_and_lookup() {
    let (pool, db_name) = create_test_db().await;

    let plan = plans::insert_plan(&pool, PlanKind::Meal, "spec-1", "pat-1")
        .await
        .unwrap();
    assert!(!plan.id.is_nil());
    assert_eq!(plan.kind, PlanKind::Meal);

    let found = plans::find_plan_for_patient(&pool, "pat-1", PlanKind::Meal)
        .await
        .unwrap();
    assert_eq!(found, Some(plan.clone()));
    let other_kind = plans::find_plan_for_patient(&pool, "pat-1", PlanKind::Exercise)
        .await
        .unwrap();
    assert!(other_kind.is_none());

    assert_eq!(plans::get_plan(&pool, plan.id).await.unwrap(), Some(plan));
    assert!(plans::get_plan(&pool, Uuid::new_v4()).await.unwrap().is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn duplicate_plan_is_a_classified_unique_violation() {
    let (pool, db_name) = create_test_db().await;

    plans::insert_plan(&pool, PlanKind::Exercise, "spec-1", "pat-1")
        .await
        .unwrap();
    let err = plans::insert_plan(&pool, PlanKind::Exercise, "spec-2", "pat-1")
        .await
        .unwrap_err();

    let violation = UniqueViolation::find(&err).expect("should be a unique violation");
    assert_eq!(violation.constraint, PLAN_PATIENT_KIND_KEY);
    assert_eq!(rows_in(&pool, "plans").await, 1);

    let both = plans::insert_plan(&pool, PlanKind::Meal, "spec-1", "pat-1").await;
    assert!(both.is_ok(), "a meal plan may coexist with an exercise plan");
    assert!(
        plans::find_plan_for_patient(&pool, "pat-1", PlanKind::Meal)
            .await
            .unwrap()
            .is_some()
    );
    assert_eq!(rows_in(&pool, "plans").await, 2);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn meal_insert_if_absent_respects_natural_key() {
    let (pool, db_name) = create_test_db().await;
    let ingredients = vec!["oats".to_owned(), "milk".to_owned()];

    let created = meals::insert_meal_if_absent(&pool, &new_meal("Oatmeal", "spec-1", &ingredients))
        .await
        .unwrap()
        .expect("first insert creates the row");
    assert_eq!(created.ingredients, ingredients);

    let again = meals::insert_meal_if_absent(&pool, &new_meal("Oatmeal", "spec-1", &[]))
        .await
        .unwrap();
    assert!(again.is_none());

    let other_owner = meals::insert_meal_if_absent(&pool, &new_meal("Oatmeal", "spec-2", &[]))
        .await
        .unwrap();
    assert!(other_owner.is_some());

    let found = meals::find_meal_by_name_and_owner(&pool, "Oatmeal", "spec-1")
        .await
        .unwrap();
    assert_eq!(found, Some(created.clone()));
    assert_eq!(meals::get_meals(&pool, &[created.id]).await.unwrap(), vec![created]);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn plain_meal_insert_conflict_names_its_constraint() {
    let (pool, db_name) = create_test_db().await;

    meals::insert_meal_if_absent(&pool, &new_meal("Soup", "spec-1", &[]))
        .await
        .unwrap();
    let err = sqlx::query(
        "INSERT INTO meals (name, health_specialist_id) VALUES ('Soup', 'spec-1')",
    )
    .execute(&pool)
    .await
    .map_err(wave_db::error::classify)
    .unwrap_err();

    let violation = UniqueViolation::find(&err).expect("should be a unique violation");
    assert_eq!(violation.constraint, MEAL_NAME_OWNER_KEY);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn exercises_are_scoped_per_owner() {
    let (pool, db_name) = create_test_db().await;

    for (name, owner) in [("Squat", "spec-1"), ("Plank", "spec-1"), ("Squat", "spec-2")] {
        let new = NewExercise {
            name,
            health_specialist_id: owner,
            reps: 10,
            sets: 3,
            description: "",
            exercise_type: "strength",
        };
        exercises::insert_exercise_if_absent(&pool, &new)
            .await
            .unwrap()
            .expect("exercise should be created");
    }

    let mut ids = Vec::new();
    for name in ["Squat", "Plank"] {
        let found = exercises::find_exercise_by_name_and_owner(&pool, name, "spec-1")
            .await
            .unwrap()
            .expect("spec-1 exercise exists");
        ids.push(found.id);
    }
    let library = exercises::get_exercises(&pool, &ids).await.unwrap();
    let names: Vec<_> = library.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Plank", "Squat"]);

    let found = exercises::find_exercise_by_name_and_owner(&pool, "Squat", "spec-2")
        .await
        .unwrap()
        .expect("spec-2 squat exists");
    assert!(!ids.contains(&found.id));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn relation_maps_keep_duplicates_in_order() {
    let (pool, db_name) = create_test_db().await;

    let plan = plans::insert_plan(&pool, PlanKind::Meal, "spec-1", "pat-1")
        .await
        .unwrap();
    let day0 = daily_plans::insert_daily_plan(&pool, plan.id, 0, "spec-1")
        .await
        .unwrap();
    let day1 = daily_plans::insert_daily_plan(&pool, plan.id, 0, "spec-1")
        .await
        .unwrap();
    let meal = meals::insert_meal_if_absent(&pool, &new_meal("Oatmeal", "spec-1", &[]))
        .await
        .unwrap()
        .unwrap();

    for day in [day0.id, day1.id, day1.id] {
        relation_maps::insert_relation_map(&pool, PlanKind::Meal, plan.id, day, meal.id)
            .await
            .unwrap();
    }

    let maps = relation_maps::list_relation_maps_for_plan(&pool, PlanKind::Meal, plan.id)
        .await
        .unwrap();
    let days: Vec<_> = maps.iter().map(|m| m.daily_plan_id).collect();
    assert_eq!(days, vec![day0.id, day1.id, day1.id]);
    assert!(maps.iter().all(|m| m.item_id == meal.id));

    let listed = daily_plans::list_daily_plans_for_plan(&pool, plan.id)
        .await
        .unwrap();
    assert_eq!(listed, vec![day0, day1]);
    assert_eq!(rows_in(&pool, "daily_plans").await, 2);
    assert_eq!(rows_in(&pool, "meal_maps").await, 3);
    assert_eq!(rows_in(&pool, "exercise_maps").await, 0);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn relation_map_rejects_unknown_item() {
    let (pool, db_name) = create_test_db().await;

    let plan = plans::insert_plan(&pool, PlanKind::Exercise, "spec-1", "pat-1")
        .await
        .unwrap();
    let day = daily_plans::insert_daily_plan(&pool, plan.id, 0, "spec-1")
        .await
        .unwrap();
    let err = relation_maps::insert_relation_map(
        &pool,
        PlanKind::Exercise,
        plan.id,
        day.id,
        Uuid::new_v4(),
    )
    .await
    .unwrap_err();
    assert!(UniqueViolation::find(&err).is_none());

    pool.close().await;
    drop_test_db(&db_name).await;
}
