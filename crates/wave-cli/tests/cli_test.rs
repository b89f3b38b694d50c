//! End-to-end tests for the `wave` binary.
//!
//! Each test provisions its own database on the shared PostgreSQL and runs
//! the compiled binary against it with an isolated config directory.

use std::path::Path;
use std::process::{Command, Output};

use sqlx::PgPool;
use uuid::Uuid;

use wave_test_utils::{create_test_db, drop_test_db, pg_url};

const EXIT_CONFLICT: i32 = 3;

fn wave(config_home: &Path, db_url: &str, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_wave"))
        .args(args)
        .env("XDG_CONFIG_HOME", config_home)
        .env("WAVE_DATABASE_URL", db_url)
        .env("RUST_LOG", "warn")
        .env_remove("WAVE_BIND")
        .env_remove("WAVE_PORT")
        .output()
        .expect("failed to run wave binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

async fn db_url_for(db_name: &str) -> String {
    format!("{}/{db_name}", pg_url().await)
}

async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(pool)
        .await
        .unwrap()
}

const OATMEAL_PLAN: &str = r#"{
    "health_specialist_id": "spec-1",
    "patient_id": "pat-1",
    "daily_plans": [
        {"day_index": 0, "meals": [{"name": "Oatmeal", "cals": 320}]},
        {"day_index": 1, "meals": [{"name": "Oatmeal", "cals": 320}]}
    ]
}"#;

#[tokio::test]
async fn plan_create_then_duplicate_exits_with_conflict() {
    let (pool, db_name) = create_test_db().await;
    let db_url = db_url_for(&db_name).await;
    let tmp = tempfile::TempDir::new().unwrap();
    let plan_file = tmp.path().join("plan.json");
    std::fs::write(&plan_file, OATMEAL_PLAN).unwrap();
    let plan_arg = plan_file.to_str().unwrap();

    let first = wave(tmp.path(), &db_url, &["plan", "create", "--kind", "meal", plan_arg]);
    assert!(first.status.success(), "stderr: {}", stderr(&first));
    assert!(stdout(&first).contains("Plan provisioned."));

    let second = wave(tmp.path(), &db_url, &["plan", "create", "--kind", "meal", plan_arg]);
    assert_eq!(second.status.code(), Some(EXIT_CONFLICT));
    assert!(
        stderr(&second).contains("already has an active meal plan"),
        "stderr: {}",
        stderr(&second)
    );

    assert_eq!(count(&pool, "plans").await, 1);
    assert_eq!(count(&pool, "daily_plans").await, 2);
    assert_eq!(count(&pool, "meals").await, 1);
    assert_eq!(count(&pool, "meal_maps").await, 2);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn plan_show_prints_days_and_items() {
    let (pool, db_name) = create_test_db().await;
    let db_url = db_url_for(&db_name).await;
    let tmp = tempfile::TempDir::new().unwrap();
    let plan_file = tmp.path().join("plan.toml");
    std::fs::write(
        &plan_file,
        r#"
health_specialist_id = "spec-2"
patient_id = "pat-7"

[[days]]
day_index = 0

[[days.items]]
name = "Squat"
reps = 10
sets = 3
"#,
    )
    .unwrap();

    let created = wave(
        tmp.path(),
        &db_url,
        &["plan", "create", "--kind", "exercise", plan_file.to_str().unwrap()],
    );
    assert!(created.status.success(), "stderr: {}", stderr(&created));

    let plan_id: Uuid = sqlx::query_scalar("SELECT id FROM plans WHERE patient_id = 'pat-7'")
        .fetch_one(&pool)
        .await
        .unwrap();

    let shown = wave(tmp.path(), &db_url, &["plan", "show", &plan_id.to_string()]);
    assert!(shown.status.success(), "stderr: {}", stderr(&shown));
    let out = stdout(&shown);
    assert!(out.contains("pat-7"));
    assert!(out.contains("Day 0"));
    assert!(out.contains("Squat (3 x 10)"));

    let missing = wave(tmp.path(), &db_url, &["plan", "show", &Uuid::new_v4().to_string()]);
    assert_eq!(missing.status.code(), Some(1));
    assert!(stderr(&missing).contains("not found"));

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn incomplete_plan_is_rejected_without_writes() {
    let (pool, db_name) = create_test_db().await;
    let db_url = db_url_for(&db_name).await;
    let tmp = tempfile::TempDir::new().unwrap();
    let plan_file = tmp.path().join("empty.json");
    std::fs::write(
        &plan_file,
        r#"{"health_specialist_id": "spec-1", "patient_id": "pat-1", "days": []}"#,
    )
    .unwrap();

    let output = wave(
        tmp.path(),
        &db_url,
        &["plan", "create", "--kind", "meal", plan_file.to_str().unwrap()],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("missing_data: days"));
    assert_eq!(count(&pool, "plans").await, 0);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[tokio::test]
async fn item_add_then_duplicate_exits_with_conflict() {
    let (pool, db_name) = create_test_db().await;
    let db_url = db_url_for(&db_name).await;
    let tmp = tempfile::TempDir::new().unwrap();
    let item_file = tmp.path().join("yogurt.toml");
    std::fs::write(
        &item_file,
        "name = \"Yogurt\"\nhealth_specialist_id = \"spec-1\"\ncals = 120\n",
    )
    .unwrap();
    let item_arg = item_file.to_str().unwrap();

    let first = wave(tmp.path(), &db_url, &["item", "add", "--kind", "meal", item_arg]);
    assert!(first.status.success(), "stderr: {}", stderr(&first));
    assert!(stdout(&first).contains("Library item registered."));

    let second = wave(tmp.path(), &db_url, &["item", "add", "--kind", "meal", item_arg]);
    assert_eq!(second.status.code(), Some(EXIT_CONFLICT));
    assert!(stderr(&second).contains("already exists"));
    assert_eq!(count(&pool, "meals").await, 1);

    pool.close().await;
    drop_test_db(&db_name).await;
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let tmp = tempfile::TempDir::new().unwrap();
    let url = "postgresql://localhost:5432/wave_cli_test";

    let first = wave(tmp.path(), url, &["init", "--db-url", url]);
    assert!(first.status.success(), "stderr: {}", stderr(&first));
    let written = std::fs::read_to_string(tmp.path().join("wave/config.toml")).unwrap();
    assert!(written.contains(url));

    let second = wave(tmp.path(), url, &["init", "--db-url", url]);
    assert!(!second.status.success());
    assert!(stderr(&second).contains("--force"));

    let forced = wave(tmp.path(), url, &["init", "--db-url", url, "--force"]);
    assert!(forced.status.success(), "stderr: {}", stderr(&forced));
}
