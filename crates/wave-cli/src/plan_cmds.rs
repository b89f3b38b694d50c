//! CLI handlers for `wave plan` subcommands.
//!
//! Implements:
//! - `wave plan create --kind <kind> <file>` -- provision a plan from a TOML or JSON file
//! - `wave plan show <plan-id>`              -- print a persisted plan graph

use std::path::Path;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use wave_core::plan::{
    ExerciseSpec, LibraryItemSpec, MealSpec, PersistedPlan, PgPlanStore, PlanProvisioner,
    PlanRequest,
};
use wave_db::models::{LibraryItem, PlanKind};

use crate::PlanCommands;

/// Dispatch a `PlanCommands` variant to the appropriate handler.
pub async fn run_plan_command(command: PlanCommands, pool: &PgPool) -> Result<()> {
    let provisioner = PlanProvisioner::new(PgPlanStore::new(pool.clone()));
    match command {
        PlanCommands::Create { kind, file } => match kind {
            PlanKind::Meal => cmd_create::<MealSpec>(&provisioner, &file).await,
            PlanKind::Exercise => cmd_create::<ExerciseSpec>(&provisioner, &file).await,
        },
        PlanCommands::Show { plan_id } => cmd_show(&provisioner, &plan_id).await,
    }
}

// -----------------------------------------------------------------------
// wave plan create
// -----------------------------------------------------------------------

async fn cmd_create<I: LibraryItemSpec>(
    provisioner: &PlanProvisioner<PgPlanStore>,
    file_path: &str,
) -> Result<()> {
    let request = PlanRequest::<I>::from_file(Path::new(file_path))?;

    // Ctrl+C abandons the transaction instead of killing the process mid-write.
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });
    let result = provisioner.provision_with_cancel(request, &cancel).await;
    watcher.abort();

    let persisted = result?;
    println!("Plan provisioned.");
    println!();
    print_summary(&persisted);
    Ok(())
}

// -----------------------------------------------------------------------
// wave plan show
// -----------------------------------------------------------------------

async fn cmd_show(provisioner: &PlanProvisioner<PgPlanStore>, plan_id_str: &str) -> Result<()> {
    let plan_id = Uuid::parse_str(plan_id_str)
        .with_context(|| format!("invalid plan ID: {plan_id_str}"))?;

    let persisted = provisioner
        .load_plan_graph(plan_id)
        .await?
        .with_context(|| format!("plan {plan_id} not found"))?;

    print_summary(&persisted);
    println!();
    for day in &persisted.days {
        println!("Day {} ({})", day.day_index, day.id);
        for item in persisted.items_for_day(day.id) {
            println!("  - {}", describe(item));
        }
    }
    Ok(())
}

fn print_summary(persisted: &PersistedPlan) {
    let plan = &persisted.plan;
    println!("  Plan ID:     {}", plan.id);
    println!("  Kind:        {}", plan.kind);
    println!("  Specialist:  {}", plan.health_specialist_id);
    println!("  Patient:     {}", plan.patient_id);
    println!("  Created:     {}", plan.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Days:        {}", persisted.days.len());
    println!("  Items:       {}", persisted.items.len());
    println!("  Links:       {}", persisted.relations.len());
}

fn describe(item: &LibraryItem) -> String {
    match item {
        LibraryItem::Meal(meal) if meal.cals > 0 => format!("{} ({} kcal)", meal.name, meal.cals),
        LibraryItem::Meal(meal) => meal.name.clone(),
        LibraryItem::Exercise(ex) if ex.sets > 0 => {
            format!("{} ({} x {})", ex.name, ex.sets, ex.reps)
        }
        LibraryItem::Exercise(ex) => ex.name.clone(),
    }
}
