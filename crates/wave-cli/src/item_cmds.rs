//! CLI handlers for `wave item` subcommands.

use std::path::Path;

use anyhow::{Context, Result, bail};
use sqlx::PgPool;

use wave_core::plan::{ExerciseSpec, LibraryItemSpec, MealSpec, PgPlanStore, PlanProvisioner};
use wave_db::models::PlanKind;

use crate::ItemCommands;

pub async fn run_item_command(command: ItemCommands, pool: &PgPool) -> Result<()> {
    let provisioner = PlanProvisioner::new(PgPlanStore::new(pool.clone()));
    match command {
        ItemCommands::Add { kind, file } => match kind {
            PlanKind::Meal => cmd_add::<MealSpec>(&provisioner, &file).await,
            PlanKind::Exercise => cmd_add::<ExerciseSpec>(&provisioner, &file).await,
        },
    }
}

async fn cmd_add<I: LibraryItemSpec>(
    provisioner: &PlanProvisioner<PgPlanStore>,
    file_path: &str,
) -> Result<()> {
    let spec: I = read_spec(Path::new(file_path))?;
    let item = provisioner.register_library_item(spec).await?;

    println!("Library item registered.");
    println!();
    println!("  ID:          {}", item.id());
    println!("  Kind:        {}", item.kind());
    println!("  Name:        {}", item.name());
    println!("  Specialist:  {}", item.health_specialist_id());
    Ok(())
}

/// Read one item definition, choosing the format by extension.
fn read_spec<I: LibraryItemSpec>(path: &Path) -> Result<I> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read item file: {}", path.display()))?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("failed to parse item JSON: {}", path.display())),
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("failed to parse item TOML: {}", path.display())),
        other => bail!(
            "unsupported item file extension {:?} (expected .json or .toml)",
            other.unwrap_or("")
        ),
    }
}
