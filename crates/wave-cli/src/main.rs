mod config;
mod item_cmds;
mod plan_cmds;
mod serve_cmd;
#[cfg(test)]
mod test_util;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use wave_core::plan::{PgPlanStore, ProvisionError, RegisterError};
use wave_db::config::DbConfig;
use wave_db::models::PlanKind;
use wave_db::pool;

use config::{Overrides, WaveConfig};

/// Exit status when a plan or library item already exists.
const EXIT_CONFLICT: i32 = 3;

#[derive(Parser)]
#[command(name = "wave", about = "Treatment plan provisioning for wellness specialists")]
struct Cli {
    /// Database URL (overrides WAVE_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a wave config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = DbConfig::DEFAULT_URL)]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the wave database (requires config file or env vars)
    DbInit,
    /// Plan management
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Library item management
    Item {
        #[command(subcommand)]
        command: ItemCommands,
    },
    /// Serve the HTTP API
    Serve {
        /// Address to bind (overrides WAVE_BIND)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides WAVE_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Provision a plan from a TOML or JSON file
    Create {
        /// Plan kind: meal or exercise
        #[arg(long)]
        kind: PlanKind,
        /// Path to the plan file
        file: String,
    },
    /// Show a provisioned plan with its days and items
    Show {
        /// Plan ID to show
        plan_id: String,
    },
}

#[derive(Subcommand)]
pub enum ItemCommands {
    /// Register a meal or exercise in a specialist's library
    Add {
        /// Item kind: meal or exercise
        #[arg(long)]
        kind: PlanKind,
        /// Path to the item TOML or JSON file
        file: String,
    },
}

/// Execute the `wave init` command: write config file.
fn cmd_init(db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        server: config::ServerSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!();
    println!("Next: run `wave db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `wave db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = WaveConfig::resolve(Overrides {
        db_url: cli_db_url,
        ..Overrides::default()
    })?;

    println!("Initializing wave database...");

    if pool::ensure_database_exists(&resolved.db_config).await? {
        println!("Created database.");
    }
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("wave db-init complete.");
    Ok(())
}

/// Whether `err` reports an entity that already exists.
fn is_conflict(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<ProvisionError>(),
        Some(ProvisionError::Conflict { .. })
    ) || matches!(
        err.downcast_ref::<RegisterError>(),
        Some(RegisterError::AlreadyExists { .. })
    )
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let db_override = cli.database_url.as_deref();
    match cli.command {
        Commands::Init { db_url, force } => {
            cmd_init(&db_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(db_override).await?;
        }
        Commands::Plan { command } => {
            let resolved = WaveConfig::resolve(Overrides {
                db_url: db_override,
                ..Overrides::default()
            })?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = plan_cmds::run_plan_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Item { command } => {
            let resolved = WaveConfig::resolve(Overrides {
                db_url: db_override,
                ..Overrides::default()
            })?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = item_cmds::run_item_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Serve { bind, port } => {
            let resolved = WaveConfig::resolve(Overrides {
                db_url: db_override,
                bind: bind.as_deref(),
                port,
            })?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let store = Arc::new(PgPlanStore::new(db_pool.clone()));
            let result = serve_cmd::run_serve(store, &resolved.bind, resolved.port).await;
            db_pool.close().await;
            result?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        if is_conflict(&e) {
            eprintln!("{e:#}");
            std::process::exit(EXIT_CONFLICT);
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use uuid::Uuid;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_plan_create_with_kind() {
        let cli = Cli::try_parse_from(["wave", "plan", "create", "--kind", "exercise", "p.toml"])
            .unwrap();
        match cli.command {
            Commands::Plan {
                command: PlanCommands::Create { kind, file },
            } => {
                assert_eq!(kind, PlanKind::Exercise);
                assert_eq!(file, "p.toml");
            }
            _ => panic!("expected plan create"),
        }
    }

    #[test]
    fn rejects_unknown_kind() {
        let result = Cli::try_parse_from(["wave", "item", "add", "--kind", "snack", "s.json"]);
        assert!(result.is_err());
    }

    #[test]
    fn conflict_errors_are_recognised() {
        let conflict = anyhow::Error::new(ProvisionError::Conflict {
            patient_id: "pat-1".into(),
            kind: PlanKind::Meal,
        });
        assert!(is_conflict(&conflict));

        let exists = anyhow::Error::new(RegisterError::AlreadyExists {
            kind: PlanKind::Meal,
            name: "Oatmeal".into(),
            health_specialist_id: "spec-1".into(),
            id: Uuid::new_v4(),
        });
        assert!(is_conflict(&exists.context("registering item")));

        assert!(!is_conflict(&anyhow::Error::new(ProvisionError::Cancelled)));
        assert!(!is_conflict(&anyhow::anyhow!("plan not found")));
    }
}
