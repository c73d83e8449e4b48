#![forbid(unsafe_code)]

mod commands;

use clap::{Parser, Subcommand};
use menugrant_core::{
    AssignmentStore, Catalog, CatalogTreeLoader, Config, InMemoryAssignmentStore,
    LoggingListener, PersistenceService, RedbStorage, RoleSession,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "menugrant")]
#[command(about = "Role menu assignment CLI", version)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Roles,
    Show {
        #[arg(long)]
        role: String,
        #[arg(long)]
        expand_all: bool,
        #[arg(long)]
        json: bool,
    },
    Grant {
        #[arg(long)]
        role: String,
        #[arg(long = "toggle", required = true)]
        toggles: Vec<i64>,
        #[arg(long)]
        save: bool,
    },
    Payload {
        #[arg(long)]
        role: String,
    },
}

fn build_session<S>(config: &Config, catalog: Arc<Catalog>, store: Arc<S>) -> RoleSession
where
    S: AssignmentStore + PersistenceService + 'static,
{
    let loader = CatalogTreeLoader::new(Arc::clone(&catalog), store.clone())
        .with_limits(config.engine.limits());
    RoleSession::new(catalog, Arc::new(loader), store)
        .with_engine_config(&config.engine)
        .with_listener(Arc::new(LoggingListener))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(ref data_dir) = cli.data_dir {
        config = config.with_data_dir(data_dir.clone());
    }
    if let Some(ref catalog) = cli.catalog {
        config = config.with_catalog(catalog.clone());
    }

    let catalog_path = config
        .catalog_path
        .clone()
        .ok_or("no catalog configured; pass --catalog or set catalog_path in --config")?;
    let catalog = Arc::new(Catalog::load(&catalog_path)?);
    info!(
        path = %catalog_path.display(),
        roles = catalog.roles.len(),
        menus = catalog.menus.len(),
        "Catalog loaded"
    );

    let session = if cli.memory {
        build_session(&config, catalog, Arc::new(InMemoryAssignmentStore::new()))
    } else {
        config.ensure_data_dir()?;
        let storage = RedbStorage::open(config.db_path())?;
        build_session(&config, catalog, Arc::new(storage.assignment_store()))
    };

    match cli.command {
        Commands::Roles => commands::show::handle_roles(&session).await?,
        Commands::Show {
            role,
            expand_all,
            json,
        } => commands::show::handle_show(&session, &role, expand_all, json).await?,
        Commands::Grant {
            role,
            toggles,
            save,
        } => commands::grant::handle_grant(&session, &role, &toggles, save).await?,
        Commands::Payload { role } => commands::grant::handle_payload(&session, &role).await?,
    }

    Ok(())
}
