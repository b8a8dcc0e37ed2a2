use archivist::backup::BackupManager;
use archivist::config::{self, CoreConfig};
use archivist::index::{IndexStore, ListOptions};
use archivist::session_service::SessionService;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "archivist", version, about = "Index and explore local AI coding-session transcripts")]
struct Cli {
    /// Path to config file (default: ~/.archivist/archivist.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the index with the on-disk transcript tree
    Sync {
        /// Drop and rebuild the schema before syncing
        #[arg(long)]
        rebuild: bool,
    },

    /// List indexed sessions
    List {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        include_deleted: bool,
    },

    /// Full-text search across indexed messages
    Search {
        query: String,
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Set or clear a session's title override
    Rename { id: String, title: String },

    /// Move a session's transcript to a new working directory
    Move { id: String, dest: String },

    /// Restore a soft-deleted session from the most recent backup
    Restore { id: String },

    /// Snapshot the transcript tree to the backup root
    Backup {
        /// Run even if the configured interval hasn't elapsed
        #[arg(long)]
        now: bool,
    },

    /// Start the HTTP/WS server
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() {
    let cli = Cli::parse();

    let cfg = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config: {e:#}");
            std::process::exit(1);
        }
    };

    // Priority: RUST_LOG env > config file log_level > "info"
    let log_level = cfg.resolved_log_level().to_string();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    let result = match cli.command {
        Commands::Sync { rebuild } => run_sync(&cfg, rebuild),
        Commands::List { project, include_deleted } => run_list(&cfg, project, include_deleted),
        Commands::Search { query, limit } => run_search(&cfg, &query, limit),
        Commands::Rename { id, title } => run_rename(&cfg, &id, &title),
        Commands::Move { id, dest } => run_move(&cfg, &id, &dest),
        Commands::Restore { id } => run_restore(&cfg, &id),
        Commands::Backup { now } => run_backup(&cfg, now),
        Commands::Serve { port } => run_serve(&cfg, port),
    };

    if let Err(e) = result {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn open_store(cfg: &CoreConfig) -> anyhow::Result<IndexStore> {
    IndexStore::open(&cfg.db_path(), &cfg.sqlite)
}

fn run_sync(cfg: &CoreConfig, rebuild: bool) -> anyhow::Result<()> {
    let store = open_store(cfg)?;
    let root = cfg.resolved_root();
    let counts = if rebuild { store.rebuild(&root)? } else { store.sync(&root)? };
    println!("{}", serde_json::to_string_pretty(&counts)?);
    Ok(())
}

fn run_list(cfg: &CoreConfig, project: Option<String>, include_deleted: bool) -> anyhow::Result<()> {
    let store = open_store(cfg)?;
    let sessions = store.list(&ListOptions {
        include_deleted,
        project_path: project,
    })?;
    println!("{}", serde_json::to_string_pretty(&sessions)?);
    Ok(())
}

fn run_search(cfg: &CoreConfig, query: &str, limit: u32) -> anyhow::Result<()> {
    let store = open_store(cfg)?;
    let hits = store.search(query, limit, 3)?;
    println!("{}", serde_json::to_string_pretty(&hits)?);
    Ok(())
}

fn run_rename(cfg: &CoreConfig, id: &str, title: &str) -> anyhow::Result<()> {
    let store = open_store(cfg)?;
    let service = SessionService::new(Arc::new(store), cfg.resolved_root());
    service.rename_session(id, title)?;
    Ok(())
}

fn run_move(cfg: &CoreConfig, id: &str, dest: &str) -> anyhow::Result<()> {
    let store = open_store(cfg)?;
    let service = SessionService::new(Arc::new(store), cfg.resolved_root());
    let session = service.move_session(id, dest)?;
    println!("{}", serde_json::to_string_pretty(&session)?);
    Ok(())
}

fn run_restore(cfg: &CoreConfig, id: &str) -> anyhow::Result<()> {
    let store = open_store(cfg)?;
    let root = cfg.resolved_root();
    let backups = BackupManager::new(
        root.join("projects"),
        cfg.backup_root(),
        cfg.backup.interval_minutes as u64,
        cfg.backup.max_backups as usize,
    );
    let service = SessionService::new(Arc::new(store), root);
    service.restore_deleted(id, &backups)
}

fn run_backup(cfg: &CoreConfig, now: bool) -> anyhow::Result<()> {
    let root = cfg.resolved_root();
    let backups = BackupManager::new(
        root.join("projects"),
        cfg.backup_root(),
        cfg.backup.interval_minutes as u64,
        cfg.backup.max_backups as usize,
    );
    let snapshot = if now { Some(backups.backup()?) } else { backups.auto_backup()? };
    match snapshot {
        Some(s) => println!("backup created at {}", s.path.display()),
        None => println!("backup not needed yet"),
    }
    Ok(())
}

fn run_serve(cfg: &CoreConfig, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(8787);
    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    rt.block_on(async { archivist::server::start_server(cfg, port).await })
}
