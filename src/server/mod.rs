pub mod api;
pub mod errors;
pub mod params;
pub mod router;
pub mod state;

use anyhow::Result;

use crate::backup::BackupManager;
use crate::config::CoreConfig;
use crate::index::IndexStore;
use state::AppState;

/// Start the web server on the given port (spec §4.9, component I).
pub async fn start_server(config: &CoreConfig, port: u16) -> Result<()> {
    let store = IndexStore::open(&config.db_path(), &config.sqlite)?;
    let root = config.resolved_root();
    let backups = BackupManager::new(
        root.join("projects"),
        config.backup_root(),
        config.backup.interval_minutes as u64,
        config.backup.max_backups as usize,
    );

    if let Some(snapshot) = backups.auto_backup()? {
        tracing::info!("startup backup created at {}", snapshot.path.display());
    }

    let state = AppState::new(std::sync::Arc::new(store), root, backups, config.clone());
    let app = router::build_router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("starting server at http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
