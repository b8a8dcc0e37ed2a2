//! Shared axum application state (spec §4.9, component I).
//!
//! Grounded on the teacher's `server/state.rs`: same `Arc`-of-shared-handles
//! shape, narrowed to what this spec's thin HTTP/WS boundary needs — the
//! index store, the session service built atop it, and the session runtime.

use std::path::PathBuf;
use std::sync::Arc;

use crate::backup::BackupManager;
use crate::config::CoreConfig;
use crate::index::IndexStore;
use crate::runtime::SessionRuntime;
use crate::session_service::SessionService;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<IndexStore>,
    pub sessions: SessionService,
    pub backups: Arc<BackupManager>,
    pub runtime: Arc<SessionRuntime>,
    pub config: Arc<CoreConfig>,
}

impl AppState {
    pub fn new(
        store: Arc<IndexStore>,
        root: PathBuf,
        backups: BackupManager,
        config: CoreConfig,
    ) -> Self {
        let sessions = SessionService::new(store.clone(), root);
        let runtime = SessionRuntime::new(
            config.runtime.scrollback_bytes,
            config.runtime.spawn_timeout_ms,
            config.runtime.client_backpressure_bytes / 4096,
        );
        Self {
            store,
            sessions,
            backups: Arc::new(backups),
            runtime: Arc::new(runtime),
            config: Arc::new(config),
        }
    }
}
