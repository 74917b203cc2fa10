//! Wiring shared by every command: config, store, remote client,
//! connectivity, engine and facade.

use anyhow::{Context, Result};
use catalog_db::{Database, DbConfig, LocalStore};
use catalog_sync::{
    Catalog, CatalogConfig, ConnectivityMonitor, HttpRemoteClient, RemoteClient, SyncEngine,
};
use std::sync::Arc;
use tracing::{debug, info};

pub struct AppContext {
    pub config: CatalogConfig,
    pub offline: bool,
    pub database: Database,
    pub store: LocalStore,
    pub remote: Arc<dyn RemoteClient>,
    pub connectivity: ConnectivityMonitor,
    pub engine: Arc<SyncEngine>,
    pub catalog: Catalog,
}

impl AppContext {
    pub async fn open(config: CatalogConfig, offline: bool) -> Result<Self> {
        let db_path = config.database_path();
        info!(path = %db_path.display(), "Opening local store");

        let database = Database::new(DbConfig::new(&db_path))
            .await
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
        let store = database.store();

        let remote: Arc<dyn RemoteClient> = Arc::new(
            HttpRemoteClient::new(&config.api).context("Failed to build the API client")?,
        );

        // Assume reachable until a probe or a failed attempt says otherwise
        let connectivity = ConnectivityMonitor::new(!offline);

        let engine = Arc::new(SyncEngine::new(
            store.clone(),
            remote.clone(),
            connectivity.clone(),
            config.sync.clone(),
        ));

        let catalog = Catalog::new(store.clone(), remote.clone(), connectivity.clone());

        Ok(AppContext {
            config,
            offline,
            database,
            store,
            remote,
            connectivity,
            engine,
            catalog,
        })
    }

    /// Refreshes the online flag from the server, unless `--offline`.
    pub async fn refresh_connectivity(&self) -> bool {
        if self.offline {
            return false;
        }

        let online = self.remote.check_connectivity().await;
        debug!(online, "Checked connectivity");
        self.connectivity.set_online(online);
        online
    }

    pub async fn close(&self) {
        self.database.close().await;
    }
}
