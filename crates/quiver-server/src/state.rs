use std::sync::Arc;

use dashmap::DashMap;

use quiver_client::Client;
use quiver_db::Database;
use quiver_rpc::HandlerError;

use crate::config::GlobalConfig;
use crate::handlers::{client_not_found, database_not_found};

/// Process-wide state: the configured clients and the database registry.
pub struct AppState {
    pub config: GlobalConfig,
    pub global_clients: DashMap<String, Arc<Client>>,
    pub databases: DashMap<String, Arc<Database<serde_json::Value>>>,
}

impl AppState {
    pub fn new(config: GlobalConfig) -> Self {
        Self {
            config,
            global_clients: DashMap::new(),
            databases: DashMap::new(),
        }
    }

    /// Creates the per-connection view: global state plus an empty
    /// session-client overlay.
    pub fn session(self: &Arc<Self>) -> ServiceState {
        ServiceState {
            app: Arc::clone(self),
            session_clients: Arc::new(DashMap::new()),
        }
    }
}

/// State handed to every handler. Clients registered via `setClient` live
/// in the session overlay and shadow the global ones; databases are always
/// global.
#[derive(Clone)]
pub struct ServiceState {
    pub app: Arc<AppState>,
    pub session_clients: Arc<DashMap<String, Arc<Client>>>,
}

impl ServiceState {
    pub fn client(&self, id: &str) -> Result<Arc<Client>, HandlerError> {
        if let Some(client) = self.session_clients.get(id) {
            return Ok(Arc::clone(&client));
        }
        if let Some(client) = self.app.global_clients.get(id) {
            return Ok(Arc::clone(&client));
        }
        Err(client_not_found())
    }

    pub fn set_client(&self, id: String, client: Arc<Client>) {
        self.session_clients.insert(id, client);
    }

    pub fn database(&self, id: &str) -> Result<Arc<Database<serde_json::Value>>, HandlerError> {
        self.app
            .databases
            .get(id)
            .map(|db| Arc::clone(&db))
            .ok_or_else(database_not_found)
    }
}
