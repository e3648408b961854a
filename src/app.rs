//! Process-wide state shared by the servers.

use std::sync::Arc;

use crate::config::Config;
use crate::db::{Store, StoreError};

/// Everything the servers need, built once at startup.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub store: Store,
}

impl AppContext {
    /// Opens the configured database.
    pub fn open(config: Config) -> Result<Self, StoreError> {
        let store = Store::open_with(&config.database_path, config.store_options())?;
        Ok(Self::new(config, store))
    }

    pub fn new(config: Config, store: Store) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }
}
