use std::sync::Arc;

use crate::{
    config::Config,
    database::Database,
    services::{NotificationDispatcher, PushHub, StockLedger, ThresholdMonitor},
    store::{InventoryStore, PgStore},
};

/// Everything a handler needs, wired once at startup.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub store: Arc<dyn InventoryStore>,
    pub hub: Arc<PushHub>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub ledger: Arc<StockLedger>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        let store: Arc<dyn InventoryStore> = Arc::new(PgStore::new(db.clone()));
        let hub = Arc::new(PushHub::new(config.push_channel_capacity));
        let dispatcher = Arc::new(NotificationDispatcher::new(store.clone(), hub.clone()));
        let ledger = Arc::new(StockLedger::new(
            store.clone(),
            ThresholdMonitor::new(dispatcher.clone()),
        ));

        Self {
            db,
            config: Arc::new(config),
            store,
            hub,
            dispatcher,
            ledger,
        }
    }
}
