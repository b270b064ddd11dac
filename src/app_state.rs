//! Shared application state, assembled once in `main` and cloned into
//! every axum handler via `Router::with_state`.

use std::sync::Arc;

use crate::config::Config;
use crate::events::EventBus;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub events: EventBus,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Store, events: EventBus, config: Config) -> Self {
        Self {
            store,
            events,
            config: Arc::new(config),
        }
    }
}
