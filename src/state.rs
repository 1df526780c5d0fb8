//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::db::Store;
use crate::notifications::{CustomerProvisioner, EventBus, EventListener};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StoreConfig,
    store: Arc<dyn Store>,
    events: EventBus,
}

impl AppState {
    /// Builds the state with the customer provisioner as the one required
    /// listener; `extra_listeners` are best-effort.
    pub fn new(config: StoreConfig, store: Arc<dyn Store>, extra_listeners: Vec<Arc<dyn EventListener>>) -> Self {
        let mut events = EventBus::new();
        events.register_required(Arc::new(CustomerProvisioner::new(store.clone())));
        for listener in extra_listeners {
            events.register(listener);
        }
        Self { inner: Arc::new(AppStateInner { config, store, events }) }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }
}
