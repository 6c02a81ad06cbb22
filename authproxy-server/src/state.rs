//! Application State
//!
//! Shared by every handler: the broker handle and the server settings. Holds
//! no session data of its own.

use std::sync::Arc;

use authproxy_core::BrokerHandle;

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub broker: BrokerHandle,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(broker: BrokerHandle, config: ServerConfig) -> Self {
        Self { inner: Arc::new(AppStateInner { broker, config }) }
    }

    pub fn broker(&self) -> &BrokerHandle {
        &self.inner.broker
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }
}
