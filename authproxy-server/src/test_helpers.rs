//! Test helpers for authproxy-server unit tests.

use authproxy_core::{Broker, BrokerConfig};

use crate::config::ServerConfig;
use crate::state::AppState;

/// Create an `AppState` backed by a freshly spawned broker.
pub fn test_app_state() -> AppState {
    test_app_state_with(ServerConfig::default())
}

pub fn test_app_state_with(config: ServerConfig) -> AppState {
    let broker_config: BrokerConfig = config.broker.clone();
    let (broker, _task) = Broker::spawn(broker_config).expect("failed to spawn test broker");
    AppState::new(broker, config)
}
