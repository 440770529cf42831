use shared::config::server::StreamingConfig;

use crate::services::{
    config_store::SharedConfigStore, proxy_forwarder::ProxyForwarder,
    stream_framer::PacingPolicy,
};

// Application state shared across all routes
#[derive(Clone, Debug)]
pub struct AppState {
    pub(crate) config_store: SharedConfigStore,
    pub(crate) forwarder: ProxyForwarder,
    pub(crate) pacing: PacingPolicy,
    pub(crate) channel_capacity: usize,
}

impl AppState {
    pub fn new(
        config_store: SharedConfigStore,
        forwarder: ProxyForwarder,
        streaming: &StreamingConfig,
    ) -> Self {
        Self {
            config_store,
            forwarder,
            pacing: PacingPolicy::from_config(streaming),
            channel_capacity: streaming.channel_capacity,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_state(document: serde_json::Value) -> std::sync::Arc<AppState> {
    use shared::config::server::{Config, Profile};

    use crate::services::config_store::MemoryStore;

    let config = Config::default_for_profile(Profile::Test);
    std::sync::Arc::new(AppState::new(
        std::sync::Arc::new(MemoryStore::new(document)),
        ProxyForwarder::with_client(reqwest::Client::new()),
        &config.streaming,
    ))
}
