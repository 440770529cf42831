pub mod config_store;
pub mod preset_matcher;
pub mod proxy_forwarder;
pub mod stream_framer;
pub mod synthesizer;
