//! # Configuration
//!
//! Process settings for the server and the typed view over the
//! configuration document that drives the completion engine.

pub mod document;
pub mod server;

pub use document::{ConfigDocument, MatchConditions, MockConfig, Mode, Preset, ProxyConfig};
