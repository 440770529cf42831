pub mod completions;
pub mod config;
