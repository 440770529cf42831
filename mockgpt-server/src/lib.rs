//! MockGPT server: an OpenAI-compatible chat completions endpoint that either
//! answers from configured mocks or forwards to a real upstream.

pub mod app_state;
mod handlers;
mod http;
mod middleware;
mod routes;
pub mod server;
pub mod services;
mod tracer;
