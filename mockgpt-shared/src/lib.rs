#![cfg_attr(not(test), forbid(unsafe_code))]
#![warn(clippy::pedantic)]

//! Wire models and configuration types shared by the MockGPT crates.

pub mod config;
pub mod models;
