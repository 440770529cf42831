#![cfg_attr(not(test), forbid(unsafe_code))]
#![warn(clippy::pedantic)]

//! Entry point for the MockGPT server CLI.

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use shared::config::server::Config;
use std::path::PathBuf;

/// Main CLI structure for the MockGPT server
#[derive(Debug, Parser)]
#[command(name = "MockGPT")]
#[command(about = "Mock and proxy server for the OpenAI chat completions API", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the server
    Serve {
        /// Port to bind; overrides the settings file and `MOCKGPT_PORT`.
        #[arg(long, short)]
        port: Option<u16>,

        /// Settings file (YAML, JSON or TOML). Defaults are used when omitted.
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Configuration document path; overrides `MOCKGPT_CONFIG_DOCUMENT`.
        #[arg(long, short)]
        document: Option<PathBuf>,
    },
}

/// Resolves settings for `serve`, applying CLI overrides last.
///
/// # Errors
/// Returns an error if the settings cannot be loaded.
pub fn resolve_serve_config(
    port: Option<u16>,
    config: Option<PathBuf>,
    document: Option<PathBuf>,
) -> anyhow::Result<Config> {
    let mut resolved =
        Config::load_config(config, port).context("failed to load server configuration")?;
    if let Some(document) = document {
        resolved.store.document_path = document;
    }
    Ok(resolved)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            config,
            document,
        } => {
            let resolved = resolve_serve_config(port, config, document)?;
            server::server::run(resolved).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serial_test::serial;
    use shared::config::server::{ENV_CONFIG_DOCUMENT, ENV_PORT};
    use std::env;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_accepts_all_flags() {
        let cli = Cli::try_parse_from([
            "mockgpt",
            "serve",
            "--port",
            "8080",
            "--config",
            "settings.yaml",
            "-d",
            "presets.json",
        ])
        .unwrap();

        let Commands::Serve {
            port,
            config,
            document,
        } = cli.command;
        assert_eq!(port, Some(8080));
        assert_eq!(config, Some(PathBuf::from("settings.yaml")));
        assert_eq!(document, Some(PathBuf::from("presets.json")));
    }

    #[test]
    fn serve_rejects_invalid_port() {
        assert!(Cli::try_parse_from(["mockgpt", "serve", "--port", "99999"]).is_err());
    }

    #[test]
    #[serial]
    fn cli_overrides_win_over_environment() {
        unsafe {
            env::set_var(ENV_PORT, "7000");
            env::set_var(ENV_CONFIG_DOCUMENT, "/tmp/from-env.json");
        }

        let resolved =
            resolve_serve_config(Some(9000), None, Some(PathBuf::from("cli.json"))).unwrap();
        assert_eq!(resolved.server.port, 9000);
        assert_eq!(resolved.store.document_path, PathBuf::from("cli.json"));

        let from_env = resolve_serve_config(None, None, None).unwrap();
        assert_eq!(from_env.server.port, 7000);
        assert_eq!(
            from_env.store.document_path,
            PathBuf::from("/tmp/from-env.json")
        );

        unsafe {
            env::remove_var(ENV_PORT);
            env::remove_var(ENV_CONFIG_DOCUMENT);
        }
    }
}
