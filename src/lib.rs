pub mod cli;
pub mod config;
pub mod console;
pub mod logging;
pub mod model;
pub mod providers;
pub mod repl;
pub mod setup;

use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::rc::Rc;
use tracing::info;

use cli::{Cli, Command};
use config::ConfigError;
use console::TerminalConsole;
use logging::LoggingConfig;
use providers::{HttpTransport, Provider, ProviderKind};
use repl::run_session;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    if let Some(Command::Version) = cli.command {
        println!("ask v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    dotenvy::dotenv().ok();
    let _log_guard = logging::init(&LoggingConfig::from_env());

    let path = config::settings_path(cli.config.clone())?;
    info!(path = %path.display(), "resolved settings path");

    let selected = cli.provider.as_deref().map(ProviderKind::parse).transpose()?;
    let mut console = TerminalConsole::new();
    let settings = setup::load_or_setup(
        &path,
        &mut console,
        cli.update_config,
        selected,
        |key| env::var(key).ok(),
    )?;

    info!(
        path = %path.display(),
        default_provider = ?settings.default_provider,
        "loaded settings"
    );

    let kind = settings
        .active_provider(selected)
        .ok_or(ConfigError::NoDefaultProvider)?;

    let transport = HttpTransport::new().context("Failed to initialize HTTP client")?;
    let mut provider = Provider::new(kind, &settings, Rc::new(transport))?;

    run_session(&mut provider, &mut console, cli.session_mode()).await
}
