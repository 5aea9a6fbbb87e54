//! Relbot - GitHub webhook server for release automation
//!
//! Publishes releases when tracked repositories are tagged and keeps the
//! meta repository's version pins up to date.

mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use relbot_core::bootstrap::{Bootstrap, ConfigSource};
use relbot_core::{Config, EventRouter, ReleaseProcess};
use relbot_github::GitHubRepoFactory;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use server::{build_router, AppState};

/// Relbot: release automation driven by GitHub webhooks
#[derive(Parser, Debug)]
#[command(name = "relbot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true, env = "RELBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on (overrides config and env)
    #[arg(long, global = true)]
    bind: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the webhook server (default)
    Serve,

    /// Load and validate the config file, then print a summary
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let path = match cli.config.clone().or_else(Config::default_config_path) {
        Some(path) => path,
        None => anyhow::bail!("No config file given and no default config directory"),
    };

    let config = Config::load_with_overrides(&path, cli.bind.clone())
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    if cli.verbose {
        info!(
            config = %path.display(),
            working_dir = %config.working_dir.display(),
            meta_repo = %config.meta_repo,
            repos = config.repos.len(),
            "Configuration loaded"
        );
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::CheckConfig => print_config(&path, &config),
        Commands::Serve => serve(config).await?,
    }

    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let bind = config.server.bind.clone();

    let bootstrap = Bootstrap::new(
        ConfigSource::Loaded(config),
        Arc::new(GitHubRepoFactory),
        Arc::new(ReleaseProcess::new()),
    );
    let ctx = bootstrap
        .context()
        .await
        .context("Failed to prepare working directory")?;

    let router = EventRouter::standard();
    info!(
        events = ?router.event_types(),
        repos = ?ctx.registry().names(),
        "Event handlers registered"
    );

    let app = build_router(AppState::new(ctx, router));

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!(address = %bind, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

fn print_config(path: &std::path::Path, config: &Config) {
    println!("Relbot Configuration");
    println!("====================");
    println!();
    println!("Config file: {}", path.display());
    println!("  working_dir: {}", config.working_dir.display());
    println!("  meta_repo: {}", config.meta_repo);
    println!("  lock_timeout: {:?}", config.lock_timeout);
    println!("  bind: {}", config.server.bind);
    println!();
    println!("Meta bump:");
    match &config.bump.pin_file {
        Some(pin_file) => {
            println!("  pin_file: {}", pin_file.display());
            println!("  title: {}", config.bump.title);
            println!("  branch: {}", config.bump.branch);
        }
        None => println!("  (disabled - no pin_file)"),
    }
    println!();
    println!("Tracked repositories:");
    for repo in &config.repos {
        println!(
            "  {}{}{}",
            repo.name,
            repo.package
                .as_deref()
                .map(|p| format!(" (package {})", p))
                .unwrap_or_default(),
            if repo.branch_on_release {
                " [stable branches]"
            } else {
                ""
            }
        );
    }
}
