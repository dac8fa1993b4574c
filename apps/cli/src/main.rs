//! CraftNet Supervisor CLI
//!
//! Installs the CraftNet client as an OS service and reports its health.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use craftnet_logging::LogLevel;
use craftnet_settings::{default_settings_path, Settings};
use craftnet_supervisor::{InstalledServiceState, OsSystem, ServiceStatus, Supervisor};

/// CraftNet Supervisor - keeps the CraftNet client service installed and running
#[derive(Parser)]
#[command(name = "craftnet-supervisor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which installation checks pass
    Check,

    /// Fix every failing installation check
    Install {
        /// Return without waiting for the client to come up
        #[arg(long)]
        no_wait: bool,
    },

    /// Start the installed service
    Start,

    /// Print client status changes until interrupted
    Watch {
        /// Print every probe result, not only changes
        #[arg(short, long)]
        all: bool,
    },

    /// Wait until the client is up (or down)
    Wait {
        /// Wait for the client to go down instead
        #[arg(long)]
        down: bool,

        /// Ignore the current status and wait for the next probe result
        #[arg(long)]
        new: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    craftnet_logging::init(level);

    let settings_path = cli.config.unwrap_or_else(default_settings_path);
    let settings = Settings::load_from(&settings_path)
        .with_context(|| format!("Failed to load settings from {:?}", settings_path))?;
    debug!("Using settings from {:?}", settings_path);

    let supervisor = Supervisor::from_settings(&settings, Arc::new(OsSystem::new()))
        .context("Failed to set up supervisor")?;

    match cli.command {
        Commands::Check => {
            check(&supervisor).await?;
        }
        Commands::Install { no_wait } => {
            install(&supervisor, no_wait).await?;
        }
        Commands::Start => {
            supervisor.service_manager().start().await?;
            println!("Service {} started", supervisor.service_manager().service_name());
        }
        Commands::Watch { all } => {
            watch(&supervisor, all).await?;
        }
        Commands::Wait { down, new } => {
            wait(&supervisor, down, new).await?;
        }
    }

    Ok(())
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "MISSING"
    }
}

fn print_state(state: &InstalledServiceState) {
    println!("Service-manager config: {}", mark(state.config_matches));
    println!("Service running:        {}", mark(state.service_installed));
    println!("TAP drivers:            {}", mark(state.drivers_installed));
}

async fn check(supervisor: &Supervisor) -> Result<()> {
    let state = supervisor.installer().inspect().await;

    println!("CraftNet Client Installation");
    println!("============================");
    print_state(&state);

    if !state.is_complete() {
        anyhow::bail!("Installation incomplete; run `craftnet-supervisor install`");
    }
    Ok(())
}

async fn install(supervisor: &Supervisor, no_wait: bool) -> Result<()> {
    let before = supervisor
        .installer()
        .install()
        .await
        .context("Installation failed")?;

    if before.is_complete() {
        println!("Nothing to do, installation is up to date");
    } else {
        println!("Fixed:");
        print_state(&before);
    }

    if no_wait {
        return Ok(());
    }

    let monitoring = supervisor.monitoring();
    monitoring.start();
    info!("Waiting for the client to come up...");
    let result = monitoring.wait_for_status_up_with_timeout().await;
    monitoring.stop();

    result.context("Client did not come up after installation")?;
    println!("Client is up");
    Ok(())
}

async fn watch(supervisor: &Supervisor, all: bool) -> Result<()> {
    let monitoring = supervisor.monitoring();

    let subscriptions = if all {
        vec![monitoring.on_status(|alive| {
            println!("{}", ServiceStatus::from(alive));
        })]
    } else {
        vec![
            monitoring.on_status_change_up(|| println!("Client is up")),
            monitoring.on_status_change_down(|| println!("Client is down")),
        ]
    };

    monitoring.start();
    info!("Watching client status. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;

    monitoring.stop();
    for subscription in subscriptions {
        subscription.unsubscribe();
    }
    Ok(())
}

async fn wait(supervisor: &Supervisor, down: bool, new: bool) -> Result<()> {
    let monitoring = supervisor.monitoring();
    monitoring.start();

    let waiting = match (down, new) {
        (false, false) => monitoring.wait_for_status_up_with_timeout(),
        (false, true) => monitoring.wait_for_new_status_up_with_timeout(),
        (true, false) => monitoring.wait_for_status_down_with_timeout(),
        (true, true) => monitoring.wait_for_new_status_down_with_timeout(),
    };
    let result = waiting.await;
    monitoring.stop();

    let target = if down { "down" } else { "up" };
    result.with_context(|| format!("Client did not report {}", target))?;
    println!("Client is {}", target);
    Ok(())
}
