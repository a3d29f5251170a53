pub mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod db;
pub mod domain;
pub mod entities;
pub mod library;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;

use clap::Parser;
use cli::{Cli, Commands};
pub use config::Config;
use domain::events::NotificationEvent;
use services::Scheduler;
use state::SharedState;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if matches!(cli.command, Some(Commands::Init)) {
        if Config::create_default_if_missing()? {
            println!("✓ Config file created. Edit config.toml and run again.");
        } else {
            println!("Config file already exists.");
        }
        return Ok(());
    }

    let config = Config::load()?;
    config.validate()?;

    init_tracing(&config);

    let Some(command) = cli.command else {
        print_help();
        return Ok(());
    };

    let state = SharedState::new(config).await?;

    match command {
        Commands::Daemon => run_daemon(state).await,
        Commands::Check => cli::cmd_check(&state).await,
        Commands::RetryFailed => cli::cmd_retry_failed(&state).await,
        Commands::Search { query } => cli::cmd_search(&state, &query.join(" ")).await,
        Commands::Add {
            query,
            pick,
            download,
        } => cli::cmd_add_series(&state, &query.join(" "), pick, download).await,
        Commands::List => cli::cmd_list_series(&state).await,
        Commands::Episodes { id } => cli::cmd_episodes(&state, id).await,
        Commands::Downloaded => cli::cmd_downloaded(&state).await,
        Commands::Download { id } => cli::cmd_download(&state, id).await,
        Commands::Cancel { id } => cli::cmd_cancel(&state, id).await,
        Commands::Skip { id } => cli::cmd_skip(&state, id).await,
        Commands::Resume { id } => cli::cmd_resume(&state, id).await,
        Commands::CancelSeries { id } => cli::cmd_cancel_series(&state, id).await,
        Commands::SkipSeries { id } => cli::cmd_skip_series(&state, id).await,
        Commands::ResumeSeries { id } => cli::cmd_resume_series(&state, id).await,
        Commands::Remove { id, yes } => cli::cmd_remove_series(&state, id, yes).await,
        Commands::Init => Ok(()),
    }
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.general.log_format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn print_help() {
    println!(
        r#"animedl v{} - Anime episode downloader

USAGE:
    animedl <COMMAND> [ARGS]

COMMANDS:
    daemon, -d              Run the download worker and scheduler
    check, -c               Check for new episodes and download them
    retry-failed            Retry every failed episode
    search, s <query>       Search the catalog
    add, a <query>          Add a series (--pick N, --download)
    list, ls                List series in the library
    episodes, eps <id>      List episodes of a series
    downloaded              List downloaded episodes
    download <id>           Download a pending episode
    cancel <id>             Cancel an episode
    skip <id>               Skip an episode
    resume <id>             Resume a failed, skipped or cancelled episode
    cancel-series <id>      Cancel every unfinished episode of a series
    skip-series <id>        Skip every unfinished episode of a series
    resume-series <id>      Resume every stopped episode of a series
    remove, rm <id>         Remove a series and its files
    init                    Create a default config.toml

Run 'animedl help <COMMAND>' for details."#,
        env!("CARGO_PKG_VERSION")
    );
}

/// Logs every event published on the bus until it closes.
async fn log_events(mut rx: broadcast::Receiver<NotificationEvent>) {
    loop {
        match rx.recv().await {
            Ok(NotificationEvent::EpisodeProgress {
                episode_id,
                progress,
            }) => {
                debug!(episode_id = %episode_id, progress, "Download progress");
            }
            Ok(NotificationEvent::Error { message }) => {
                error!(event = "Error", "{message}");
            }
            Ok(event) => {
                info!(event = event.event_type(), payload = ?event, "Event");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event listener lagged behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn run_daemon(state: SharedState) -> anyhow::Result<()> {
    info!(
        "animedl v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    let events_handle = tokio::spawn(log_events(state.event_bus.subscribe()));
    let worker_handle = state.spawn_worker().await?;

    let scheduler = Arc::new(Scheduler::new(
        state.discovery.clone(),
        state.config().await.scheduler,
    ));

    let scheduler_handle = {
        let sched = Arc::clone(&scheduler);
        tokio::spawn(async move {
            if let Err(e) = sched.start().await {
                error!("Scheduler error: {}", e);
            }
        })
    };

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    scheduler.stop().await;
    state.queue.close();

    scheduler_handle.abort();
    worker_handle.abort();
    events_handle.abort();
    info!("Daemon stopped");

    Ok(())
}
