use std::sync::Arc;

use clap::Parser;
use flytime_core::config::{FlytimeConfig, StoreBackend};
use flytime_scheduler::FlightScheduler;
use flytime_store::{DurationStore, MemoryStore, PostgresStore, SqliteStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

mod app;
mod commands;
mod console;
mod host;

use app::{App, Sender};
use console::ConsoleInput;
use host::ConsoleHost;

/// Timed flight for players, driven from the console.
#[derive(Debug, Parser)]
#[command(name = "flytime-gateway", version, about)]
struct Cli {
    /// Config file (default: ~/.flytime/flytime.toml).
    #[arg(long, env = "FLYTIME_CONFIG")]
    config: Option<String>,

    /// SQLite database path; overrides `[database] path`.
    #[arg(long)]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "flytime_gateway=info,flytime_scheduler=info,flytime_store=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();

    // load config: --config / FLYTIME_CONFIG > ~/.flytime/flytime.toml
    let mut config = FlytimeConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(code = e.code(), "Config load failed ({}), using defaults", e);
        FlytimeConfig::default()
    });
    if let Some(path) = cli.database {
        config.database.path = path;
    }

    let store: Arc<dyn DurationStore> = match config.database.backend {
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(&config.database.path)?),
        StoreBackend::Postgres => {
            let Some(url) = config.database.url.as_deref() else {
                anyhow::bail!("database.url is required for the postgres backend");
            };
            Arc::new(PostgresStore::connect(url, config.database.max_connections).await?)
        }
        StoreBackend::Memory => {
            warn!("using in-memory store; flight time is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let host = Arc::new(ConsoleHost::new());
    let scheduler = FlightScheduler::new(
        store,
        host.clone(),
        config.scheduler.tick_interval(),
    );
    let app = App::new(scheduler, host);
    info!(
        backend = app.scheduler.store().backend(),
        tick_secs = app.scheduler.interval().as_secs(),
        "flytime ready; type `join <name>` to begin"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("stdin closed");
                    break;
                };
                if !handle_line(&app, &line).await {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
                break;
            }
        }
    }

    let stopped = app.scheduler.shutdown().await;
    info!(stopped, "flytime stopped");
    Ok(())
}

/// Handle one console line. Returns `false` once the console asks to quit.
async fn handle_line(app: &App, line: &str) -> bool {
    let reply = match console::parse_line(line) {
        Ok(ConsoleInput::Empty) => return true,
        Ok(ConsoleInput::Quit) => return false,
        Ok(ConsoleInput::Join(name)) => app.join(&name).await,
        Ok(ConsoleInput::Leave(name)) => app.leave(&name).await,
        Ok(ConsoleInput::Use(name)) => app.use_voucher(&name).await,
        Ok(ConsoleInput::Inventory(name)) => app.inventory(&name),
        Ok(ConsoleInput::Command(command)) => app.execute(Sender::Console, command).await,
        Ok(ConsoleInput::As { player, command }) => match app.host.online_id(&player) {
            Some(id) => app.execute(Sender::Player(id), command).await,
            None => format!("Player '{player}' is not online."),
        },
        Err(e) => e.to_string(),
    };
    println!("{reply}");
    true
}
