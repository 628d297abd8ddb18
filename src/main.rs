//! Kwork project monitor — binary entrypoint.
//!
//! Three deployment modes:
//!   `run`   — long-running daemon: Telegram long-polling + command-driven monitoring
//!   `serve` — stateless HTTP service: webhook, status, cron and metrics endpoints
//!   `check` — one check cycle, then exit (cron-friendly)

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kwork_monitor::api::{self, AppState};
use kwork_monitor::commands::{self, CommandDispatcher};
use kwork_monitor::config::Config;
use kwork_monitor::metrics::Metrics;
use kwork_monitor::notify::telegram::TelegramApi;
use kwork_monitor::notify::MessageTransport;
use kwork_monitor::proxy::{self, ProxySource};
use kwork_monitor::session::MonitorSession;

#[derive(Parser)]
#[command(name = "kwork-monitor", about = "Kwork new-project monitor")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Long-running bot: long-poll Telegram, monitoring driven by commands.
    Run,
    /// HTTP service exposing webhook, status, cron and metrics endpoints.
    Serve,
    /// Run a single check cycle and exit.
    Check,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op where the environment is real.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    // Missing BOT_TOKEN is the one fatal startup error.
    let cfg = Config::from_env().context("configuration")?;
    if cfg.chat_id.is_none() {
        tracing::warn!("CHAT_ID is not set; notifications go out only for command-triggered checks");
    }

    let api_client = TelegramApi::new(cfg.bot_token.clone());
    let transport: Arc<dyn MessageTransport> = Arc::new(api_client.clone());

    let proxies = proxy::manager_from_config(&cfg);
    if let Some(manager) = &proxies {
        // Validate a candidate up front so the first check starts on a route
        // that is known to work.
        match manager
            .first_working(&cfg.proxy_test_url, cfg.proxy_timeout)
            .await
        {
            Some(p) => tracing::info!(host = %p.host, port = p.port, "validated working proxy"),
            None => tracing::warn!("no working proxy found, requests may go direct"),
        }
    }
    let proxies = proxies.map(|m| Arc::new(m) as Arc<dyn ProxySource>);

    let session = MonitorSession::new(cfg.clone(), transport.clone(), proxies);
    let dispatcher = Arc::new(CommandDispatcher::new(session.clone(), transport));

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            tracing::info!("starting kwork monitor bot");
            commands::run_update_loop(api_client, dispatcher).await
        }
        Command::Serve => {
            let metrics = Metrics::init(cfg.check_interval.as_secs());
            let state = AppState {
                session,
                dispatcher,
            };
            let router = api::router(state).merge(metrics.router());

            let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.port));
            tracing::info!(%addr, "serving HTTP endpoints");
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .context("binding listener")?;
            axum::serve(listener, router).await.context("http server")
        }
        Command::Check => {
            let report = session.check_now(None).await;
            tracing::info!(
                fetched = report.fetched,
                found = report.found,
                delivered = report.delivered,
                "check finished"
            );
            println!(
                "found {} new projects, delivered {}",
                report.found, report.delivered
            );
            Ok(())
        }
    }
}
