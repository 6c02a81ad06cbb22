//! authproxy server - headless daemon
//!
//! Bridges a browser login redirect with a client that long-polls for the
//! result:
//! - `POST {prefix}/auth` starts a session and returns the provider login URL
//! - `GET {prefix}/auth` (or `/poll`) waits for the session's result
//! - `GET {prefix}/complete` receives the provider redirect
//!
//! Default listen address: http://0.0.0.0:8426

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod api;
mod cli;
mod commands;
mod config;
mod router;
mod server_utils;
mod state;

#[cfg(test)]
mod test_helpers;

use authproxy_core::Broker;
use cli::{Cli, Commands};
use config::ServerConfig;
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ServerConfig::from_args(&cli.serve)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Config { json } => commands::show_config(&config, json),
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    let addr = config.socket_addr();
    info!("authproxy starting on {}...", addr);

    let (broker, broker_task) = Broker::spawn(config.broker.clone())?;
    let shutdown = server_utils::shutdown_signal(broker.clone());
    let state = AppState::new(broker, config.clone());
    let app = router::build_router(state);

    let listener = server_utils::create_listener(addr).await?;
    info!("Server listening on http://{}", listener.local_addr()?);
    info!("Auth endpoint at {}", config.route("/auth"));

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    // The router held the last broker handles; the task exits once they are gone.
    if let Err(e) = broker_task.await {
        tracing::warn!("Broker task ended abnormally: {}", e);
    }
    info!("authproxy stopped");
    Ok(())
}
