use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use heater_core::{system_clock, Controller};
use heater_server::config::Config;
use heater_server::driver::spawn_refresh_loop;
use heater_server::web::create_router;

#[derive(Parser, Debug)]
#[command(name = "heater-server", about = "Thermostat for a single relay-driven heater")]
struct Args {
    /// TOML configuration file (defaults to ./heater.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("heater_server=info,heater_core=info,tower_http=info")
        }))
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    let controller = Controller::start(
        config.control_settings()?,
        config.build_relay(),
        config.build_sensor()?,
        system_clock(),
    )
    .await
    .context("Failed to start heater controller")?;
    let controller = Arc::new(controller);

    let driver = spawn_refresh_loop(controller.clone(), config.refresh_interval());

    let app = create_router(
        controller.clone(),
        config.server.static_dir.clone(),
        config.server.enable_cors,
    );
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Starting heater server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    driver.abort();
    controller
        .shutdown()
        .await
        .context("Failed to switch heater off on shutdown")?;
    info!("Heater off, bye");
    Ok(())
}
