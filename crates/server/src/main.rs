mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use almanac_compute::Scheduler;
use almanac_core::{SharedClock, SystemClock};
use almanac_server::{build_router, startup, AppState, Settings, SettingsReloader};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};

fn load_config() -> almanac_core::Config {
    almanac_core::config::load_dotenv();
    almanac_core::Config::from_env()
}

/// The settings file in use, and whether it was named on the command line.
fn settings_path(config: &almanac_core::Config, cli: &Cli) -> (PathBuf, bool) {
    match &cli.settings {
        Some(path) => (path.clone(), true),
        None => (config.paths.settings_file.clone(), false),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_config();
    let cli = Cli::parse();
    let (path, explicit) = settings_path(&config, &cli);
    let settings = Settings::load(&path, explicit)?;
    let clock: SharedClock = Arc::new(SystemClock);

    match cli.command {
        Some(Command::Export { scope }) => export(&settings, clock, scope.as_deref()).await,
        Some(Command::Serve { host, port }) => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            serve(&config, &settings, path, clock, &host, port).await
        }
        None => {
            let (host, port) = (config.server.host.clone(), config.server.port);
            serve(&config, &settings, path, clock, &host, port).await
        }
    }
}

async fn export(settings: &Settings, clock: SharedClock, scope: Option<&str>) -> anyhow::Result<()> {
    let engine = startup::build_engine(settings, clock).await?;
    engine.refresh_all().await?;
    let data = engine.export(scope)?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    engine.close();
    Ok(())
}

async fn serve(
    config: &almanac_core::Config,
    settings: &Settings,
    settings_path: PathBuf,
    clock: SharedClock,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    config.log_summary();
    let engine = startup::build_engine(settings, clock).await?;

    let scheduler = Scheduler::new(Arc::clone(&engine));
    scheduler.start().await?;

    let reloader = Arc::new(SettingsReloader::new(settings_path, Arc::clone(&engine)));
    let _watch = match Arc::clone(&reloader).watch() {
        Ok(watch) => Some(watch),
        Err(e) => {
            warn!(path = %reloader.path().display(), error = %e, "Settings watcher not started");
            None
        }
    };

    let app = build_router(Arc::new(AppState::new(engine).with_reloader(reloader)));
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, shutting down scheduler");
    scheduler.shutdown().await;
    info!("almanac-server exited cleanly");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl_c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
