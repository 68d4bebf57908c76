mod api_rest;
mod cli;
mod host;
mod logging;
mod settings;
mod views;

use anyhow::{Context, Result};
use api_rest::{AppState, create_router};
use clap::Parser;
use cli::{Cli, Command};
use host::ContentDirectoryState;
use moeconfig::{Config, get_config};
use moefm::{Catalog, MoeFmApi};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config_dir {
        Some(dir) => Arc::new(Config::load_config(&dir.to_string_lossy())?),
        None => get_config(),
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            logging::init_logging(&config);
            serve(config).await
        }
        Command::Settings { action } => {
            if let Some(output) = settings::run(&config, action)? {
                println!("{}", output);
            }
            Ok(())
        }
    }
}

async fn serve(config: Arc<Config>) -> Result<()> {
    let api = MoeFmApi::from_config_obj(&config).context("Cannot create the Moe FM client")?;
    if !api.is_authenticated() {
        warn!("⚠️ No OAuth tokens configured (moefm.oauth_tokens), playlists will fail to load");
    }

    let catalog = Catalog::from_config_obj(Arc::new(api), &config)?;
    let host = Arc::new(ContentDirectoryState::new());
    catalog.initialize(host.clone());
    info!(
        "🎵 Catalog '{}' ready with {} playlist(s)",
        catalog.name(),
        catalog.containers().len()
    );

    let port = config.get_http_port();
    let state = AppState::new(catalog, host, config.get_base_url());
    info!("🌐 Serving on {}", state.base_url);
    let router = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Cannot bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    let shutdown = Arc::new(Notify::new());
    let shutdown_signal = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown_signal.notified().await })
            .await
    });

    tokio::select! {
        res = &mut server => return Ok(res??),
        res = signal::ctrl_c() => match res {
            Ok(()) => info!("Ctrl+C reçu, arrêt gracieux"),
            Err(e) => warn!("Cannot listen for Ctrl+C ({}), shutting down", e),
        },
    }
    shutdown.notify_one();

    // Les flux audio ouverts retarderaient l'arrêt indéfiniment
    let grace = Duration::from_secs(config.get_shutdown_grace_secs()? as u64);
    match tokio::time::timeout(grace, server).await {
        Ok(res) => res??,
        Err(_) => warn!("Open streams still running after {:?}, exiting", grace),
    }

    Ok(())
}
