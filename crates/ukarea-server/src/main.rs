mod api;
mod directory;
mod middleware;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use ukarea_lookup::{PostcodesClient, SearchOptions};

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    directory::{spawn_resolution, CityDirectory},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = ukarea_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cities = ukarea_core::load_cities(&config.cities_path).with_context(|| {
        format!(
            "failed to load city list from {}",
            config.cities_path.display()
        )
    })?;
    let lookup = Arc::new(PostcodesClient::from_config(&config)?);
    let directory = Arc::new(CityDirectory::new(cities.into_records()));
    spawn_resolution(
        Arc::clone(&lookup),
        Arc::clone(&directory),
        config.max_concurrent_lookups,
    );

    let state = AppState::new(lookup, SearchOptions::from_config(&config), directory);
    let app = build_app(state, default_rate_limit_state());

    tracing::info!(
        env = %config.env,
        bind_addr = %config.bind_addr,
        api = %config.postcodes_api_url,
        "ukarea-server listening"
    );
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
