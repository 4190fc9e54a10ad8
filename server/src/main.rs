use sponsor_server::{
    config,
    http::server::{EngineServer, EngineServerState},
};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::get_config()?;

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Default to debug for our crates if RUST_LOG is not set
            "sponsor_server=debug,sponsor_core=debug,sponsor_eip7702_core=debug,tenderly_core=debug,tower_http=debug"
                .into()
        }));

    match config.server.log_format {
        config::LogFormat::Json => subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        config::LogFormat::Pretty => subscriber.with(tracing_subscriber::fmt::layer()).init(),
    }

    let state = EngineServerState::from_config(&config)?;
    tracing::info!(
        chains = ?state.chains.chain_ids(),
        simulation_policy = ?state.simulation_policy,
        "Chain registry initialized"
    );

    let mut server = EngineServer::new(state).await;

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    server.start(listener)?;

    tracing::info!("Server started, waiting for shutdown signal");
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
    }
    tracing::info!("Shutdown signal received");

    if let Err(e) = server.shutdown().await {
        tracing::error!("Error during shutdown: {}", e);
    } else {
        tracing::info!("Server shut down successfully");
    }

    Ok(())
}
