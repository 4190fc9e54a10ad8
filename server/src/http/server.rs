use std::{collections::HashMap, sync::Arc};

use alloy::transports::http::reqwest::Url;
use axum::{
    Router,
    routing::{get, post},
};
use sponsor_core::{
    error::EngineError,
    gas::{GasPriceResolver, GasStationOracle},
    simulation::MaybeSimulator,
};
use sponsor_eip7702_core::draft::SimulationPolicy;
use tenderly_core::{TenderlyClient, TenderlyClientBuilder, auth::TenderlyAuth};
use tokio::{sync::watch, task::JoinHandle};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    chains::ChainRegistry,
    config::{SimulationConfig, SponsorConfig},
};

use super::routes::{
    authorization::{authorization_digest, sign_authorization},
    calldata::{encode_call_shape, encode_operation_sequence},
    delegation::delegation_status,
    gas::gas_price,
    sponsor::{sponsor_execute, sponsor_simulate},
    transaction::{decode_transaction, submit_transaction},
    validate::validate,
};

/// Read-only state shared by every request. Each request runs its own flow;
/// nothing is stashed between requests.
#[derive(Clone)]
pub struct EngineServerState {
    pub chains: Arc<ChainRegistry>,
    pub gas: Arc<GasPriceResolver<GasStationOracle>>,
    pub simulator: Arc<MaybeSimulator<TenderlyClient>>,
    pub simulation_policy: SimulationPolicy,
}

impl EngineServerState {
    /// Resolves every secret and builds every client once, at startup.
    pub fn from_config(config: &SponsorConfig) -> Result<Self, EngineError> {
        Self::from_config_with(config, |name| std::env::var(name).ok())
    }

    pub fn from_config_with(
        config: &SponsorConfig,
        lookup_secret: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, EngineError> {
        let timeout = config.execution.request_timeout();
        let chains = ChainRegistry::from_config_with(&config.chains, timeout, &lookup_secret)?;

        let mut gas_station_urls = HashMap::new();
        for (key, url) in &config.gas.gas_station_urls {
            let chain_id = key.trim().parse::<u64>().map_err(|_| EngineError::RpcConfigError {
                message: format!("gas station key {key:?} is not a decimal chain id"),
            })?;
            let url = Url::parse(url).map_err(|e| EngineError::RpcConfigError {
                message: format!("gas station url for chain {chain_id}: {e}"),
            })?;
            gas_station_urls.insert(chain_id, url);
        }

        let mut gas = GasPriceResolver::new(GasStationOracle::new(gas_station_urls, timeout)?)
            .with_safety_multiplier_percent(config.gas.safety_multiplier_percent.into());
        for (chain_id, fees) in chains.gas_overrides() {
            gas = gas.with_static_override(chain_id, fees);
        }

        let simulator = match &config.simulation {
            Some(simulation) => {
                MaybeSimulator::Configured(build_simulator(simulation, timeout, &lookup_secret)?)
            }
            None => {
                tracing::warn!("No simulation service configured, simulations will report unavailable");
                MaybeSimulator::Disabled
            }
        };

        Ok(Self {
            chains: Arc::new(chains),
            gas: Arc::new(gas),
            simulator: Arc::new(simulator),
            simulation_policy: config.execution.simulation_policy,
        })
    }
}

fn build_simulator(
    config: &SimulationConfig,
    timeout: std::time::Duration,
    lookup_secret: impl Fn(&str) -> Option<String>,
) -> Result<TenderlyClient, EngineError> {
    let access_key = lookup_secret(&config.access_key_env).ok_or_else(|| EngineError::RpcConfigError {
        message: format!(
            "simulation: environment variable {} is not set",
            config.access_key_env
        ),
    })?;

    let mut builder = TenderlyClientBuilder::new(&config.account, &config.project, TenderlyAuth::new(access_key))
        .with_timeout(timeout);
    if let Some(base_url) = &config.base_url {
        builder = builder.with_api_base_url(base_url);
    }
    if let Some(dashboard_base_url) = &config.dashboard_base_url {
        builder = builder.with_dashboard_base_url(dashboard_base_url);
    }

    builder.build().map_err(|e| EngineError::RpcConfigError {
        message: format!("simulation: {e}"),
    })
}

pub struct EngineServer {
    handle: Option<JoinHandle<Result<(), std::io::Error>>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    app: Router,
}

impl EngineServer {
    pub async fn new(state: EngineServerState) -> Self {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_credentials(false);

        let router = Router::new()
            .route("/v1/validate", post(validate))
            .route("/v1/authorization/digest", post(authorization_digest))
            .route("/v1/authorization/sign", post(sign_authorization))
            .route("/v1/calldata/encode", post(encode_call_shape))
            .route("/v1/sequence/encode", post(encode_operation_sequence))
            .route("/v1/gas/{chain_id}", get(gas_price))
            .route("/v1/delegation/{chain_id}/{address}", get(delegation_status))
            .route("/v1/transaction/decode", post(decode_transaction))
            .route("/v1/transaction/submit", post(submit_transaction))
            .route("/v1/sponsor/simulate", post(sponsor_simulate))
            .route("/v1/sponsor/execute", post(sponsor_execute))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        Self {
            handle: None,
            shutdown_tx: None,
            app: router,
        }
    }

    pub fn start(&mut self, listener: tokio::net::TcpListener) -> Result<(), std::io::Error> {
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let app = self.app.clone();

        let handle = tokio::spawn(async move {
            tracing::info!("HTTP server starting on {}", local_addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let mut rx = shutdown_rx;
                    while !*rx.borrow() {
                        if rx.changed().await.is_err() {
                            break;
                        }
                    }
                    tracing::info!("HTTP server shutting down");
                })
                .await
        });

        self.handle = Some(handle);
        self.shutdown_tx = Some(shutdown_tx);

        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), std::io::Error> {
        if let Some(tx) = self.shutdown_tx.take() {
            if tx.send(true).is_err() {
                tracing::error!("Failed to send shutdown signal to HTTP server");
            }
        }

        if let Some(handle) = self.handle.take() {
            match handle.await {
                Ok(result) => {
                    if let Err(e) = result {
                        tracing::error!("HTTP server error during shutdown: {}", e);
                        return Err(e);
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to join HTTP server task: {}", e);
                    return Err(std::io::Error::other(format!("Task join error: {e}")));
                }
            }
        }

        Ok(())
    }
}
