use std::time::Duration;

use alloy::{
    primitives::Address,
    providers::RootProvider,
    rpc::client::RpcClient,
    transports::http::{
        Http,
        reqwest::{ClientBuilder as HttpClientBuilder, Url},
    },
};

use crate::{error::EngineError, gas::GasFees};

pub trait Chain: Send + Sync {
    fn chain_id(&self) -> u64;
    fn rpc_url(&self) -> Url;
    fn provider(&self) -> &RootProvider;
}

/// Static per-chain settings, loaded once at startup.
#[derive(Clone, Debug)]
pub struct ChainSettings {
    pub chain_id: u64,
    pub rpc_url: Url,
    /// Default contract EOAs delegate to on this chain
    pub delegate_address: Address,
    /// Overrides the built-in static gas fallback for this chain
    pub gas_defaults: Option<GasFees>,
}

#[derive(Clone, Debug)]
pub struct EvmChain {
    settings: ChainSettings,
    provider: RootProvider,
}

impl Chain for EvmChain {
    fn chain_id(&self) -> u64 {
        self.settings.chain_id
    }

    fn rpc_url(&self) -> Url {
        self.settings.rpc_url.clone()
    }

    fn provider(&self) -> &RootProvider {
        &self.provider
    }
}

impl EvmChain {
    /// Connects to the chain's RPC endpoint. Every request is bounded by `request_timeout`.
    pub fn connect(settings: ChainSettings, request_timeout: Duration) -> Result<Self, EngineError> {
        let reqwest_client = HttpClientBuilder::new()
            .timeout(request_timeout)
            .build()
            .map_err(|e| EngineError::RpcConfigError {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        let transport = Http::with_client(reqwest_client, settings.rpc_url.clone());
        let provider = RootProvider::new(RpcClient::new(transport, false));

        tracing::debug!(
            chain_id = settings.chain_id,
            rpc_url = %settings.rpc_url,
            timeout_secs = request_timeout.as_secs(),
            "Connected chain provider"
        );

        Ok(Self { settings, provider })
    }

    pub fn settings(&self) -> &ChainSettings {
        &self.settings
    }

    pub fn delegate_address(&self) -> Address {
        self.settings.delegate_address
    }
}

pub trait ChainService {
    fn get_chain(&self, chain_id: u64) -> Result<impl Chain, EngineError>;
}
