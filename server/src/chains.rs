use std::{collections::HashMap, time::Duration};

use alloy::{primitives::Address, transports::http::reqwest::Url};
use sponsor_core::{
    chain::{ChainService, ChainSettings, EvmChain},
    error::EngineError,
    gas::GasFees,
    signer::{AccountSigner, LocalAccountSigner},
    validation::parse_address,
};

use crate::config::ChainConfig;

/// A configured chain together with the account paying for its transactions.
#[derive(Clone, Debug)]
pub struct RegisteredChain {
    pub chain: EvmChain,
    pub relayer: LocalAccountSigner,
}

/// Chains loaded from configuration at startup, keyed by chain id.
#[derive(Clone, Debug, Default)]
pub struct ChainRegistry {
    chains: HashMap<u64, RegisteredChain>,
}

impl ChainRegistry {
    /// Builds the registry, reading relayer keys from the process environment.
    pub fn from_config(
        chains: &HashMap<String, ChainConfig>,
        request_timeout: Duration,
    ) -> Result<Self, EngineError> {
        Self::from_config_with(chains, request_timeout, |name| std::env::var(name).ok())
    }

    /// Same as [`ChainRegistry::from_config`] with an explicit secret lookup.
    pub fn from_config_with(
        chains: &HashMap<String, ChainConfig>,
        request_timeout: Duration,
        lookup_secret: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, EngineError> {
        let mut registry = HashMap::with_capacity(chains.len());

        for (key, chain_config) in chains {
            let chain_id = key.trim().parse::<u64>().map_err(|_| EngineError::RpcConfigError {
                message: format!("chain key {key:?} is not a decimal chain id"),
            })?;

            let rpc_url = Url::parse(&chain_config.rpc_url).map_err(|e| EngineError::RpcConfigError {
                message: format!("chain {chain_id}: invalid rpc_url: {e}"),
            })?;

            let delegate_address =
                parse_address(&chain_config.delegate_address).map_err(|e| EngineError::RpcConfigError {
                    message: format!("chain {chain_id}: invalid delegate_address: {e}"),
                })?;

            let relayer_key = lookup_secret(&chain_config.relayer_key_env).ok_or_else(|| {
                EngineError::RpcConfigError {
                    message: format!(
                        "chain {chain_id}: environment variable {} is not set",
                        chain_config.relayer_key_env
                    ),
                }
            })?;
            let relayer = LocalAccountSigner::from_private_key(&relayer_key).map_err(|e| {
                EngineError::RpcConfigError {
                    message: format!(
                        "chain {chain_id}: {} does not hold a usable key: {e}",
                        chain_config.relayer_key_env
                    ),
                }
            })?;

            let settings = ChainSettings {
                chain_id,
                rpc_url,
                delegate_address,
                gas_defaults: chain_config.gas_defaults.map(GasFees::from),
            };
            let chain = EvmChain::connect(settings, request_timeout)?;

            tracing::info!(
                chain_id,
                relayer = ?relayer.address(),
                delegate = ?delegate_address,
                "Registered chain"
            );

            registry.insert(chain_id, RegisteredChain { chain, relayer });
        }

        Ok(Self { chains: registry })
    }

    pub fn get(&self, chain_id: u64) -> Result<&RegisteredChain, EngineError> {
        self.chains
            .get(&chain_id)
            .ok_or_else(|| EngineError::ValidationError {
                message: format!("chain {chain_id} is not configured"),
            })
    }

    pub fn delegate_address(&self, chain_id: u64) -> Result<Address, EngineError> {
        self.get(chain_id).map(|entry| entry.chain.delegate_address())
    }

    pub fn chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.chains.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Per-chain static gas overrides from configuration
    pub fn gas_overrides(&self) -> impl Iterator<Item = (u64, GasFees)> + '_ {
        self.chains.iter().filter_map(|(chain_id, entry)| {
            entry
                .chain
                .settings()
                .gas_defaults
                .map(|fees| (*chain_id, fees))
        })
    }
}

#[allow(refining_impl_trait)]
impl ChainService for ChainRegistry {
    fn get_chain(&self, chain_id: u64) -> Result<EvmChain, EngineError> {
        self.get(chain_id).map(|entry| entry.chain.clone())
    }
}
