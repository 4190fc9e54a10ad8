use std::{collections::HashMap, future::Future, time::Duration};

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::{error::EngineError, rpc::ChainRpc};

pub const GWEI: u128 = 1_000_000_000;

/// Default scaling applied to dynamic fee estimates, in percent.
pub const DEFAULT_SAFETY_MULTIPLIER_PERCENT: u128 = 120;

/// EIP-1559 fee caps, in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasFees {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl GasFees {
    pub const fn new(max_fee_per_gas: u128, max_priority_fee_per_gas: u128) -> Self {
        Self {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        }
    }

    /// Builds caps from milli-gwei amounts, for sub-gwei L2 prices.
    pub const fn from_milli_gwei(max_fee_milli: u128, priority_milli: u128) -> Self {
        Self::new(
            max_fee_milli * GWEI / 1000,
            priority_milli * GWEI / 1000,
        )
    }

    /// Scales both caps by `percent / 100`.
    pub fn scaled(self, percent: u128) -> Self {
        Self::new(
            self.max_fee_per_gas.saturating_mul(percent) / 100,
            self.max_priority_fee_per_gas.saturating_mul(percent) / 100,
        )
    }

    /// Caps the priority fee at the max fee.
    pub fn clamped(self) -> Self {
        Self::new(
            self.max_fee_per_gas,
            self.max_priority_fee_per_gas.min(self.max_fee_per_gas),
        )
    }

    fn is_usable(&self) -> bool {
        self.max_fee_per_gas > 0
    }
}

/// Where a resolved fee pair came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GasSource {
    Provider,
    GasApi,
    Static,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedGas {
    #[serde(flatten)]
    pub fees: GasFees,
    pub source: GasSource,
}

/// Per-chain static table used when no dynamic source answers.
pub fn static_gas_defaults(chain_id: u64) -> Option<GasFees> {
    let fees = match chain_id {
        1 => GasFees::new(30 * GWEI, 2 * GWEI),
        10 | 8453 | 42161 => GasFees::from_milli_gwei(100, 10),
        56 => GasFees::new(5 * GWEI, GWEI),
        137 => GasFees::new(50 * GWEI, 30 * GWEI),
        11155111 => GasFees::new(20 * GWEI, 2 * GWEI),
        _ => return None,
    };
    Some(fees)
}

pub const FALLBACK_GAS_FEES: GasFees = GasFees::new(20 * GWEI, 2 * GWEI);

/// External gas price API, consulted after the chain's own fee data.
pub trait GasOracle: Send + Sync {
    fn fetch_fees(&self, chain_id: u64)
    -> impl Future<Output = Result<GasFees, EngineError>> + Send;
}

impl<T: GasOracle> GasOracle for std::sync::Arc<T> {
    fn fetch_fees(&self, chain_id: u64)
    -> impl Future<Output = Result<GasFees, EngineError>> + Send {
        (**self).fetch_fees(chain_id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GasStationTier {
    max_priority_fee: f64,
    max_fee: f64,
}

#[derive(Debug, Deserialize)]
struct GasStationResponse {
    standard: GasStationTier,
}

fn gwei_to_wei(gwei: f64) -> Option<u128> {
    if !gwei.is_finite() || gwei < 0.0 {
        return None;
    }
    Some((gwei * GWEI as f64).round() as u128)
}

/// Polls gas-station style endpoints returning `{"standard":{"maxPriorityFee","maxFee"}}` in gwei.
#[derive(Clone, Debug)]
pub struct GasStationOracle {
    http_client: reqwest::Client,
    urls: HashMap<u64, Url>,
}

impl GasStationOracle {
    pub fn new(urls: HashMap<u64, Url>, timeout: Duration) -> Result<Self, EngineError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::RpcConfigError {
                message: format!("Failed to build gas station HTTP client: {e}"),
            })?;

        Ok(Self { http_client, urls })
    }

    pub fn disabled() -> Self {
        Self {
            http_client: reqwest::Client::new(),
            urls: HashMap::new(),
        }
    }
}

impl GasOracle for GasStationOracle {
    async fn fetch_fees(&self, chain_id: u64) -> Result<GasFees, EngineError> {
        let unavailable = |message: String| EngineError::GasOracleUnavailable { chain_id, message };

        let url = self
            .urls
            .get(&chain_id)
            .ok_or_else(|| unavailable("no gas station configured".to_string()))?;

        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| unavailable(e.to_string()))?;

        let body: GasStationResponse = response
            .json()
            .await
            .map_err(|e| unavailable(format!("unexpected response body: {e}")))?;

        let max_fee = gwei_to_wei(body.standard.max_fee)
            .ok_or_else(|| unavailable("maxFee is not a valid gwei amount".to_string()))?;
        let priority = gwei_to_wei(body.standard.max_priority_fee)
            .ok_or_else(|| unavailable("maxPriorityFee is not a valid gwei amount".to_string()))?;

        Ok(GasFees::new(max_fee, priority))
    }
}

/// Resolves fee caps for a chain. Never fails: dynamic sources are tried in order and
/// the static table backs them up.
#[derive(Clone, Debug)]
pub struct GasPriceResolver<O> {
    oracle: O,
    safety_multiplier_percent: u128,
    overrides: HashMap<u64, GasFees>,
}

impl<O: GasOracle> GasPriceResolver<O> {
    pub fn new(oracle: O) -> Self {
        Self {
            oracle,
            safety_multiplier_percent: DEFAULT_SAFETY_MULTIPLIER_PERCENT,
            overrides: HashMap::new(),
        }
    }

    pub fn with_safety_multiplier_percent(mut self, percent: u128) -> Self {
        self.safety_multiplier_percent = percent;
        self
    }

    /// Replaces the built-in static entry for one chain.
    pub fn with_static_override(mut self, chain_id: u64, fees: GasFees) -> Self {
        self.overrides.insert(chain_id, fees);
        self
    }

    pub fn static_fees(&self, chain_id: u64) -> ResolvedGas {
        match self
            .overrides
            .get(&chain_id)
            .copied()
            .or_else(|| static_gas_defaults(chain_id))
        {
            Some(fees) => ResolvedGas {
                fees: fees.clamped(),
                source: GasSource::Static,
            },
            None => ResolvedGas {
                fees: FALLBACK_GAS_FEES,
                source: GasSource::Fallback,
            },
        }
    }

    pub async fn resolve<R: ChainRpc>(&self, chain_id: u64, rpc: &R) -> ResolvedGas {
        match rpc.get_fee_data().await {
            Ok(fees) if fees.is_usable() => {
                return ResolvedGas {
                    fees: fees.scaled(self.safety_multiplier_percent).clamped(),
                    source: GasSource::Provider,
                };
            }
            Ok(_) => tracing::debug!(chain_id, "Provider returned empty fee data"),
            Err(e) => tracing::debug!(chain_id, error = %e, "Provider fee data unavailable"),
        }

        match self.oracle.fetch_fees(chain_id).await {
            Ok(fees) if fees.is_usable() => {
                return ResolvedGas {
                    fees: fees.scaled(self.safety_multiplier_percent).clamped(),
                    source: GasSource::GasApi,
                };
            }
            Ok(_) => tracing::debug!(chain_id, "Gas API returned empty fee data"),
            Err(e) => tracing::debug!(chain_id, error = %e, "Gas API unavailable"),
        }

        let resolved = self.static_fees(chain_id);
        tracing::warn!(
            chain_id,
            source = ?resolved.source,
            max_fee_per_gas = resolved.fees.max_fee_per_gas,
            "Falling back to static gas prices"
        );
        resolved
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use alloy::primitives::{Address, Bytes, TxHash, U256};

    use super::*;

    struct FeeOnlyRpc {
        fees: Option<GasFees>,
    }

    impl ChainRpc for FeeOnlyRpc {
        async fn get_transaction_count(&self, _: Address) -> Result<u64, EngineError> {
            unreachable!()
        }
        async fn get_chain_id(&self) -> Result<u64, EngineError> {
            unreachable!()
        }
        async fn get_balance(&self, _: Address) -> Result<U256, EngineError> {
            unreachable!()
        }
        async fn get_fee_data(&self) -> Result<GasFees, EngineError> {
            self.fees.ok_or(EngineError::InternalError {
                message: "connection refused".to_string(),
            })
        }
        async fn get_code(&self, _: Address) -> Result<Bytes, EngineError> {
            unreachable!()
        }
        async fn send_raw_transaction(&self, _: &[u8]) -> Result<TxHash, EngineError> {
            unreachable!()
        }
    }

    #[derive(Default)]
    struct CountingOracle {
        fees: Option<GasFees>,
        calls: AtomicUsize,
    }

    impl GasOracle for CountingOracle {
        async fn fetch_fees(&self, chain_id: u64) -> Result<GasFees, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.fees.ok_or(EngineError::GasOracleUnavailable {
                chain_id,
                message: "unreachable".to_string(),
            })
        }
    }

    #[test]
    fn l2_defaults_are_sub_gwei() {
        let fees = static_gas_defaults(8453).unwrap();
        assert_eq!(fees, GasFees::from_milli_gwei(100, 10));
        assert_eq!(fees.max_fee_per_gas, 100_000_000);
        assert_eq!(fees.max_priority_fee_per_gas, 10_000_000);
    }

    #[tokio::test]
    async fn polygon_falls_back_to_static_values_unscaled() {
        let resolver = GasPriceResolver::new(CountingOracle::default());
        let resolved = resolver.resolve(137, &FeeOnlyRpc { fees: None }).await;

        assert_eq!(resolved.source, GasSource::Static);
        assert_eq!(resolved.fees.max_fee_per_gas, 50_000_000_000);
        assert_eq!(resolved.fees.max_priority_fee_per_gas, 30_000_000_000);
    }

    #[tokio::test]
    async fn provider_fees_are_scaled_and_skip_the_oracle() {
        let oracle = CountingOracle::default();
        let resolver = GasPriceResolver::new(oracle);
        let rpc = FeeOnlyRpc {
            fees: Some(GasFees::new(10 * GWEI, GWEI)),
        };

        let resolved = resolver.resolve(1, &rpc).await;
        assert_eq!(resolved.source, GasSource::Provider);
        assert_eq!(resolved.fees, GasFees::new(12 * GWEI, 1_200_000_000));
        assert_eq!(resolver.oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oracle_is_used_when_provider_is_down() {
        let resolver = GasPriceResolver::new(CountingOracle {
            fees: Some(GasFees::new(100 * GWEI, 40 * GWEI)),
            ..Default::default()
        })
        .with_safety_multiplier_percent(150);

        let resolved = resolver.resolve(137, &FeeOnlyRpc { fees: None }).await;
        assert_eq!(resolved.source, GasSource::GasApi);
        assert_eq!(resolved.fees, GasFees::new(150 * GWEI, 60 * GWEI));
    }

    #[tokio::test]
    async fn unknown_chain_uses_global_fallback() {
        let resolver = GasPriceResolver::new(CountingOracle::default());
        let resolved = resolver.resolve(999_999, &FeeOnlyRpc { fees: None }).await;
        assert_eq!(resolved.source, GasSource::Fallback);
        assert_eq!(resolved.fees, FALLBACK_GAS_FEES);
    }

    #[test]
    fn priority_never_exceeds_max_fee() {
        let resolver = GasPriceResolver::new(CountingOracle::default())
            .with_static_override(5, GasFees::new(GWEI, 3 * GWEI));
        let fees = resolver.static_fees(5).fees;
        assert_eq!(fees.max_priority_fee_per_gas, fees.max_fee_per_gas);

        for chain_id in [1, 10, 56, 137, 8453, 42161, 11155111] {
            let fees = static_gas_defaults(chain_id).unwrap();
            assert!(fees.max_priority_fee_per_gas <= fees.max_fee_per_gas);
        }
    }

    #[test]
    fn l2_table_entries_are_sub_gwei() {
        assert_eq!(
            static_gas_defaults(8453).unwrap(),
            GasFees::new(100_000_000, 10_000_000)
        );
    }
}
