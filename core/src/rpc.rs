use std::future::Future;

use alloy::{
    primitives::{Address, Bytes, TxHash, U256},
    providers::Provider,
};

use crate::{
    chain::{Chain, EvmChain},
    error::{AlloyRpcErrorToEngineError, EngineError},
    gas::GasFees,
};

/// The JSON-RPC calls the sponsored flow depends on. Everything else is computed locally.
pub trait ChainRpc: Send + Sync {
    /// `eth_getTransactionCount` at the latest block
    fn get_transaction_count(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<u64, EngineError>> + Send;

    /// `eth_chainId`, as reported by the node
    fn get_chain_id(&self) -> impl Future<Output = Result<u64, EngineError>> + Send;

    fn get_balance(&self, address: Address)
    -> impl Future<Output = Result<U256, EngineError>> + Send;

    /// EIP-1559 fee estimate derived from the node's fee history
    fn get_fee_data(&self) -> impl Future<Output = Result<GasFees, EngineError>> + Send;

    fn get_code(&self, address: Address)
    -> impl Future<Output = Result<Bytes, EngineError>> + Send;

    /// `eth_sendRawTransaction`. Never retried.
    fn send_raw_transaction(
        &self,
        raw: &[u8],
    ) -> impl Future<Output = Result<TxHash, EngineError>> + Send;
}

impl ChainRpc for EvmChain {
    async fn get_transaction_count(&self, address: Address) -> Result<u64, EngineError> {
        self.provider()
            .get_transaction_count(address)
            .await
            .map_err(|e| e.to_engine_error(self))
    }

    async fn get_chain_id(&self) -> Result<u64, EngineError> {
        self.provider()
            .get_chain_id()
            .await
            .map_err(|e| e.to_engine_error(self))
    }

    async fn get_balance(&self, address: Address) -> Result<U256, EngineError> {
        self.provider()
            .get_balance(address)
            .await
            .map_err(|e| e.to_engine_error(self))
    }

    async fn get_fee_data(&self) -> Result<GasFees, EngineError> {
        let estimate = self
            .provider()
            .estimate_eip1559_fees()
            .await
            .map_err(|e| e.to_engine_error(self))?;

        Ok(GasFees {
            max_fee_per_gas: estimate.max_fee_per_gas,
            max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
        })
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, EngineError> {
        self.provider()
            .get_code_at(address)
            .await
            .map_err(|e| e.to_engine_error(self))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, EngineError> {
        let pending = self
            .provider()
            .send_raw_transaction(raw)
            .await
            .map_err(|e| {
                tracing::error!(
                    chain_id = self.chain_id(),
                    error = %e,
                    "eth_sendRawTransaction failed"
                );
                e.to_engine_error(self)
            })?;

        Ok(*pending.tx_hash())
    }
}

impl<T: ChainRpc> ChainRpc for std::sync::Arc<T> {
    fn get_transaction_count(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<u64, EngineError>> + Send {
        (**self).get_transaction_count(address)
    }

    fn get_chain_id(&self) -> impl Future<Output = Result<u64, EngineError>> + Send {
        (**self).get_chain_id()
    }

    fn get_balance(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<U256, EngineError>> + Send {
        (**self).get_balance(address)
    }

    fn get_fee_data(&self) -> impl Future<Output = Result<GasFees, EngineError>> + Send {
        (**self).get_fee_data()
    }

    fn get_code(&self, address: Address) -> impl Future<Output = Result<Bytes, EngineError>> + Send {
        (**self).get_code(address)
    }

    fn send_raw_transaction(
        &self,
        raw: &[u8],
    ) -> impl Future<Output = Result<TxHash, EngineError>> + Send {
        (**self).send_raw_transaction(raw)
    }
}
