use alloy::primitives::{Address, U256};
use serde::Serialize;
use sponsor_core::{error::EngineError, rpc::ChainRpc};

use crate::constants::delegation_target;

/// Represents an EOA address that can have EIP-7702 delegation, associated with a specific chain
pub struct DelegatedAccount<'a, R: ChainRpc> {
    /// The EOA address that may have delegation
    pub eoa_address: Address,
    rpc: &'a R,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationStatus {
    pub account: Address,
    /// Current delegate, if the account's code is a delegation designator
    pub delegate: Option<Address>,
    /// Whether `delegate` equals the expected contract, when one was given
    pub matches_expected: Option<bool>,
    pub nonce: u64,
    /// Native balance at the latest block, what a sweep would move
    pub balance: U256,
}

impl<'a, R: ChainRpc> DelegatedAccount<'a, R> {
    pub fn new(eoa_address: Address, rpc: &'a R) -> Self {
        Self { eoa_address, rpc }
    }

    /// Delegate the account's code currently points at
    pub async fn delegation_target(&self) -> Result<Option<Address>, EngineError> {
        let code = self.rpc.get_code(self.eoa_address).await?;
        let target = delegation_target(&code);

        tracing::debug!(
            eoa_address = ?self.eoa_address,
            code_length = code.len(),
            target = ?target,
            "Checked EIP-7702 delegation"
        );

        Ok(target)
    }

    /// Check if the EOA delegates to `delegation_contract`, or to anything when `None`
    pub async fn is_delegated_to(
        &self,
        delegation_contract: Option<Address>,
    ) -> Result<bool, EngineError> {
        Ok(match (self.delegation_target().await?, delegation_contract) {
            (Some(target), Some(expected)) => target == expected,
            (Some(_), None) => true,
            (None, _) => false,
        })
    }

    pub async fn get_nonce(&self) -> Result<u64, EngineError> {
        self.rpc.get_transaction_count(self.eoa_address).await
    }

    pub async fn get_balance(&self) -> Result<U256, EngineError> {
        self.rpc.get_balance(self.eoa_address).await
    }

    pub async fn status(&self, expected: Option<Address>) -> Result<DelegationStatus, EngineError> {
        let delegate = self.delegation_target().await?;
        let nonce = self.get_nonce().await?;
        let balance = self.get_balance().await?;
        Ok(DelegationStatus {
            account: self.eoa_address,
            delegate,
            matches_expected: expected.map(|expected| delegate == Some(expected)),
            nonce,
            balance,
        })
    }
}
