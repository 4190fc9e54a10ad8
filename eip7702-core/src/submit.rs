use alloy::primitives::TxHash;
use sponsor_core::{error::EngineError, rpc::ChainRpc};

use crate::transaction::{SignedType4Transaction, decode_signed_hex};

/// Broadcasts signed envelopes. One attempt per call; a failed broadcast is
/// never retried because the caller must rebuild nonces and signatures.
pub struct TransactionSubmitter<'a, R: ChainRpc> {
    rpc: &'a R,
}

impl<'a, R: ChainRpc> TransactionSubmitter<'a, R> {
    pub fn new(rpc: &'a R) -> Self {
        Self { rpc }
    }

    pub async fn submit(&self, transaction: &SignedType4Transaction) -> Result<TxHash, EngineError> {
        let expected = transaction.hash();
        let returned = self.rpc.send_raw_transaction(transaction.raw()).await?;

        if returned != expected {
            tracing::warn!(
                expected = ?expected,
                returned = ?returned,
                "Node reported a different transaction hash"
            );
        } else {
            tracing::info!(tx_hash = ?returned, "Broadcast set-code transaction");
        }

        Ok(returned)
    }

    /// Decodes `raw` as a signed set-code envelope for `chain_id` and broadcasts it.
    ///
    /// Nothing reaches the node unless the bytes decode and the signer recovers.
    pub async fn submit_hex(&self, raw: &str, chain_id: u64) -> Result<TxHash, EngineError> {
        let transaction = decode_signed_hex(raw)?;
        let envelope_chain_id = transaction.transaction().chain_id;
        if envelope_chain_id != chain_id {
            return Err(EngineError::ValidationError {
                message: format!(
                    "transaction is signed for chain {envelope_chain_id}, not chain {chain_id}"
                ),
            });
        }
        let sender = transaction.recover_sender()?;

        tracing::debug!(chain_id, sender = ?sender, "Submitting externally signed transaction");
        self.submit(&transaction).await
    }
}
