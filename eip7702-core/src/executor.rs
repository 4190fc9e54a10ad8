use std::{collections::BTreeMap, sync::Arc};

use alloy::primitives::{Address, Bytes, TxHash, U256};
use serde::Serialize;
use sponsor_core::{
    error::EngineError,
    gas::{GasOracle, GasPriceResolver},
    rpc::ChainRpc,
    signer::AccountSigner,
    simulation::TransactionSimulator,
};
use tenderly_core::{SimulationCall, SimulationVerdict};

use crate::{
    authorization::Authorization,
    calldata::{EncodedCall, encode_call, encode_sequence},
    constants::delegation_designator,
    draft::{
        ExecutionDraft, NonceSnapshot, PreparedTransaction, SimulationPolicy, SponsorRequest,
        SponsoredCall,
    },
    submit::TransactionSubmitter,
    transaction::Type4Transaction,
};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SimulationOutcome {
    Completed { verdict: SimulationVerdict },
    Unavailable { message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReceipt {
    pub tx_hash: TxHash,
    pub chain_id: u64,
    pub authority: Address,
    pub relayer: Address,
    pub delegate: Address,
}

/// Runs the sponsored flow for one chain: a relayer pays for a set-code
/// transaction carrying an authority's delegation.
pub struct SponsoredExecutor<R, Sim, O, S> {
    rpc: R,
    simulator: Sim,
    gas: Arc<GasPriceResolver<O>>,
    relayer: S,
    policy: SimulationPolicy,
}

impl<R, Sim, O, S> SponsoredExecutor<R, Sim, O, S>
where
    R: ChainRpc,
    Sim: TransactionSimulator,
    O: GasOracle,
    S: AccountSigner,
{
    pub fn new(rpc: R, simulator: Sim, gas: Arc<GasPriceResolver<O>>, relayer: S) -> Self {
        Self {
            rpc,
            simulator,
            gas,
            relayer,
            policy: SimulationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SimulationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn relayer_address(&self) -> Address {
        self.relayer.address()
    }

    /// Creates a draft for `request` and signs it.
    pub async fn draft<A: AccountSigner>(
        &self,
        request: SponsorRequest,
        authority: &A,
    ) -> Result<ExecutionDraft, EngineError> {
        let mut draft = ExecutionDraft::new(request);
        self.prepare(&mut draft, authority).await?;
        Ok(draft)
    }

    fn encode(&self, call: &SponsoredCall, account: Address) -> Result<EncodedCall, EngineError> {
        match call {
            SponsoredCall::DelegateOnly => Ok(EncodedCall {
                to: account,
                data: Bytes::new(),
                value: U256::ZERO,
            }),
            SponsoredCall::Single { shape } => encode_call(shape, account),
            SponsoredCall::Sequence { operations } => {
                encode_sequence(account, operations).map(|sequence| sequence.call)
            }
        }
    }

    async fn fetch_nonces(&self, authority: Address) -> Result<NonceSnapshot, EngineError> {
        let relayer = self.relayer.address();
        let authority_nonce = self.rpc.get_transaction_count(authority).await?;
        let relayer_nonce = if relayer == authority {
            authority_nonce
        } else {
            self.rpc.get_transaction_count(relayer).await?
        };

        Ok(NonceSnapshot {
            authority,
            authority_nonce,
            relayer,
            relayer_nonce,
        })
    }

    /// Signs the authorization and the envelope for the draft's current parameters.
    ///
    /// Nonces are read immediately before signing. When the authority is also the
    /// relayer its authorization nonce is one past the transaction nonce, since the
    /// sender's nonce is consumed before the authorization list is processed.
    #[tracing::instrument(skip_all, fields(chain_id = draft.request().chain_id, authority = ?authority.address()))]
    pub async fn prepare<A: AccountSigner>(
        &self,
        draft: &mut ExecutionDraft,
        authority: &A,
    ) -> Result<(), EngineError> {
        let request = draft.request().clone();
        let authority_address = authority.address();

        // local validation first so bad input never reaches the node
        let call = self.encode(&request.call, authority_address)?;

        let node_chain_id = self.rpc.get_chain_id().await?;
        if node_chain_id != request.chain_id {
            return Err(EngineError::ValidationError {
                message: format!(
                    "RPC endpoint serves chain {node_chain_id}, request is for chain {}",
                    request.chain_id
                ),
            });
        }

        let nonces = self.fetch_nonces(authority_address).await?;
        let authorization_nonce = if nonces.authority == nonces.relayer {
            nonces
                .authority_nonce
                .checked_add(1)
                .ok_or_else(|| EngineError::InternalError {
                    message: "authority nonce overflow".to_string(),
                })?
        } else {
            nonces.authority_nonce
        };

        let authorization = Authorization::new(
            request.chain_id,
            request.delegate_address,
            authorization_nonce,
        )
        .sign(authority)
        .await?;

        let recovered = authorization.recover_authority()?;
        if recovered != authority_address {
            return Err(EngineError::InternalError {
                message: format!(
                    "authorization recovers to {recovered}, expected {authority_address}"
                ),
            });
        }

        let gas = self.gas.resolve(request.chain_id, &self.rpc).await;

        let transaction = Type4Transaction {
            chain_id: request.chain_id,
            nonce: nonces.relayer_nonce,
            max_priority_fee_per_gas: gas.fees.max_priority_fee_per_gas,
            max_fee_per_gas: gas.fees.max_fee_per_gas,
            gas_limit: request.gas_limit(),
            to: call.to,
            value: call.value,
            input: call.data.clone(),
            access_list: request.access_list.clone(),
            authorization_list: vec![authorization],
        }
        .build_unsigned_payload()?
        .sign(&self.relayer)
        .await?;

        let simulation_call = SimulationCall {
            chain_id: request.chain_id,
            from: nonces.relayer,
            to: call.to,
            data: call.data.clone(),
            value: call.value,
            gas_limit: request.gas_limit(),
            code_overrides: BTreeMap::from([(
                authority_address,
                delegation_designator(request.delegate_address),
            )]),
        };

        tracing::info!(
            relayer = ?nonces.relayer,
            relayer_nonce = nonces.relayer_nonce,
            authorization_nonce,
            gas_source = ?gas.source,
            tx_hash = ?transaction.hash(),
            "Prepared sponsored transaction"
        );

        draft.attach(PreparedTransaction {
            authorization,
            call,
            transaction,
            nonces,
            gas,
            simulation_call,
        });

        Ok(())
    }

    /// Dry-runs the draft's current transaction and records the result on it.
    #[tracing::instrument(skip_all, fields(chain_id = draft.request().chain_id, generation = draft.generation()))]
    pub async fn simulate(
        &self,
        draft: &mut ExecutionDraft,
    ) -> Result<SimulationOutcome, EngineError> {
        let ticket = draft.begin_simulation()?;

        match self.simulator.simulate(ticket.call()).await {
            Ok(verdict) => {
                if !verdict.success {
                    tracing::warn!(error = ?verdict.error, "Simulation reverted");
                }
                draft.record_verdict(ticket, verdict.clone());
                Ok(SimulationOutcome::Completed { verdict })
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(error = %message, "Simulation unavailable");
                draft.record_unavailable(ticket, message.clone());
                Ok(SimulationOutcome::Unavailable { message })
            }
        }
    }

    /// Broadcasts the draft once, if the simulation policy allows it and no nonce moved.
    ///
    /// The draft is spent by the broadcast attempt whatever its result; a retry
    /// has to go through `prepare` and `simulate` again.
    #[tracing::instrument(skip_all, fields(chain_id = draft.request().chain_id, generation = draft.generation()))]
    pub async fn execute(
        &self,
        draft: &mut ExecutionDraft,
    ) -> Result<ExecutionReceipt, EngineError> {
        let prepared = draft.ensure_executable(self.policy)?;
        let signed = prepared.nonces;
        let transaction = prepared.transaction.clone();

        let current = self.fetch_nonces(signed.authority).await?;
        if current.authority_nonce != signed.authority_nonce {
            return Err(EngineError::StaleNonceRisk {
                address: signed.authority,
                expected: signed.authority_nonce,
                actual: current.authority_nonce,
            });
        }
        if current.relayer_nonce != signed.relayer_nonce {
            return Err(EngineError::StaleNonceRisk {
                address: signed.relayer,
                expected: signed.relayer_nonce,
                actual: current.relayer_nonce,
            });
        }

        draft.mark_submitted();
        let tx_hash = TransactionSubmitter::new(&self.rpc)
            .submit(&transaction)
            .await?;

        Ok(ExecutionReceipt {
            tx_hash,
            chain_id: draft.request().chain_id,
            authority: signed.authority,
            relayer: signed.relayer,
            delegate: draft.request().delegate_address,
        })
    }
}
