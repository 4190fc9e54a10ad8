use std::sync::Arc;

use alloy::{
    eips::eip2930::AccessList,
    primitives::Address,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sponsor_core::{
    chain::EvmChain,
    error::EngineError,
    gas::{GasStationOracle, ResolvedGas},
    signer::{AccountSigner, LocalAccountSigner},
    simulation::MaybeSimulator,
    validation::parse_address,
};
use sponsor_eip7702_core::{
    authorization::SignedAuthorizationHex,
    calldata::EncodedCall,
    draft::{ExecutionDraft, SponsorRequest, SponsoredCall},
    executor::{ExecutionReceipt, SimulationOutcome, SponsoredExecutor},
    transaction::SignedType4Summary,
};
use tenderly_core::TenderlyClient;

use crate::http::{
    error::ApiEngineError,
    extractors::{AuthorityKeyExtractor, EngineJson},
    server::EngineServerState,
    types::SuccessResponse,
};

type ServerExecutor = SponsoredExecutor<
    EvmChain,
    Arc<MaybeSimulator<TenderlyClient>>,
    GasStationOracle,
    LocalAccountSigner,
>;

// ===== REQUEST/RESPONSE TYPES =====

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorRequestBody {
    pub chain_id: u64,
    /// Defaults to the chain's configured delegate
    #[serde(default)]
    pub delegate_address: Option<String>,
    #[serde(default)]
    pub call: SponsoredCall,
    #[serde(default)]
    pub gas_limit: Option<u64>,
    #[serde(default)]
    pub access_list: AccessList,
}

/// What was signed for the draft. Nothing in it has been broadcast.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSummary {
    pub generation: u64,
    pub authority: Address,
    pub authority_nonce: u64,
    pub relayer: Address,
    pub relayer_nonce: u64,
    pub delegate: Address,
    pub authorization: SignedAuthorizationHex,
    pub call: EncodedCall,
    pub gas: ResolvedGas,
    pub transaction: SignedType4Summary,
}

impl DraftSummary {
    fn from_draft(draft: &ExecutionDraft) -> Result<Self, EngineError> {
        let prepared = draft.prepared().ok_or_else(|| EngineError::InternalError {
            message: "draft was not prepared".to_string(),
        })?;

        Ok(Self {
            generation: draft.generation(),
            authority: prepared.nonces.authority,
            authority_nonce: prepared.nonces.authority_nonce,
            relayer: prepared.nonces.relayer,
            relayer_nonce: prepared.nonces.relayer_nonce,
            delegate: draft.request().delegate_address,
            authorization: prepared.authorization.to_hex(),
            call: prepared.call.clone(),
            gas: prepared.gas,
            transaction: prepared.transaction.summary(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorSimulationResponse {
    pub draft: DraftSummary,
    pub simulation: SimulationOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorExecutionResponse {
    pub receipt: ExecutionReceipt,
    pub simulation: SimulationOutcome,
}

// ===== HELPERS =====

fn build_executor(
    state: &EngineServerState,
    chain_id: u64,
) -> Result<ServerExecutor, EngineError> {
    let entry = state.chains.get(chain_id)?;

    Ok(SponsoredExecutor::new(
        entry.chain.clone(),
        state.simulator.clone(),
        state.gas.clone(),
        entry.relayer.clone(),
    )
    .with_policy(state.simulation_policy))
}

fn to_request(
    state: &EngineServerState,
    body: SponsorRequestBody,
) -> Result<SponsorRequest, EngineError> {
    let delegate_address = match &body.delegate_address {
        Some(value) => parse_address(value)?,
        None => state.chains.delegate_address(body.chain_id)?,
    };

    Ok(SponsorRequest {
        chain_id: body.chain_id,
        delegate_address,
        call: body.call,
        gas_limit: body.gas_limit,
        access_list: body.access_list,
    })
}

async fn prepare_and_simulate(
    state: &EngineServerState,
    authority: &LocalAccountSigner,
    body: SponsorRequestBody,
) -> Result<(ServerExecutor, ExecutionDraft, SimulationOutcome), EngineError> {
    let executor = build_executor(state, body.chain_id)?;
    let request = to_request(state, body)?;

    let mut draft = executor.draft(request, authority).await?;
    let simulation = executor.simulate(&mut draft).await?;

    Ok((executor, draft, simulation))
}

// ===== ROUTE HANDLERS =====

/// Builds, signs and dry-runs a sponsored transaction without broadcasting it.
pub async fn sponsor_simulate(
    State(state): State<EngineServerState>,
    AuthorityKeyExtractor(authority): AuthorityKeyExtractor,
    EngineJson(body): EngineJson<SponsorRequestBody>,
) -> Result<impl IntoResponse, ApiEngineError> {
    let (_, draft, simulation) = prepare_and_simulate(&state, &authority, body).await?;

    Ok((
        StatusCode::OK,
        Json(SuccessResponse::new(SponsorSimulationResponse {
            draft: DraftSummary::from_draft(&draft)?,
            simulation,
        })),
    ))
}

/// Builds, signs, dry-runs and broadcasts a sponsored transaction in one flow.
///
/// Broadcast happens at most once, and only when the simulation policy and
/// the nonce re-check both allow it.
pub async fn sponsor_execute(
    State(state): State<EngineServerState>,
    AuthorityKeyExtractor(authority): AuthorityKeyExtractor,
    EngineJson(body): EngineJson<SponsorRequestBody>,
) -> Result<impl IntoResponse, ApiEngineError> {
    let (executor, mut draft, simulation) = prepare_and_simulate(&state, &authority, body).await?;
    let receipt = executor.execute(&mut draft).await?;

    tracing::info!(
        chain_id = receipt.chain_id,
        authority = ?authority.address(),
        tx_hash = ?receipt.tx_hash,
        "Sponsored transaction broadcast"
    );

    Ok((
        StatusCode::OK,
        Json(SuccessResponse::new(SponsorExecutionResponse {
            receipt,
            simulation,
        })),
    ))
}
