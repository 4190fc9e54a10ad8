use alloy::primitives::{Address, TxHash};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sponsor_eip7702_core::{
    submit::TransactionSubmitter,
    transaction::{SignedType4Summary, decode_signed_hex},
};

use crate::http::{
    error::ApiEngineError, extractors::EngineJson, server::EngineServerState,
    types::SuccessResponse,
};

#[derive(Debug, Clone, Deserialize)]
pub struct DecodeTransactionRequest {
    /// `0x04`-prefixed signed envelope, hex encoded
    pub raw: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeTransactionResponse {
    pub sender: Address,
    #[serde(flatten)]
    pub transaction: SignedType4Summary,
}

pub async fn decode_transaction(
    EngineJson(request): EngineJson<DecodeTransactionRequest>,
) -> Result<impl IntoResponse, ApiEngineError> {
    let signed = decode_signed_hex(&request.raw)?;

    Ok((
        StatusCode::OK,
        Json(SuccessResponse::new(DecodeTransactionResponse {
            sender: signed.recover_sender()?,
            transaction: signed.summary(),
        })),
    ))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTransactionRequest {
    pub chain_id: u64,
    /// `0x04`-prefixed signed envelope, hex encoded
    pub raw: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTransactionResponse {
    pub chain_id: u64,
    pub tx_hash: TxHash,
}

/// Broadcasts an already signed set-code transaction once. Malformed envelopes never reach the node.
pub async fn submit_transaction(
    State(state): State<EngineServerState>,
    EngineJson(request): EngineJson<SubmitTransactionRequest>,
) -> Result<impl IntoResponse, ApiEngineError> {
    let entry = state.chains.get(request.chain_id)?;

    let tx_hash = TransactionSubmitter::new(&entry.chain)
        .submit_hex(&request.raw, request.chain_id)
        .await?;

    Ok((
        StatusCode::OK,
        Json(SuccessResponse::new(SubmitTransactionResponse {
            chain_id: request.chain_id,
            tx_hash,
        })),
    ))
}
