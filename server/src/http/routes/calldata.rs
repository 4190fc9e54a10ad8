use alloy::primitives::Address;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use sponsor_core::validation::parse_address;
use sponsor_eip7702_core::calldata::{CallShape, SequenceOperation, encode_call, encode_sequence};

use crate::http::{error::ApiEngineError, extractors::EngineJson, types::SuccessResponse};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeCallRequest {
    /// The delegated account the call is made on
    pub account: String,
    pub shape: CallShape,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodeSequenceRequest {
    pub account: String,
    pub operations: Vec<SequenceOperation>,
}

fn account(value: &str) -> Result<Address, ApiEngineError> {
    Ok(parse_address(value)?)
}

pub async fn encode_call_shape(
    EngineJson(request): EngineJson<EncodeCallRequest>,
) -> Result<impl IntoResponse, ApiEngineError> {
    let encoded = encode_call(&request.shape, account(&request.account)?)?;

    Ok((StatusCode::OK, Json(SuccessResponse::new(encoded))))
}

pub async fn encode_operation_sequence(
    EngineJson(request): EngineJson<EncodeSequenceRequest>,
) -> Result<impl IntoResponse, ApiEngineError> {
    let encoded = encode_sequence(account(&request.account)?, &request.operations)?;

    Ok((StatusCode::OK, Json(SuccessResponse::new(encoded))))
}
