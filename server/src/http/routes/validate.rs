use alloy::primitives::Address;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sponsor_core::validation::{derive_address, parse_address};

use crate::http::{error::ApiEngineError, extractors::EngineJson, types::SuccessResponse};

// ===== REQUEST/RESPONSE TYPES =====

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    #[serde(default)]
    pub addresses: Vec<String>,
    #[serde(default)]
    pub private_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressCheck {
    pub input: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The key itself is never echoed back.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateKeyCheck {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub addresses: Vec<AddressCheck>,
    pub private_keys: Vec<PrivateKeyCheck>,
}

// ===== ROUTE HANDLER =====

pub async fn validate(
    EngineJson(request): EngineJson<ValidateRequest>,
) -> Result<impl IntoResponse, ApiEngineError> {
    let addresses = request
        .addresses
        .into_iter()
        .map(|input| match parse_address(&input) {
            Ok(address) => AddressCheck {
                input,
                valid: true,
                address: Some(address),
                error: None,
            },
            Err(e) => AddressCheck {
                input,
                valid: false,
                address: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    let private_keys = request
        .private_keys
        .iter()
        .map(|key| match derive_address(key) {
            Ok(address) => PrivateKeyCheck {
                valid: true,
                derived_address: Some(address),
                error: None,
            },
            Err(e) => PrivateKeyCheck {
                valid: false,
                derived_address: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    Ok((
        StatusCode::OK,
        Json(SuccessResponse::new(ValidateResponse {
            addresses,
            private_keys,
        })),
    ))
}
