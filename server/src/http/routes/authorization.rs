use alloy::primitives::{Address, B256, Bytes};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use sponsor_core::{signer::AccountSigner, validation::parse_address};
use sponsor_eip7702_core::{
    authorization::{Authorization, SignedAuthorizationHex},
    delegated_account::DelegatedAccount,
};

use crate::http::{
    error::ApiEngineError,
    extractors::{AuthorityKeyExtractor, EngineJson},
    server::EngineServerState,
    types::SuccessResponse,
};

// ===== REQUEST/RESPONSE TYPES =====

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationDigestRequest {
    pub chain_id: u64,
    pub delegate_address: String,
    pub nonce: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationDigestResponse {
    pub digest: B256,
    /// `0x05 || rlp([chain_id, address, nonce])`
    pub preimage: Bytes,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignAuthorizationRequest {
    pub chain_id: u64,
    /// Defaults to the chain's configured delegate
    #[serde(default)]
    pub delegate_address: Option<String>,
    /// Defaults to the authority's current on-chain nonce
    #[serde(default)]
    pub nonce: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignAuthorizationResponse {
    pub authority: Address,
    pub digest: B256,
    pub authorization: SignedAuthorizationHex,
}

// ===== ROUTE HANDLERS =====

pub async fn authorization_digest(
    EngineJson(request): EngineJson<AuthorizationDigestRequest>,
) -> Result<impl IntoResponse, ApiEngineError> {
    let delegate = parse_address(&request.delegate_address)?;
    let authorization = Authorization::new(request.chain_id, delegate, request.nonce);

    Ok((
        StatusCode::OK,
        Json(SuccessResponse::new(AuthorizationDigestResponse {
            digest: authorization.digest(),
            preimage: authorization.preimage(),
        })),
    ))
}

/// Signs an authorization for the account in the `x-authority-private-key` header.
///
/// Without an explicit nonce the account's current nonce is used, which is
/// correct whenever a different account submits the transaction.
pub async fn sign_authorization(
    State(state): State<EngineServerState>,
    AuthorityKeyExtractor(authority): AuthorityKeyExtractor,
    EngineJson(request): EngineJson<SignAuthorizationRequest>,
) -> Result<impl IntoResponse, ApiEngineError> {
    let delegate = match &request.delegate_address {
        Some(value) => parse_address(value)?,
        None => state.chains.delegate_address(request.chain_id)?,
    };

    let nonce = match request.nonce {
        Some(nonce) => nonce,
        None => {
            let entry = state.chains.get(request.chain_id)?;
            DelegatedAccount::new(authority.address(), &entry.chain)
                .get_nonce()
                .await?
        }
    };

    let authorization = Authorization::new(request.chain_id, delegate, nonce);
    let digest = authorization.digest();
    let signed = authorization.sign(&authority).await?;

    tracing::info!(
        chain_id = request.chain_id,
        authority = ?authority.address(),
        delegate = ?delegate,
        nonce,
        "Signed authorization"
    );

    Ok((
        StatusCode::OK,
        Json(SuccessResponse::new(SignAuthorizationResponse {
            authority: authority.address(),
            digest,
            authorization: signed.to_hex(),
        })),
    ))
}
