use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use sponsor_core::validation::parse_address;
use sponsor_eip7702_core::delegated_account::DelegatedAccount;

use crate::http::{error::ApiEngineError, server::EngineServerState, types::SuccessResponse};

/// Reports where an account's code currently delegates, compared with the chain's configured delegate.
pub async fn delegation_status(
    State(state): State<EngineServerState>,
    Path((chain_id, address)): Path<(u64, String)>,
) -> Result<impl IntoResponse, ApiEngineError> {
    let account = parse_address(&address)?;
    let entry = state.chains.get(chain_id)?;

    let status = DelegatedAccount::new(account, &entry.chain)
        .status(Some(entry.chain.delegate_address()))
        .await?;

    Ok((StatusCode::OK, Json(SuccessResponse::new(status))))
}
