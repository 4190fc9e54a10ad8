use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use sponsor_core::gas::ResolvedGas;

use crate::http::{error::ApiEngineError, server::EngineServerState, types::SuccessResponse};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasPriceResponse {
    pub chain_id: u64,
    #[serde(flatten)]
    pub gas: ResolvedGas,
}

/// Current fee caps for a chain. Chains without a configured RPC get the static table.
pub async fn gas_price(
    State(state): State<EngineServerState>,
    Path(chain_id): Path<u64>,
) -> Result<impl IntoResponse, ApiEngineError> {
    let gas = match state.chains.get(chain_id) {
        Ok(entry) => state.gas.resolve(chain_id, &entry.chain).await,
        Err(_) => state.gas.static_fees(chain_id),
    };

    Ok((
        StatusCode::OK,
        Json(SuccessResponse::new(GasPriceResponse { chain_id, gas })),
    ))
}
