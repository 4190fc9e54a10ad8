use axum::{Json, http::StatusCode, response::IntoResponse};
use sponsor_core::error::{EngineError, RpcErrorKind};
use serde_json::json;

/// Pairs an [`EngineError`] with the HTTP status it is reported with
pub struct ApiEngineError(pub EngineError);

impl From<EngineError> for ApiEngineError {
    fn from(error: EngineError) -> Self {
        ApiEngineError(error)
    }
}

impl IntoResponse for ApiEngineError {
    fn into_response(self) -> axum::response::Response {
        let code = self.status_code();

        if self.0.is_local_validation() {
            tracing::debug!(status = code.as_u16(), error = %self.0, "Rejected request");
        } else {
            tracing::warn!(status = code.as_u16(), error = %self.0, "Request failed");
        }

        self.with_status(code)
    }
}

impl ApiEngineError {
    fn with_status(self, status: StatusCode) -> axum::response::Response {
        (
            status,
            Json(json!({
                "error": {
                    "message": self.0.to_string(),
                    "details": self.0
                }
            })),
        )
            .into_response()
    }

    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            EngineError::MalformedKey { .. }
            | EngineError::InvalidAddress { .. }
            | EngineError::InvalidOperationParams { .. }
            | EngineError::EncodingError { .. }
            | EngineError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            EngineError::StaleNonceRisk { .. } | EngineError::SimulationRequired { .. } => {
                StatusCode::CONFLICT
            }
            EngineError::SimulationReverted { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::RpcError { kind, .. } => match kind {
                RpcErrorKind::NullResp
                | RpcErrorKind::ErrorResp(_)
                | RpcErrorKind::TransportHttpError { .. }
                | RpcErrorKind::DeserError { .. } => StatusCode::BAD_GATEWAY,
                RpcErrorKind::UnsupportedFeature { .. } => StatusCode::NOT_IMPLEMENTED,
                RpcErrorKind::OtherTransportError { message } if is_timeout(message) => {
                    StatusCode::GATEWAY_TIMEOUT
                }
                _ => StatusCode::SERVICE_UNAVAILABLE,
            },
            EngineError::SimulationUnavailable { message } if is_timeout(message) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            EngineError::SimulationUnavailable { .. } | EngineError::GasOracleUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            EngineError::RpcConfigError { .. } | EngineError::InternalError { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

fn is_timeout(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("timed out") || message.contains("timeout")
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use sponsor_core::error::RpcErrorResponse;

    fn status(error: EngineError) -> StatusCode {
        ApiEngineError(error).status_code()
    }

    #[test]
    fn local_validation_is_a_client_error() {
        assert_eq!(
            status(EngineError::MalformedKey {
                message: "short".into()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(EngineError::invalid_operation(2, "target", "bad")),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn blocked_execution_statuses() {
        assert_eq!(
            status(EngineError::StaleNonceRisk {
                address: Address::ZERO,
                expected: 1,
                actual: 2,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(EngineError::SimulationReverted {
                message: "reverted".into(),
                dashboard_url: None,
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(EngineError::SimulationUnavailable {
                message: "request timed out".into()
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn node_errors_are_bad_gateway() {
        let error = EngineError::RpcError {
            chain_id: 1,
            rpc_url: "http://node".into(),
            message: "nonce too low".into(),
            kind: RpcErrorKind::ErrorResp(RpcErrorResponse {
                code: -32000,
                message: "nonce too low".into(),
                data: None,
            }),
        };
        assert_eq!(status(error), StatusCode::BAD_GATEWAY);
    }
}
