use alloy::{
    primitives::Address,
    transports::{RpcError as AlloyRpcError, TransportErrorKind},
};
use serde::{Deserialize, Serialize};
use tenderly_core::error::TenderlyError;
use thiserror::Error;

use crate::chain::Chain;

#[derive(Debug, Error, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcErrorKind {
    /// Server returned an error response.
    #[error("server returned an error response: {0}")]
    ErrorResp(RpcErrorResponse),

    /// Server returned a null response when a non-null response was expected.
    #[error("server returned a null response when a non-null response was expected")]
    NullResp,

    /// Rpc server returned an unsupported feature.
    #[error("unsupported feature: {message}")]
    UnsupportedFeature { message: String },

    /// Returned when a local pre-processing step fails.
    #[error("local usage error: {message}")]
    InternalError { message: String },

    /// JSON serialization error.
    #[error("serialization error: {message}")]
    SerError { message: String },

    /// JSON deserialization error.
    #[error("deserialization error: {message}, text: {text}")]
    DeserError { message: String, text: String },

    #[error("HTTP error {status}")]
    TransportHttpError { status: u16, body: String },

    #[error("Other transport error: {message}")]
    OtherTransportError { message: String },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcErrorResponse {
    /// The error code.
    pub code: i64,
    /// The error message (if any).
    pub message: String,
    /// The error data (if any).
    pub data: Option<String>,
}

impl std::fmt::Display for RpcErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "code {}: {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, ", data: {data}")?;
        }
        Ok(())
    }
}

#[derive(Error, Debug, Serialize, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "type")]
pub enum EngineError {
    #[error("Malformed private key: {message}")]
    MalformedKey { message: String },

    #[error("Invalid address {value:?}: {message}")]
    InvalidAddress { value: String, message: String },

    #[error("operation {index}: {message}")]
    #[serde(rename_all = "camelCase")]
    InvalidOperationParams {
        /// 1-based position of the operation in the submitted list
        index: usize,
        field: String,
        message: String,
    },

    #[error("Encoding error: {message}")]
    EncodingError { message: String },

    /// Advisory: the on-chain nonce moved after the draft was signed.
    #[error("Nonce for {address} moved from {expected} to {actual}; rebuild and re-sign")]
    StaleNonceRisk {
        address: Address,
        expected: u64,
        actual: u64,
    },

    #[error("RPC error on chain {chain_id} at {rpc_url}: {message}")]
    RpcError {
        chain_id: u64,
        rpc_url: String,
        message: String,
        kind: RpcErrorKind,
    },

    #[error("Bad RPC configuration: {message}")]
    RpcConfigError { message: String },

    #[error("Gas price API unavailable for chain {chain_id}: {message}")]
    GasOracleUnavailable { chain_id: u64, message: String },

    #[error("Simulation unavailable: {message}")]
    SimulationUnavailable { message: String },

    #[error("Simulation reverted: {message}")]
    #[serde(rename_all = "camelCase")]
    SimulationReverted {
        message: String,
        dashboard_url: Option<String>,
    },

    /// No verdict exists for the current parameters, or it was produced for older ones.
    #[error("Simulation required: {message}")]
    SimulationRequired { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl EngineError {
    pub fn invalid_address(value: &str, message: impl Into<String>) -> Self {
        EngineError::InvalidAddress {
            value: value.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_operation(index: usize, field: &str, message: impl Into<String>) -> Self {
        EngineError::InvalidOperationParams {
            index,
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        EngineError::EncodingError {
            message: message.into(),
        }
    }

    /// True for failures that happened before anything left the process.
    pub fn is_local_validation(&self) -> bool {
        matches!(
            self,
            EngineError::MalformedKey { .. }
                | EngineError::InvalidAddress { .. }
                | EngineError::InvalidOperationParams { .. }
                | EngineError::EncodingError { .. }
                | EngineError::ValidationError { .. }
        )
    }
}

pub trait AlloyRpcErrorToEngineError {
    fn to_engine_error(&self, chain: &impl Chain) -> EngineError;
}

fn to_engine_rpc_error_kind(err: &AlloyRpcError<TransportErrorKind>) -> RpcErrorKind {
    match err {
        AlloyRpcError::ErrorResp(err) => RpcErrorKind::ErrorResp(RpcErrorResponse {
            code: err.code,
            message: err.message.to_string(),
            data: err.data.as_ref().map(|data| data.to_string()),
        }),
        AlloyRpcError::NullResp => RpcErrorKind::NullResp,
        AlloyRpcError::UnsupportedFeature(feature) => RpcErrorKind::UnsupportedFeature {
            message: feature.to_string(),
        },
        AlloyRpcError::LocalUsageError(err) => RpcErrorKind::InternalError {
            message: err.to_string(),
        },
        AlloyRpcError::SerError(err) => RpcErrorKind::SerError {
            message: err.to_string(),
        },
        AlloyRpcError::DeserError { err, text } => RpcErrorKind::DeserError {
            message: err.to_string(),
            text: text.to_string(),
        },
        AlloyRpcError::Transport(err) => match err {
            TransportErrorKind::HttpError(err) => RpcErrorKind::TransportHttpError {
                status: err.status,
                body: err.body.to_string(),
            },
            _ => RpcErrorKind::OtherTransportError {
                message: err.to_string(),
            },
        },
    }
}

impl AlloyRpcErrorToEngineError for AlloyRpcError<TransportErrorKind> {
    fn to_engine_error(&self, chain: &impl Chain) -> EngineError {
        EngineError::RpcError {
            chain_id: chain.chain_id(),
            rpc_url: chain.rpc_url().to_string(),
            message: self.to_string(),
            kind: to_engine_rpc_error_kind(self),
        }
    }
}

impl From<TenderlyError> for EngineError {
    fn from(error: TenderlyError) -> Self {
        EngineError::SimulationUnavailable {
            message: error.to_string(),
        }
    }
}
