use serde::{Deserialize, Serialize};
use sponsor_core::error::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub result: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(result: T) -> Self {
        Self { result }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse<E = EngineError> {
    pub error: ErrorResponseInner<E>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponseInner<E = EngineError> {
    pub message: String,
    pub details: E,
}
