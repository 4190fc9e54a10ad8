use axum::{
    Json,
    extract::{FromRequestParts, rejection::JsonRejection},
    http::request::Parts,
};
use sponsor_core::{error::EngineError, signer::LocalAccountSigner};

use crate::http::error::ApiEngineError;

pub const AUTHORITY_KEY_HEADER: &str = "x-authority-private-key";

/// Signer for the account granting the delegation, built from the
/// `x-authority-private-key` header. Signing routes take the authority key
/// from this header only; `/v1/validate` checks keys but never signs with them.
pub struct AuthorityKeyExtractor(pub LocalAccountSigner);

impl<S> FromRequestParts<S> for AuthorityKeyExtractor
where
    S: Send + Sync,
{
    type Rejection = ApiEngineError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let private_key = parts
            .headers
            .get(AUTHORITY_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiEngineError(EngineError::ValidationError {
                    message: format!("Missing {AUTHORITY_KEY_HEADER} header"),
                })
            })?;

        Ok(AuthorityKeyExtractor(LocalAccountSigner::from_private_key(
            private_key,
        )?))
    }
}

/// Custom JSON extractor that converts serde errors to ApiEngineError
pub struct EngineJson<T>(pub T);

impl<T, S> axum::extract::FromRequest<S> for EngineJson<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiEngineError;

    async fn from_request(req: axum::extract::Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(data)) => Ok(EngineJson(data)),
            Err(rejection) => {
                let message = match rejection {
                    JsonRejection::JsonDataError(err) => format!("Invalid JSON data: {}", err),
                    JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {}", err),
                    JsonRejection::MissingJsonContentType(_) => {
                        "Missing or invalid Content-Type header. Expected application/json"
                            .to_string()
                    }
                    JsonRejection::BytesRejection(err) => {
                        format!("Failed to read request body: {}", err)
                    }
                    _ => "Invalid JSON request".to_string(),
                };

                Err(ApiEngineError(EngineError::ValidationError { message }))
            }
        }
    }
}
