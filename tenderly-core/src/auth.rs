use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::TenderlyError;

pub const ACCESS_KEY_HEADER: &str = "X-Access-Key";

/// Credentials for the simulation API. The access key is never logged.
#[derive(Clone, Serialize, Deserialize)]
pub struct TenderlyAuth {
    pub access_key: String,
}

impl std::fmt::Debug for TenderlyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenderlyAuth")
            .field("access_key", &"<redacted>")
            .finish()
    }
}

impl TenderlyAuth {
    pub fn new(access_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
        }
    }

    pub fn to_header_map(&self) -> Result<HeaderMap, TenderlyError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCESS_KEY_HEADER,
            HeaderValue::from_str(&self.access_key)
                .map_err(|_| TenderlyError::header_value(ACCESS_KEY_HEADER))?,
        );
        Ok(headers)
    }
}
