use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenderlyError {
    #[error("SimulationNotConfigured: {message}")]
    NotConfigured { message: String },

    #[error("InvalidHeaderValue: {header}")]
    HeaderValue { header: String },

    #[error("UrlParseError: {message}")]
    UrlParseError { value: String, message: String },

    #[error("HttpClientBackendError: {message}")]
    HttpClientBackendError { message: String },

    #[error("HttpError: {error}")]
    HttpError {
        #[from]
        error: SerializableReqwestError,
    },

    /// The service answered, but not with a simulation result
    #[error("UnexpectedResponse ({status}): {body}")]
    UnexpectedResponse { status: u16, body: String },
}

impl TenderlyError {
    pub fn header_value(header: &str) -> Self {
        Self::HeaderValue {
            header: header.to_string(),
        }
    }

    pub fn url(value: String, error: url::ParseError) -> Self {
        Self::UrlParseError {
            value,
            message: error.to_string(),
        }
    }

    pub fn http_client_backend(error: reqwest::Error) -> Self {
        Self::HttpClientBackendError {
            message: error.to_string(),
        }
    }
}

#[derive(Error, Serialize, Deserialize, Debug, Clone)]
pub enum SerializableReqwestError {
    #[error("builder error")]
    Builder {
        message: String,
        url: Option<String>,
    },

    #[error("error sending request")]
    Request {
        message: String,
        url: Option<String>,
    },

    #[error("operation timed out")]
    Timeout {
        message: String,
        url: Option<String>,
    },

    #[error("connection failed")]
    Connect {
        message: String,
        url: Option<String>,
    },

    #[error("HTTP status client error ({status})")]
    ClientError {
        status: u16,
        message: String,
        url: Option<String>,
    },

    #[error("HTTP status server error ({status})")]
    ServerError {
        status: u16,
        message: String,
        url: Option<String>,
    },

    #[error("error decoding response body")]
    Decode {
        message: String,
        url: Option<String>,
    },

    #[error("unknown error: {message}")]
    Unknown {
        message: String,
        url: Option<String>,
    },
}

impl From<&reqwest::Error> for SerializableReqwestError {
    fn from(error: &reqwest::Error) -> Self {
        let message = error.to_string();
        let url = error.url().map(|u| u.to_string());

        if error.is_timeout() {
            Self::Timeout { message, url }
        } else if error.is_connect() {
            Self::Connect { message, url }
        } else if error.is_builder() {
            Self::Builder { message, url }
        } else if error.is_status() {
            match error.status() {
                Some(status) if status.is_client_error() => Self::ClientError {
                    status: status.as_u16(),
                    message,
                    url,
                },
                Some(status) => Self::ServerError {
                    status: status.as_u16(),
                    message,
                    url,
                },
                None => Self::Unknown { message, url },
            }
        } else if error.is_decode() || error.is_body() {
            Self::Decode { message, url }
        } else if error.is_request() {
            Self::Request { message, url }
        } else {
            Self::Unknown { message, url }
        }
    }
}

impl From<reqwest::Error> for SerializableReqwestError {
    fn from(error: reqwest::Error) -> Self {
        Self::from(&error)
    }
}

impl From<reqwest::Error> for TenderlyError {
    fn from(error: reqwest::Error) -> Self {
        Self::HttpError {
            error: SerializableReqwestError::from(&error),
        }
    }
}
