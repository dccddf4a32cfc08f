use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::request::RequestDescriptor;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("http transport error: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// A response with a non-success status, together with the request that produced it.
    #[error("{} {} failed with status {status}", .request.method, .request.path)]
    Http {
        status: StatusCode,
        body: String,
        request: Box<RequestDescriptor>,
    },
    /// The refresh call failed; shared by every request that was waiting on it.
    #[error("token refresh failed: {0}")]
    Refresh(Arc<Error>),
    #[error("token refresh was abandoned before it settled")]
    RefreshAbandoned,
    #[error("no refresh token is stored")]
    MissingRefreshToken,
    #[error("refresh endpoint returned an unusable response: {0}")]
    InvalidRefreshResponse(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid url: {0}")]
    Url(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// HTTP status carried by the error, looking through a shared refresh failure.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Http { status, .. } => Some(*status),
            Error::Refresh(inner) => inner.status(),
            Error::Reqwest(err) => err.status(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Http { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }
}
