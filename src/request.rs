use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::errors::Error;

/// Everything needed to (re)issue a request against the storefront API.
///
/// `path` is either relative to the configured base URL (`/api/products`) or an absolute URL.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, Error> {
        self.body = Some(serde_json::to_vec(body)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    /// Sets `Authorization: Bearer <token>`, or removes the header when there is no token.
    /// A token that cannot be sent as a header value is dropped with a warning.
    pub fn with_bearer(mut self, token: Option<&str>) -> Self {
        let value = token.filter(|t| !t.is_empty()).and_then(|t| {
            HeaderValue::from_str(&format!("Bearer {t}"))
                .inspect_err(|_| {
                    warn!(
                        method = %self.method,
                        path = %self.path,
                        token_len = t.len(),
                        "access token is not a valid header value; sending without Authorization"
                    )
                })
                .ok()
        });
        match value {
            Some(mut value) => {
                value.set_sensitive(true);
                self.headers.insert(AUTHORIZATION, value);
            }
            None => {
                self.headers.remove(AUTHORIZATION);
            }
        }
        self
    }

    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
    }

    /// Path component used to recognise well-known endpoints, ignoring scheme, host and query.
    pub fn endpoint_path(&self) -> &str {
        let without_scheme = match self.path.split_once("://") {
            Some((_, rest)) => rest.find('/').map(|idx| &rest[idx..]).unwrap_or("/"),
            None => self.path.as_str(),
        };
        without_scheme
            .split(['?', '#'])
            .next()
            .unwrap_or(without_scheme)
    }
}

/// A request travelling through the interceptor chain, carrying its retry marker.
#[derive(Clone, Debug)]
pub struct AuthRequest {
    pub descriptor: RequestDescriptor,
    pub retried: bool,
}

impl AuthRequest {
    pub fn new(descriptor: RequestDescriptor) -> Self {
        Self {
            descriptor,
            retried: false,
        }
    }

    pub fn into_retried(self) -> Self {
        Self {
            descriptor: self.descriptor,
            retried: true,
        }
    }
}

/// A completed HTTP exchange, whatever its status.
#[derive(Clone, Debug)]
pub struct Response {
    pub status: reqwest::StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Turns a non-success status into `Error::Http`, keeping the request that was sent.
    pub fn error_for_status(self, request: &RequestDescriptor) -> Result<Self, Error> {
        if self.status.is_success() {
            return Ok(self);
        }
        Err(Error::Http {
            status: self.status,
            body: self.text(),
            request: Box::new(request.clone()),
        })
    }
}
