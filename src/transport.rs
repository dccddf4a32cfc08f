use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{HeaderValue, USER_AGENT};

use crate::config::Config;
use crate::errors::Error;
use crate::request::{RequestDescriptor, Response};

/// Issues a single HTTP exchange. Any status is a successful exchange; only transport
/// failures (connect, timeout, body read) are errors.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: RequestDescriptor)
    -> impl Future<Output = Result<Response, Error>> + Send;
}

/// `reqwest`-backed transport resolving relative paths against the configured base URL.
#[derive(Clone)]
pub struct ReqwestTransport {
    http_client: Client,
    config: Config,
}

impl ReqwestTransport {
    pub fn new(config: Config) -> Result<Self, Error> {
        let http_client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            http_client,
            config,
        })
    }

    fn timeout(&self) -> Duration {
        self.config.timeout()
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: RequestDescriptor) -> Result<Response, Error> {
        let url = self.config.resolve(&request.path);
        let url = reqwest::Url::parse(&url).map_err(|e| Error::Url(format!("{url}: {e}")))?;

        let RequestDescriptor {
            method,
            mut headers,
            body,
            ..
        } = request;
        if !headers.contains_key(USER_AGENT)
            && let Ok(agent) = HeaderValue::from_str(&self.config.user_agent)
        {
            headers.insert(USER_AGENT, agent);
        }

        let mut builder = self.http_client.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let resp = builder.send().await.map_err(|e| self.classify(e))?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await.map_err(|e| self.classify(e))?.to_vec();
        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

impl ReqwestTransport {
    fn classify(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout(self.timeout())
        } else {
            Error::Reqwest(err)
        }
    }
}
