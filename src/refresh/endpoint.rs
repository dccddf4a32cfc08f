use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::errors::Error;
use crate::request::RequestDescriptor;
use crate::transport::Transport;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

/// Tokens handed back by the refresh endpoint. A `refresh_token` is only present when the
/// server rotates it.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedTokens {
    #[serde(alias = "access_token", alias = "token")]
    pub access_token: String,
    #[serde(default, alias = "refresh_token")]
    pub refresh_token: Option<String>,
}

/// Calls the refresh endpoint once. The request bypasses the interceptors: it carries no
/// bearer header and a 401 from it is never retried.
pub async fn request_new_token<T: Transport>(
    transport: &T,
    config: &Config,
    refresh_token: &str,
) -> Result<RefreshedTokens, Error> {
    let descriptor =
        RequestDescriptor::post(config.refresh_path.as_str()).json(&RefreshBody { refresh_token })?;
    let response = transport
        .send(descriptor.clone())
        .await?
        .error_for_status(&descriptor)?;
    let tokens: RefreshedTokens = response
        .json()
        .map_err(|e| Error::InvalidRefreshResponse(e.to_string()))?;
    if tokens.access_token.is_empty() {
        return Err(Error::InvalidRefreshResponse(
            "empty access token".to_string(),
        ));
    }
    debug!(
        access_token_len = tokens.access_token.len(),
        rotated = tokens.refresh_token.is_some(),
        "refresh.tokens_received"
    );
    Ok(tokens)
}
