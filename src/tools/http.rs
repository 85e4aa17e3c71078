//! Shared HTTP plumbing for the network tools
//!
//! Every failure mode is folded into [`FetchError`] so handlers can turn it
//! into an error-shaped result with a single `map_err`.

use super::ToolContext;
use reqwest::Response;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum FetchError {
    #[error("{service} API key is not configured")]
    MissingKey { service: &'static str },

    #[error("Request to {service} timed out")]
    Timeout { service: &'static str },

    #[error("No response from {service}: {detail}")]
    Transport {
        service: &'static str,
        detail: String,
    },

    #[error("HTTP {status} from {service}")]
    Status { service: &'static str, status: u16 },

    #[error("Invalid JSON from {service}")]
    InvalidBody { service: &'static str },
}

impl FetchError {
    fn from_reqwest(service: &'static str, e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout { service }
        } else {
            FetchError::Transport {
                service,
                detail: e.to_string(),
            }
        }
    }
}

/// Configured key for a service, or `MissingKey`
pub(crate) fn require_key<'a>(
    key: Option<&'a String>,
    service: &'static str,
) -> Result<&'a str, FetchError> {
    key.map(String::as_str)
        .filter(|k| !k.is_empty())
        .ok_or(FetchError::MissingKey { service })
}

/// GET `url` with query parameters and parse the JSON body
pub(crate) async fn get_json(
    ctx: &ToolContext,
    service: &'static str,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value, FetchError> {
    tracing::debug!(service, url, "Tool GET");
    let response = ctx
        .client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(service, &e))?;
    read_json(service, response).await
}

/// POST a JSON body to `url` with extra headers and parse the JSON reply
pub(crate) async fn post_json(
    ctx: &ToolContext,
    service: &'static str,
    url: &str,
    headers: &[(&str, &str)],
    body: &Value,
) -> Result<Value, FetchError> {
    tracing::debug!(service, url, "Tool POST");
    let mut request = ctx.client.post(url).json(body);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let response = request
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(service, &e))?;
    read_json(service, response).await
}

async fn read_json(service: &'static str, response: Response) -> Result<Value, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            service,
            status: status.as_u16(),
        });
    }
    let text = response
        .text()
        .await
        .map_err(|e| FetchError::from_reqwest(service, &e))?;
    if text.trim().is_empty() {
        return Err(FetchError::InvalidBody { service });
    }
    serde_json::from_str(&text).map_err(|_| FetchError::InvalidBody { service })
}
