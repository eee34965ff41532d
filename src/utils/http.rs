//! Shared HTTP client construction.

use std::time::Duration;

use reqwest::Client;

use crate::error::{Result, SidekickError};

/// Request timeout for model, search and transcription calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Build the client used for outbound API calls.
///
/// System proxy detection is disabled; only `proxy` is used when set.
pub fn build_http_client(proxy: Option<&str>) -> Result<Client> {
    let mut builder = Client::builder().timeout(REQUEST_TIMEOUT).no_proxy();
    if let Some(url) = proxy {
        let proxy = reqwest::Proxy::all(url)
            .map_err(|e| SidekickError::Config(format!("Invalid proxy '{}': {}", url, e)))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| SidekickError::Config(format!("Failed to build HTTP client: {}", e)))
}
