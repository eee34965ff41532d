//! Web search backends.
//!
//! The `search` tool talks to a [`SearchBackend`]. The shipped backend is the
//! Yandex Search API v2 web-search endpoint, which answers with the rendered
//! result page as base64 in `rawData`.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, SidekickError};

/// Something that can answer a free-text web query.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run `query` and return the raw result text.
    async fn search(&self, query: &str) -> Result<String>;
}

/// Yandex Search API v2 client.
pub struct YandexSearch {
    api_key: String,
    api_url: String,
    search_type: String,
    client: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchQuery<'a> {
    search_type: &'a str,
    query_text: &'a str,
    family_mode: &'static str,
    page: u32,
    fix_typo_mode: &'static str,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: SearchQuery<'a>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    raw_data: Option<String>,
}

impl YandexSearch {
    pub fn new(api_key: &str, api_url: &str, search_type: &str, client: Client) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_url: api_url.to_string(),
            search_type: search_type.to_string(),
            client,
        }
    }

    /// Build from config. Returns `None` when no API key is configured.
    pub fn from_config(config: &Config, client: Client) -> Option<Self> {
        let api_key = config
            .search
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())?;
        Some(Self::new(
            api_key,
            &config.search.api_url,
            &config.search.search_type,
            client,
        ))
    }

    fn request_body<'a>(&'a self, query: &'a str) -> SearchRequest<'a> {
        SearchRequest {
            query: SearchQuery {
                search_type: &self.search_type,
                query_text: query,
                family_mode: "FAMILY_MODE_NONE",
                page: 0,
                fix_typo_mode: "FIX_TYPO_MODE_ON",
            },
        }
    }
}

/// Decode the base64 `rawData` field into text; invalid UTF-8 is replaced.
fn decode_raw_data(raw: &str) -> Result<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(raw.trim())
        .map_err(|e| SidekickError::Search(format!("Invalid rawData encoding: {}", e)))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[async_trait]
impl SearchBackend for YandexSearch {
    async fn search(&self, query: &str) -> Result<String> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(query))
            .send()
            .await
            .map_err(|e| SidekickError::Search(format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SidekickError::Search(format!(
                "Search API error: {} ({})",
                status,
                detail.trim()
            )));
        }

        let payload: SearchResponse = response
            .json()
            .await
            .map_err(|e| SidekickError::Search(format!("Failed to parse search response: {}", e)))?;

        let raw = payload
            .raw_data
            .ok_or_else(|| SidekickError::Search("Search response has no rawData".to_string()))?;
        let text = decode_raw_data(&raw)?;
        debug!(query = query, bytes = text.len(), "Search finished");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn backend() -> YandexSearch {
        YandexSearch::new(
            "token",
            "https://search.local/v2/web/search",
            "SEARCH_TYPE_RU",
            Client::new(),
        )
    }

    #[test]
    fn test_request_body_shape() {
        let backend = backend();
        let body = serde_json::to_value(backend.request_body("погода в москве")).unwrap();
        assert_eq!(
            body,
            json!({
                "query": {
                    "searchType": "SEARCH_TYPE_RU",
                    "queryText": "погода в москве",
                    "familyMode": "FAMILY_MODE_NONE",
                    "page": 0,
                    "fixTypoMode": "FIX_TYPO_MODE_ON"
                }
            })
        );
    }

    #[test]
    fn test_decode_raw_data() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("<b>результат</b>");
        assert_eq!(decode_raw_data(&encoded).unwrap(), "<b>результат</b>");
    }

    #[test]
    fn test_decode_raw_data_replaces_invalid_utf8() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"<b>\xffx");
        assert_eq!(decode_raw_data(&encoded).unwrap(), "<b>\u{FFFD}x");
    }

    #[test]
    fn test_decode_raw_data_rejects_garbage() {
        let err = decode_raw_data("!!not base64!!").unwrap_err();
        assert!(matches!(err, SidekickError::Search(_)));
    }

    #[test]
    fn test_response_without_raw_data() {
        let payload: SearchResponse = serde_json::from_str(r#"{"other": 1}"#).unwrap();
        assert!(payload.raw_data.is_none());
    }

    #[test]
    fn test_from_config_requires_key() {
        let mut config = Config::default();
        assert!(YandexSearch::from_config(&config, Client::new()).is_none());
        config.search.api_key = Some("  ".to_string());
        assert!(YandexSearch::from_config(&config, Client::new()).is_none());
        config.search.api_key = Some("y-token".to_string());
        let backend = YandexSearch::from_config(&config, Client::new()).unwrap();
        assert_eq!(backend.search_type, "SEARCH_TYPE_RU");
    }
}
