use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::domain::Category;
use crate::error::AvisetError;

const SEARCH_URL: &str = "https://api.bing.microsoft.com/v7.0/images/search";
const API_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// One page of search results.
#[derive(Debug, Clone)]
pub struct SearchPage {
    /// Content URLs with null entries already dropped.
    pub urls: Vec<String>,
    /// Raw number of result items on the page, including items without a
    /// usable content URL. This is the unit the collector counts progress in.
    pub returned: usize,
    pub next_offset: u64,
    pub estimated_total: u64,
}

pub trait BingClient: Send + Sync {
    /// One blocking paginated search call. Non-success statuses propagate as
    /// errors; retry policy belongs to the caller, and the collector
    /// deliberately has none.
    fn search(
        &self,
        category: &Category,
        offset: u64,
        count: u64,
        min_dimension: u32,
    ) -> Result<SearchPage, AvisetError>;
}

#[derive(Clone)]
pub struct BingHttpClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl BingHttpClient {
    pub fn new(api_key: String) -> Result<Self, AvisetError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("aviset/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AvisetError::SearchHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| AvisetError::SearchHttp(err.to_string()))?;
        Ok(Self {
            client,
            api_key,
            base_url: SEARCH_URL.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<SearchItem>,
    #[serde(rename = "nextOffset")]
    next_offset: u64,
    #[serde(rename = "totalEstimatedMatches")]
    total_estimated_matches: u64,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(rename = "contentUrl")]
    content_url: Option<String>,
}

impl BingClient for BingHttpClient {
    fn search(
        &self,
        category: &Category,
        offset: u64,
        count: u64,
        min_dimension: u32,
    ) -> Result<SearchPage, AvisetError> {
        let response = self
            .client
            .get(&self.base_url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[
                ("q", category.search_term()),
                ("count", count.to_string()),
                ("min_height", min_dimension.to_string()),
                ("min_width", min_dimension.to_string()),
                ("offset", offset.to_string()),
                ("license", "Public".to_string()),
            ])
            .send()
            .map_err(|err| AvisetError::SearchHttp(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "search request failed".to_string());
            return Err(AvisetError::SearchStatus { status, message });
        }

        let body: SearchResponse = response
            .json()
            .map_err(|err| AvisetError::SearchHttp(err.to_string()))?;

        let returned = body.value.len();
        let urls = body
            .value
            .into_iter()
            .filter_map(|item| item.content_url)
            .collect();

        Ok(SearchPage {
            urls,
            returned,
            next_offset: body.next_offset,
            estimated_total: body.total_estimated_matches,
        })
    }
}
