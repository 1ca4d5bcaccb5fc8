//! Scraping of public search result pages. Used for the `open` fallback,
//! media lookup, and realtime answer context.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::provider_error::ProviderError;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/100.0.4896.75 Safari/537.36";
const DEFAULT_SEARCH_BASE: &str = "https://www.google.com";
const DEFAULT_VIDEO_BASE: &str = "https://www.youtube.com";
const DEFAULT_SEARCH_TIMEOUT_MS: u64 = 10_000;
const MAX_ERROR_BODY_CHARS: usize = 256;

static RESULT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href="(?:/url\?q=)?(https?://[^"&]+)"#).expect("valid result link regex")
});
static RESULT_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<h3[^>]*>(.*?)</h3>").expect("valid result title regex"));
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid html tag regex"));
static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"/watch\?v=([A-Za-z0-9_-]{11})"#).expect("valid video id regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSearchConfig {
    pub search_base: String,
    pub video_base: String,
    pub request_timeout_ms: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            search_base: DEFAULT_SEARCH_BASE.to_string(),
            video_base: DEFAULT_VIDEO_BASE.to_string(),
            request_timeout_ms: DEFAULT_SEARCH_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebSearchClient {
    client: reqwest::Client,
    config: WebSearchConfig,
}

impl WebSearchClient {
    pub fn new(config: WebSearchConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn video_base(&self) -> &str {
        self.config.video_base.trim_end_matches('/')
    }

    async fn fetch(&self, url: &str, query: &[(&str, &str)]) -> Result<String, ProviderError> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }
        Ok(body)
    }

    async fn fetch_results_page(&self, query: &str) -> Result<String, ProviderError> {
        let url = format!("{}/search", self.config.search_base.trim_end_matches('/'));
        self.fetch(&url, &[("q", query)]).await
    }

    /// Outbound result links in page order.
    pub async fn result_links(&self, query: &str) -> Result<Vec<String>, ProviderError> {
        Ok(extract_result_links(&self.fetch_results_page(query).await?))
    }

    pub async fn result_titles(&self, query: &str) -> Result<Vec<String>, ProviderError> {
        Ok(extract_result_titles(&self.fetch_results_page(query).await?))
    }

    /// Watch URL of the first video result, if the page lists any.
    pub async fn first_video_url(&self, query: &str) -> Result<Option<String>, ProviderError> {
        let url = format!("{}/results", self.video_base());
        let page = self.fetch(&url, &[("search_query", query)]).await?;
        Ok(extract_first_video_id(&page)
            .map(|video_id| format!("{}/watch?v={video_id}", self.video_base())))
    }
}

/// Absolute result links, skipping the search engine's own pages.
pub fn extract_result_links(html: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    for capture in RESULT_LINK.captures_iter(html) {
        let link = capture[1].to_string();
        if link.contains("google.") || links.contains(&link) {
            continue;
        }
        links.push(link);
    }
    links
}

pub fn extract_result_titles(html: &str) -> Vec<String> {
    RESULT_TITLE
        .captures_iter(html)
        .map(|capture| decode_entities(HTML_TAG.replace_all(&capture[1], "").trim()))
        .filter(|title| !title.is_empty())
        .collect()
}

pub fn extract_first_video_id(html: &str) -> Option<String> {
    VIDEO_ID
        .captures(html)
        .map(|capture| capture[1].to_string())
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}
