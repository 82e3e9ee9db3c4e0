//! Web search and page scraping over HTTP.
//!
//! [`SearxngSearch`] talks to a SearXNG instance's JSON API. [`HttpScraper`]
//! fetches a page and extracts its visible text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::{debug, info};

use mnemo_core::{
    defaults, sanitize_text, Error, Result, ScrapedPage, WebResult, WebScrape, WebSearch,
};

/// Elements whose text is never shown to a reader.
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "iframe", "svg", "head", "template", "nav", "footer",
];

const USER_AGENT: &str = concat!("mnemo/", env!("CARGO_PKG_VERSION"));

fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

// =============================================================================
// SEARCH
// =============================================================================

/// Configuration for the SearXNG client.
#[derive(Debug, Clone)]
pub struct SearxngConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl SearxngConfig {
    /// Read `WEB_SEARCH_URL` and `WEB_SEARCH_API_KEY`.
    ///
    /// Returns `None` when no search URL is configured.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("WEB_SEARCH_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())?;
        Some(Self {
            base_url,
            api_key: std::env::var("WEB_SEARCH_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            timeout_seconds: defaults::WEB_TIMEOUT_SECS,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

/// SearXNG JSON API client.
pub struct SearxngSearch {
    client: Client,
    config: SearxngConfig,
}

impl SearxngSearch {
    pub fn new(config: SearxngConfig) -> Result<Self> {
        let client = http_client(Duration::from_secs(config.timeout_seconds))?;
        info!(
            subsystem = "ask",
            component = "web_search",
            base_url = %config.base_url,
            "Initializing web search"
        );
        Ok(Self { client, config })
    }

    /// Client from the environment, or `None` when web search is not
    /// configured.
    pub fn from_env() -> Result<Option<Self>> {
        SearxngConfig::from_env().map(Self::new).transpose()
    }
}

#[async_trait]
impl WebSearch for SearxngSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebResult>> {
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        let mut req = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json")]);
        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Retrieval(format!(
                "web search returned HTTP {}",
                status.as_u16()
            )));
        }

        let body: SearxngResponse = response.json().await?;
        let results: Vec<WebResult> = body
            .results
            .into_iter()
            .filter(|r| r.url.starts_with("http://") || r.url.starts_with("https://"))
            .take(limit)
            .map(|r| WebResult {
                title: r.title,
                url: r.url,
                snippet: r.content,
            })
            .collect();

        debug!(
            subsystem = "ask",
            component = "web_search",
            result_count = results.len(),
            "Web search complete"
        );
        Ok(results)
    }
}

// =============================================================================
// SCRAPE
// =============================================================================

/// Fetches pages and extracts readable text.
///
/// Bodies are read up to a byte cap; anything past it is never downloaded.
pub struct HttpScraper {
    client: Client,
    max_bytes: usize,
}

impl HttpScraper {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(defaults::WEB_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            max_bytes: defaults::WEB_SCRAPE_MAX_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    async fn read_capped(&self, mut response: reqwest::Response) -> Result<String> {
        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let room = self.max_bytes - body.len();
            if chunk.len() >= room {
                body.extend_from_slice(&chunk[..room]);
                break;
            }
            body.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[async_trait]
impl WebScrape for HttpScraper {
    async fn fetch(&self, url: &str) -> Result<ScrapedPage> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Retrieval(format!(
                "fetching {} returned HTTP {}",
                url,
                status.as_u16()
            )));
        }
        let html = self.read_capped(response).await?;
        let page = extract_page(&html)?;
        debug!(
            subsystem = "ask",
            component = "scraper",
            url,
            bytes = html.len(),
            chars = page.content.len(),
            "Page scraped"
        );
        Ok(page)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Parse(format!("Invalid CSS selector: {:?}", e)))
}

/// Title and visible text of an HTML document.
pub fn extract_page(html: &str) -> Result<ScrapedPage> {
    let document = Html::parse_document(html);

    let title = document
        .select(&selector("title")?)
        .next()
        .map(|t| t.text().collect::<String>())
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();

    let mut parts = Vec::new();
    match document.select(&selector("body")?).next() {
        Some(body) => collect_text(body, &mut parts),
        None => collect_text(document.root_element(), &mut parts),
    }

    Ok(ScrapedPage {
        title,
        content: sanitize_text(&parts.join("\n")),
    })
}

fn collect_text(element: ElementRef, parts: &mut Vec<String>) {
    if SKIPPED_ELEMENTS.contains(&element.value().name()) {
        return;
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, parts);
                }
            }
            _ => {}
        }
    }
}
