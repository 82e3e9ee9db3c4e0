//! The ask pipeline: gather context for a mode, then ask the model.
//!
//! Retrieval sub-steps never fail a request. A search, web lookup or scrape
//! that errors or times out just contributes nothing. Provider failures and
//! a missing provider configuration are returned to the caller.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use mnemo_core::{
    defaults, AiProvider, AskMode, AskRequest, AskResponse, ContentType, Error, ProviderConfig,
    Result, SearchRequest, Source, WebScrape, WebSearch,
};
use mnemo_inference::ProviderResolver;
use mnemo_search::HybridSearchEngine;

use crate::context::{merge_sources, personal_context, web_context, WebPage};
use crate::prompts::{self, parse_search_queries};

/// Configuration for the ask pipeline.
#[derive(Debug, Clone)]
pub struct AskConfig {
    /// Upper bound on a request's `max_context`.
    pub max_context_limit: usize,
    /// Web results fetched (and scraped) per query.
    pub web_results: usize,
    /// Characters kept from each scraped page.
    pub page_max_chars: usize,
    /// Web queries generated in hybrid mode.
    pub max_queries: usize,
    /// Deadline for each web search and scrape.
    pub web_timeout: Duration,
}

impl Default for AskConfig {
    fn default() -> Self {
        Self {
            max_context_limit: 20,
            web_results: defaults::WEB_SCRAPE_TOP_N,
            page_max_chars: defaults::WEB_SCRAPE_MAX_CHARS,
            max_queries: defaults::HYBRID_MAX_QUERIES,
            web_timeout: Duration::from_secs(defaults::WEB_TIMEOUT_SECS),
        }
    }
}

impl AskConfig {
    /// Defaults overridden by `WEB_SEARCH_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = std::env::var("WEB_SEARCH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&s| s > 0)
        {
            config.web_timeout = Duration::from_secs(secs);
        }
        config
    }
}

/// Retrieved context and where it came from.
#[derive(Debug, Default)]
struct Gathered {
    context: String,
    sources: Vec<Source>,
}

/// Multi-mode question answering over the user's data and the web.
pub struct AskPipeline {
    search: Arc<HybridSearchEngine>,
    provider: Arc<dyn AiProvider>,
    resolver: ProviderResolver,
    web_search: Option<Arc<dyn WebSearch>>,
    scraper: Option<Arc<dyn WebScrape>>,
    config: AskConfig,
}

impl AskPipeline {
    pub fn new(
        search: Arc<HybridSearchEngine>,
        provider: Arc<dyn AiProvider>,
        resolver: ProviderResolver,
    ) -> Self {
        Self {
            search,
            provider,
            resolver,
            web_search: None,
            scraper: None,
            config: AskConfig::default(),
        }
    }

    /// Enable internet and hybrid web research.
    ///
    /// Without a scraper only search snippets are used.
    pub fn with_web(
        mut self,
        search: Arc<dyn WebSearch>,
        scraper: Option<Arc<dyn WebScrape>>,
    ) -> Self {
        self.web_search = Some(search);
        self.scraper = scraper;
        self
    }

    pub fn with_config(mut self, config: AskConfig) -> Self {
        self.config = config;
        self
    }

    /// Answer a question in the requested mode.
    #[instrument(skip(self, request), fields(
        subsystem = "ask",
        component = "pipeline",
        op = "ask",
        user_id = %request.user_id,
        mode = %request.mode,
    ))]
    pub async fn ask(&self, request: &AskRequest) -> Result<AskResponse> {
        let start = Instant::now();
        let question = request.question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question is empty".to_string()));
        }

        let (answer, sources) = match request.mode {
            AskMode::Memories => self.answer_memories(request, question).await?,
            AskMode::Internet => self.answer_internet(request.user_id, question).await?,
            AskMode::Hybrid => self.answer_hybrid(request, question).await?,
            AskMode::Llm => {
                let config = self.resolver.resolve(request.user_id).await?;
                (self.complete(&config, question).await?, Vec::new())
            }
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            source_count = sources.len(),
            duration_ms = elapsed_ms,
            "Ask completed"
        );
        Ok(AskResponse {
            answer,
            sources,
            mode: request.mode,
            elapsed_ms,
        })
    }

    async fn answer_memories(
        &self,
        request: &AskRequest,
        question: &str,
    ) -> Result<(String, Vec<Source>)> {
        let personal = self.memories_context(request, question).await;
        if personal.sources.is_empty() {
            return Ok((prompts::NO_MEMORIES_ANSWER.to_string(), Vec::new()));
        }
        let config = self.resolver.resolve(request.user_id).await?;
        let prompt = prompts::memories_prompt(question, &personal.context);
        Ok((self.complete(&config, &prompt).await?, personal.sources))
    }

    async fn answer_internet(&self, user_id: Uuid, question: &str) -> Result<(String, Vec<Source>)> {
        if self.web_search.is_none() {
            return Ok((prompts::WEB_NOT_CONFIGURED_ANSWER.to_string(), Vec::new()));
        }
        let web = self.web_context(&[question.to_string()]).await;
        if web.sources.is_empty() {
            return Ok((prompts::NO_WEB_RESULTS_ANSWER.to_string(), Vec::new()));
        }
        let config = self.resolver.resolve(user_id).await?;
        let prompt = prompts::internet_prompt(question, &web.context);
        Ok((self.complete(&config, &prompt).await?, web.sources))
    }

    /// Personal context, model-chosen web queries, then one tagged prompt.
    async fn answer_hybrid(
        &self,
        request: &AskRequest,
        question: &str,
    ) -> Result<(String, Vec<Source>)> {
        let personal = self.memories_context(request, question).await;
        let config = self.resolver.resolve(request.user_id).await?;

        let web = if self.web_search.is_some() {
            let queries = self
                .generate_queries(&config, question, &personal.context)
                .await?;
            self.web_context(&queries).await
        } else {
            debug!("Web search not configured, answering from personal data only");
            Gathered::default()
        };

        if personal.sources.is_empty() && web.sources.is_empty() {
            return Ok((prompts::NO_CONTEXT_ANSWER.to_string(), Vec::new()));
        }

        let context = prompts::tagged_context(&personal.context, &web.context);
        let prompt = prompts::hybrid_prompt(question, &context);
        let answer = self.complete(&config, &prompt).await?;

        let mut sources = personal.sources;
        merge_sources(&mut sources, web.sources);
        Ok((answer, sources))
    }

    /// Search the user's todos and memories.
    async fn memories_context(&self, request: &AskRequest, question: &str) -> Gathered {
        let content_types: Vec<ContentType> = ContentType::PERSONAL
            .into_iter()
            .filter(|t| request.content_types.is_empty() || request.content_types.contains(t))
            .collect();
        if content_types.is_empty() {
            return Gathered::default();
        }

        let search_request = SearchRequest::new(request.user_id, question)
            .with_limit(request.max_context.clamp(1, self.config.max_context_limit))
            .with_content_types(content_types);
        match self.search.search(&search_request).await {
            Ok(response) => Gathered {
                context: personal_context(&response.results),
                sources: response.results.iter().map(Source::from_result).collect(),
            },
            Err(e) => {
                warn!(error = %e, "Personal search failed, continuing without it");
                Gathered::default()
            }
        }
    }

    /// Ask the model for web queries, falling back to the question itself.
    async fn generate_queries(
        &self,
        config: &ProviderConfig,
        question: &str,
        personal_context: &str,
    ) -> Result<Vec<String>> {
        let prompt =
            prompts::query_generation_prompt(question, personal_context, self.config.max_queries);
        let response = self.complete(config, &prompt).await?;
        match parse_search_queries(&response, self.config.max_queries) {
            Ok(queries) => {
                debug!(query_count = queries.len(), "Generated web queries");
                Ok(queries)
            }
            Err(e) => {
                warn!(error = %e, "Query generation unparsable, searching the question");
                Ok(vec![question.to_string()])
            }
        }
    }

    /// Run every query concurrently and merge the pages, first URL wins.
    async fn web_context(&self, queries: &[String]) -> Gathered {
        let per_query = join_all(queries.iter().map(|q| self.web_pages(q))).await;

        let mut seen = HashSet::new();
        let pages: Vec<WebPage> = per_query
            .into_iter()
            .flatten()
            .filter(|p| !p.text.is_empty() && seen.insert(p.url.clone()))
            .collect();

        Gathered {
            context: web_context(&pages),
            sources: pages.iter().map(WebPage::source).collect(),
        }
    }

    /// Search one query and scrape its top results.
    async fn web_pages(&self, query: &str) -> Vec<WebPage> {
        let Some(web_search) = &self.web_search else {
            return Vec::new();
        };
        let start = Instant::now();
        let search = web_search.search(query, self.config.web_results);
        let results = match tokio::time::timeout(self.config.web_timeout, search).await {
            Ok(Ok(results)) => results,
            Ok(Err(e)) => {
                warn!(error = %e, "Web search failed, continuing without it");
                return Vec::new();
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.web_timeout.as_millis() as u64,
                    "Web search timed out, continuing without it"
                );
                return Vec::new();
            }
        };

        let pages = join_all(
            results
                .iter()
                .take(self.config.web_results)
                .map(|result| async move {
                    let page = self.scrape(&result.url).await;
                    WebPage::from_scrape(result, page, self.config.page_max_chars)
                }),
        )
        .await;

        debug!(
            result_count = pages.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Web retrieval complete"
        );
        pages
    }

    async fn scrape(&self, url: &str) -> Option<mnemo_core::ScrapedPage> {
        let scraper = self.scraper.as_ref()?;
        match tokio::time::timeout(self.config.web_timeout, scraper.fetch(url)).await {
            Ok(Ok(page)) => Some(page),
            Ok(Err(e)) => {
                warn!(url, error = %e, "Scrape failed, using search snippet");
                None
            }
            Err(_) => {
                warn!(url, "Scrape timed out, using search snippet");
                None
            }
        }
    }

    async fn complete(&self, config: &ProviderConfig, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let answer = self.provider.complete(config, prompt).await?;
        debug!(
            provider = %config.provider_type,
            model = %config.model,
            prompt_chars = prompt.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Completion received"
        );
        Ok(answer)
    }
}
