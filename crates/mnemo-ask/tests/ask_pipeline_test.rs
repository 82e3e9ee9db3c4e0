//! Ask pipeline behaviour per mode, over an in-memory search stack with
//! scripted web collaborators and a mock provider.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use mnemo_ask::prompts::{
    NO_CONTEXT_ANSWER, NO_MEMORIES_ANSWER, NO_WEB_RESULTS_ANSWER, WEB_NOT_CONFIGURED_ANSWER,
};
use mnemo_ask::AskPipeline;
use mnemo_core::{
    AskMode, AskRequest, ContentType, Document, Error, Memory, ProviderConfig, ProviderType,
    Result, ScrapedPage, VectorIndex, WebResult, WebScrape, WebSearch,
};
use mnemo_inference::mock::{MockEmbeddingBackend, MockProvider};
use mnemo_inference::{EmbeddingClient, ProviderResolver, RateLimiter};
use mnemo_search::{HybridSearchEngine, MemoryContentStore, MemoryVectorIndex};
use uuid::Uuid;

/// Web search returning the same canned results for every query.
#[derive(Default)]
struct ScriptedSearch {
    results: Vec<WebResult>,
    fail: bool,
    queries: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    fn with_results(results: Vec<WebResult>) -> Self {
        Self {
            results,
            ..Default::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebSearch for ScriptedSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebResult>> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(Error::Retrieval("search backend down".to_string()));
        }
        Ok(self.results.iter().take(limit).cloned().collect())
    }
}

/// Scraper serving fixed pages by URL; unknown URLs fail.
#[derive(Default)]
struct ScriptedScraper {
    pages: HashMap<String, ScrapedPage>,
}

impl ScriptedScraper {
    fn with_page(mut self, url: &str, title: &str, content: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            ScrapedPage {
                title: title.to_string(),
                content: content.to_string(),
            },
        );
        self
    }
}

#[async_trait]
impl WebScrape for ScriptedScraper {
    async fn fetch(&self, url: &str) -> Result<ScrapedPage> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Retrieval(format!("fetching {} returned HTTP 503", url)))
    }
}

fn web_result(n: usize) -> WebResult {
    WebResult {
        title: format!("Result {}", n),
        url: format!("https://example.com/{}", n),
        snippet: format!("Snippet for result {}", n),
    }
}

fn provider_config() -> ProviderConfig {
    ProviderConfig {
        provider_type: ProviderType::OpenAI,
        base_url: "http://localhost:11434/v1".to_string(),
        api_key: None,
        model: "test-model".to_string(),
    }
}

struct Harness {
    store: Arc<MemoryContentStore>,
    index: Arc<MemoryVectorIndex>,
    engine: Arc<HybridSearchEngine>,
}

impl Harness {
    fn new() -> Self {
        let embedder = Arc::new(EmbeddingClient::new(
            Arc::new(MockEmbeddingBackend::new()),
            Arc::new(RateLimiter::unlimited()),
        ));
        let store = Arc::new(MemoryContentStore::new());
        let index = Arc::new(MemoryVectorIndex::new(embedder));
        let engine = Arc::new(HybridSearchEngine::new(
            index.clone(),
            store.clone(),
            store.clone(),
        ));
        Self {
            store,
            index,
            engine,
        }
    }

    async fn add_memory(&self, user_id: Uuid, title: &str, content: &str) -> Memory {
        let m = Memory {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            content: content.to_string(),
            category: None,
            tags: Vec::new(),
            created_at: Utc::now(),
        };
        self.store.upsert_memory(m.clone()).await;
        self.index.add(&Document::from(m.clone())).await.unwrap();
        m
    }

    fn pipeline(&self, provider: &MockProvider) -> AskPipeline {
        AskPipeline::new(
            self.engine.clone(),
            Arc::new(provider.clone()),
            ProviderResolver::fixed(provider_config()),
        )
    }
}

#[tokio::test]
async fn test_memories_without_matches_returns_canned_answer() {
    let harness = Harness::new();
    let provider = MockProvider::new();
    let alice = Uuid::new_v4();

    let response = harness
        .pipeline(&provider)
        .ask(&AskRequest::new(alice, "passport renewal", AskMode::Memories))
        .await
        .unwrap();

    assert_eq!(response.answer, NO_MEMORIES_ANSWER);
    assert!(response.sources.is_empty());
    assert_eq!(response.mode, AskMode::Memories);
    assert!(provider.prompts().is_empty());
}

#[tokio::test]
async fn test_memories_canned_answer_needs_no_provider() {
    let harness = Harness::new();
    let pipeline = AskPipeline::new(
        harness.engine.clone(),
        Arc::new(MockProvider::new()),
        ProviderResolver::new(None, None),
    );

    let response = pipeline
        .ask(&AskRequest::new(
            Uuid::new_v4(),
            "passport renewal",
            AskMode::Memories,
        ))
        .await
        .unwrap();
    assert_eq!(response.answer, NO_MEMORIES_ANSWER);
}

#[tokio::test]
async fn test_memories_answer_uses_personal_context() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    let m = harness
        .add_memory(
            alice,
            "Passport renewal",
            "Passport renewal form is in the blue folder",
        )
        .await;
    let provider = MockProvider::new().with_default_response("It's in the blue folder.");

    let response = harness
        .pipeline(&provider)
        .ask(&AskRequest::new(alice, "passport renewal", AskMode::Memories))
        .await
        .unwrap();

    assert_eq!(response.answer, "It's in the blue folder.");
    assert_eq!(response.sources.len(), 1);
    assert_eq!(response.sources[0].content_id, Some(m.id));
    assert_eq!(response.sources[0].content_type, ContentType::Memory);

    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("blue folder"));
    assert!(prompts[0].contains("Question: passport renewal"));
}

#[tokio::test]
async fn test_memories_respects_content_type_filter() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    harness
        .add_memory(alice, "Passport renewal", "Passport renewal form is in the folder")
        .await;
    let provider = MockProvider::new();

    let request = AskRequest::new(alice, "passport renewal", AskMode::Memories)
        .with_content_types(vec![ContentType::Todo]);
    let response = harness.pipeline(&provider).ask(&request).await.unwrap();
    assert_eq!(response.answer, NO_MEMORIES_ANSWER);
}

#[tokio::test]
async fn test_hybrid_unparsable_queries_searches_question_once() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    let provider = MockProvider::new().with_default_response("I would look up passport fees.");
    let search = Arc::new(ScriptedSearch::with_results(vec![web_result(1)]));

    let response = harness
        .pipeline(&provider)
        .with_web(search.clone(), None)
        .ask(&AskRequest::new(
            alice,
            "how much does passport renewal cost",
            AskMode::Hybrid,
        ))
        .await
        .unwrap();

    assert_eq!(search.queries(), vec!["how much does passport renewal cost"]);
    assert_eq!(response.sources.len(), 1);
    assert_eq!(
        response.sources[0].url.as_deref(),
        Some("https://example.com/1")
    );
    // Query generation plus the final answer.
    assert_eq!(provider.prompts().len(), 2);
}

#[tokio::test]
async fn test_hybrid_runs_generated_queries_and_tags_context() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    harness
        .add_memory(alice, "Passport renewal", "Passport renewal appointment on May 3")
        .await;
    let provider = MockProvider::new()
        .with_response(
            "JSON array of strings",
            r#"["passport fees", "consulate hours", "renewal photo rules", "extra query"]"#,
        )
        .with_default_response("Bring two photos and $130.");
    let search = Arc::new(ScriptedSearch::with_results(vec![
        web_result(1),
        web_result(2),
    ]));
    let scraper = Arc::new(
        ScriptedScraper::default().with_page(
            "https://example.com/1",
            "Fees",
            "Adult renewal costs $130.",
        ),
    );

    let response = harness
        .pipeline(&provider)
        .with_web(search.clone(), Some(scraper))
        .ask(&AskRequest::new(alice, "passport renewal", AskMode::Hybrid))
        .await
        .unwrap();

    assert_eq!(response.answer, "Bring two photos and $130.");
    assert_eq!(search.queries().len(), 3);

    // One personal source, two web pages deduplicated across queries.
    assert_eq!(response.sources.len(), 3);
    assert_eq!(response.sources[0].content_type, ContentType::Memory);
    let web: Vec<_> = response
        .sources
        .iter()
        .filter(|s| s.content_type == ContentType::Web)
        .collect();
    assert_eq!(web.len(), 2);

    let prompts = provider.prompts();
    let final_prompt = prompts.last().unwrap();
    assert!(final_prompt.contains("=== YOUR DATA ==="));
    assert!(final_prompt.contains("appointment on May 3"));
    assert!(final_prompt.contains("=== WEB RESEARCH ==="));
    assert!(final_prompt.contains("Adult renewal costs $130."));
    assert!(final_prompt.contains("Snippet for result 2"));
}

#[tokio::test]
async fn test_hybrid_without_any_context_returns_canned_answer() {
    let harness = Harness::new();
    let provider = MockProvider::new().with_default_response(r#"["passport fees"]"#);
    let search = Arc::new(ScriptedSearch::failing());

    let response = harness
        .pipeline(&provider)
        .with_web(search, None)
        .ask(&AskRequest::new(
            Uuid::new_v4(),
            "passport renewal",
            AskMode::Hybrid,
        ))
        .await
        .unwrap();

    assert_eq!(response.answer, NO_CONTEXT_ANSWER);
    assert!(response.sources.is_empty());
}

#[tokio::test]
async fn test_hybrid_without_web_uses_personal_data() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    harness
        .add_memory(alice, "Passport renewal", "Passport renewal appointment on May 3")
        .await;
    let provider = MockProvider::new().with_default_response("May 3.");

    let response = harness
        .pipeline(&provider)
        .ask(&AskRequest::new(alice, "passport renewal", AskMode::Hybrid))
        .await
        .unwrap();

    assert_eq!(response.answer, "May 3.");
    assert_eq!(response.sources.len(), 1);
    // No query generation without a web client.
    assert_eq!(provider.prompts().len(), 1);
}

#[tokio::test]
async fn test_provider_failure_is_an_error() {
    let harness = Harness::new();
    let alice = Uuid::new_v4();
    harness
        .add_memory(alice, "Passport renewal", "Passport renewal appointment on May 3")
        .await;
    let provider = MockProvider::new().failing();

    for mode in [AskMode::Memories, AskMode::Hybrid, AskMode::Llm] {
        let err = harness
            .pipeline(&provider)
            .ask(&AskRequest::new(alice, "passport renewal", mode))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Provider(_)), "mode {}", mode);
    }
}

#[tokio::test]
async fn test_llm_mode_sends_question_directly() {
    let harness = Harness::new();
    let provider = MockProvider::new().with_default_response("Paris.");

    let response = harness
        .pipeline(&provider)
        .ask(&AskRequest::new(
            Uuid::new_v4(),
            "  What is the capital of France?  ",
            AskMode::Llm,
        ))
        .await
        .unwrap();

    assert_eq!(response.answer, "Paris.");
    assert!(response.sources.is_empty());
    assert_eq!(provider.prompts(), vec!["What is the capital of France?"]);
    assert_eq!(provider.model_counts().get("test-model"), Some(&1));
}

#[tokio::test]
async fn test_llm_mode_without_provider_is_config_error() {
    let harness = Harness::new();
    let pipeline = AskPipeline::new(
        harness.engine.clone(),
        Arc::new(MockProvider::new()),
        ProviderResolver::new(None, None),
    );

    let err = pipeline
        .ask(&AskRequest::new(Uuid::new_v4(), "hello there", AskMode::Llm))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_internet_without_web_search_configured() {
    let harness = Harness::new();
    let provider = MockProvider::new();

    let response = harness
        .pipeline(&provider)
        .ask(&AskRequest::new(
            Uuid::new_v4(),
            "passport renewal",
            AskMode::Internet,
        ))
        .await
        .unwrap();

    assert_eq!(response.answer, WEB_NOT_CONFIGURED_ANSWER);
    assert!(provider.prompts().is_empty());
}

#[tokio::test]
async fn test_internet_scrape_failure_falls_back_to_snippet() {
    let harness = Harness::new();
    let provider = MockProvider::new().with_default_response("About $130.");
    let search = Arc::new(ScriptedSearch::with_results(vec![
        web_result(1),
        web_result(2),
        web_result(3),
    ]));
    let scraper = Arc::new(ScriptedScraper::default().with_page(
        "https://example.com/1",
        "Fees page",
        "Adult renewal costs $130.",
    ));

    let response = harness
        .pipeline(&provider)
        .with_web(search, Some(scraper))
        .ask(&AskRequest::new(
            Uuid::new_v4(),
            "passport renewal cost",
            AskMode::Internet,
        ))
        .await
        .unwrap();

    assert_eq!(response.answer, "About $130.");
    // Only the top two results are used.
    assert_eq!(response.sources.len(), 2);
    assert_eq!(response.sources[0].title, "Fees page");

    let prompt = &provider.prompts()[0];
    assert!(prompt.contains("Adult renewal costs $130."));
    assert!(prompt.contains("Snippet for result 2"));
    assert!(!prompt.contains("Snippet for result 3"));
}

#[tokio::test]
async fn test_internet_search_failure_gives_no_results_answer() {
    let harness = Harness::new();
    let provider = MockProvider::new();

    let response = harness
        .pipeline(&provider)
        .with_web(Arc::new(ScriptedSearch::failing()), None)
        .ask(&AskRequest::new(
            Uuid::new_v4(),
            "passport renewal",
            AskMode::Internet,
        ))
        .await
        .unwrap();

    assert_eq!(response.answer, NO_WEB_RESULTS_ANSWER);
    assert!(response.sources.is_empty());
    assert!(provider.prompts().is_empty());
}

#[tokio::test]
async fn test_empty_question_rejected() {
    let harness = Harness::new();
    let err = harness
        .pipeline(&MockProvider::new())
        .ask(&AskRequest::new(Uuid::new_v4(), "   ", AskMode::Llm))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}
