//! Wiring of the Postgres adapters, embedder, cache, search and ask.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use mnemo_ask::{AskConfig, AskPipeline, HttpScraper, SearxngSearch};
use mnemo_core::Embedder;
use mnemo_db::{Database, PgVectorIndex, PoolConfig};
use mnemo_inference::{EmbeddingClient, ProviderClient, ProviderResolver};
use mnemo_search::{HybridSearchConfig, HybridSearchEngine, Indexer, RedisSearchCache};

pub struct App {
    pub db: Database,
    pub vector: Arc<PgVectorIndex>,
    pub cache: Arc<RedisSearchCache>,
    pub engine: Arc<HybridSearchEngine>,
    pub indexer: Indexer,
}

impl App {
    /// Connect everything configured in the environment.
    pub async fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let db = Database::connect(&database_url, PoolConfig::from_env())
            .await
            .context("connecting to the database")?;
        db.migrate().await.context("running migrations")?;

        let embedder: Arc<dyn Embedder> =
            Arc::new(EmbeddingClient::from_env().context("configuring the embedding backend")?);
        let vector = Arc::new(db.vector_index(embedder).await?);
        let cache = Arc::new(RedisSearchCache::from_env().await);

        let content = Arc::new(db.content.clone());
        let engine = Arc::new(
            HybridSearchEngine::new(vector.clone(), Arc::new(db.keyword.clone()), content.clone())
                .with_cache(cache.clone())
                .with_config(HybridSearchConfig::from_env()),
        );
        let indexer = Indexer::new(vector.clone(), content).with_cache(cache.clone());

        info!(
            subsystem = "cli",
            component = "app",
            cache_connected = cache.is_connected().await,
            "Application wired"
        );
        Ok(Self {
            db,
            vector,
            cache,
            engine,
            indexer,
        })
    }

    /// Ask pipeline with web research when `WEB_SEARCH_URL` is set.
    pub fn ask_pipeline(&self) -> anyhow::Result<AskPipeline> {
        let provider = Arc::new(ProviderClient::new()?);
        let resolver = ProviderResolver::from_env(Some(Arc::new(self.db.settings.clone())))
            .context("reading AI provider configuration")?;
        let mut pipeline = AskPipeline::new(self.engine.clone(), provider, resolver)
            .with_config(AskConfig::from_env());
        if let Some(search) = SearxngSearch::from_env()? {
            pipeline = pipeline.with_web(Arc::new(search), Some(Arc::new(HttpScraper::new()?)));
        }
        Ok(pipeline)
    }
}
