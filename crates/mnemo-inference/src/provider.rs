//! AI provider abstraction: vendor dispatch and provider selection.
//!
//! [`ProviderClient`] turns a [`ProviderConfig`] plus a prompt into text by
//! dispatching on the vendor family. [`ProviderResolver`] picks the config
//! for a user:
//!
//! ```text
//! user's default provider (ProviderSettings)
//!   -> environment fallback (AI_PROVIDER, AI_BASE_URL, AI_API_KEY, AI_MODEL)
//!   -> Error::Config("no AI provider configured")
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mnemo_core::{
    defaults, AiProvider, Error, ProviderConfig, ProviderSettings, ProviderType, Result,
};

use crate::{anthropic, gemini, openai};

/// Default completion model per vendor.
pub fn default_model(provider_type: ProviderType) -> &'static str {
    match provider_type {
        ProviderType::OpenAI => "gpt-4o-mini",
        ProviderType::Anthropic => "claude-sonnet-4-5",
        ProviderType::Google => "gemini-2.0-flash",
    }
}

/// HTTP completion client for every supported vendor.
#[derive(Clone)]
pub struct ProviderClient {
    client: Client,
}

impl ProviderClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(defaults::PROVIDER_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AiProvider for ProviderClient {
    async fn complete(&self, config: &ProviderConfig, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let result = match config.provider_type {
            ProviderType::OpenAI => openai::chat_completion(&self.client, config, prompt).await,
            ProviderType::Anthropic => anthropic::messages(&self.client, config, prompt).await,
            ProviderType::Google => gemini::generate_content(&self.client, config, prompt).await,
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(text) => info!(
                subsystem = "inference",
                component = "provider",
                op = "complete",
                provider = %config.provider_type,
                model = %config.model,
                response_len = text.len(),
                duration_ms,
                "Completion finished"
            ),
            Err(e) => warn!(
                subsystem = "inference",
                component = "provider",
                op = "complete",
                provider = %config.provider_type,
                model = %config.model,
                duration_ms,
                error = %e,
                "Completion failed"
            ),
        }
        result
    }
}

/// Read the environment fallback provider.
///
/// Returns `Ok(None)` when `AI_PROVIDER` is unset or empty and
/// `Err(Error::Config)` when it names an unknown vendor.
pub fn provider_config_from_env() -> Result<Option<ProviderConfig>> {
    let provider = match std::env::var("AI_PROVIDER") {
        Ok(p) if !p.trim().is_empty() => p,
        _ => return Ok(None),
    };
    let provider_type: ProviderType = provider.parse().map_err(Error::Config)?;
    Ok(Some(ProviderConfig {
        provider_type,
        base_url: std::env::var("AI_BASE_URL")
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| provider_type.default_base_url().to_string()),
        api_key: std::env::var("AI_API_KEY").ok().filter(|k| !k.is_empty()),
        model: std::env::var("AI_MODEL")
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_model(provider_type).to_string()),
    }))
}

/// Picks the provider configuration for a user.
#[derive(Clone, Default)]
pub struct ProviderResolver {
    settings: Option<Arc<dyn ProviderSettings>>,
    fallback: Option<ProviderConfig>,
}

impl ProviderResolver {
    pub fn new(
        settings: Option<Arc<dyn ProviderSettings>>,
        fallback: Option<ProviderConfig>,
    ) -> Self {
        Self { settings, fallback }
    }

    /// Resolver with the environment fallback.
    pub fn from_env(settings: Option<Arc<dyn ProviderSettings>>) -> Result<Self> {
        Ok(Self::new(settings, provider_config_from_env()?))
    }

    /// Resolver that always returns `config`.
    pub fn fixed(config: ProviderConfig) -> Self {
        Self::new(None, Some(config))
    }

    /// Resolve the provider for `user_id`.
    ///
    /// A failing settings lookup is logged and treated like "no preference".
    pub async fn resolve(&self, user_id: Uuid) -> Result<ProviderConfig> {
        if let Some(ref settings) = self.settings {
            match settings.default_provider(user_id).await {
                Ok(Some(config)) => {
                    debug!(
                        subsystem = "inference",
                        component = "provider",
                        provider = %config.provider_type,
                        source = "user_settings",
                        "Resolved AI provider"
                    );
                    return Ok(config);
                }
                Ok(None) => {}
                Err(e) => warn!(
                    subsystem = "inference",
                    component = "provider",
                    error = %e,
                    "Provider settings lookup failed, using fallback"
                ),
            }
        }
        match self.fallback {
            Some(ref config) => {
                debug!(
                    subsystem = "inference",
                    component = "provider",
                    provider = %config.provider_type,
                    source = "environment",
                    "Resolved AI provider"
                );
                Ok(config.clone())
            }
            None => Err(Error::Config("no AI provider configured".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSettings(Option<ProviderConfig>);

    #[async_trait]
    impl ProviderSettings for FixedSettings {
        async fn default_provider(&self, _user_id: Uuid) -> Result<Option<ProviderConfig>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSettings;

    #[async_trait]
    impl ProviderSettings for BrokenSettings {
        async fn default_provider(&self, _user_id: Uuid) -> Result<Option<ProviderConfig>> {
            Err(Error::Internal("settings table missing".to_string()))
        }
    }

    fn config(provider_type: ProviderType, model: &str) -> ProviderConfig {
        ProviderConfig {
            provider_type,
            base_url: provider_type.default_base_url().to_string(),
            api_key: Some("key".to_string()),
            model: model.to_string(),
        }
    }

    #[tokio::test]
    async fn test_user_default_wins_over_fallback() {
        let resolver = ProviderResolver::new(
            Some(Arc::new(FixedSettings(Some(config(
                ProviderType::Anthropic,
                "claude-sonnet-4-5",
            ))))),
            Some(config(ProviderType::OpenAI, "gpt-4o-mini")),
        );
        let resolved = resolver.resolve(Uuid::new_v4()).await.unwrap();
        assert_eq!(resolved.provider_type, ProviderType::Anthropic);
    }

    #[tokio::test]
    async fn test_fallback_used_without_user_default() {
        let resolver = ProviderResolver::new(
            Some(Arc::new(FixedSettings(None))),
            Some(config(ProviderType::Google, "gemini-2.0-flash")),
        );
        let resolved = resolver.resolve(Uuid::new_v4()).await.unwrap();
        assert_eq!(resolved.provider_type, ProviderType::Google);
    }

    #[tokio::test]
    async fn test_settings_error_falls_back() {
        let resolver = ProviderResolver::new(
            Some(Arc::new(BrokenSettings)),
            Some(config(ProviderType::OpenAI, "gpt-4o-mini")),
        );
        assert!(resolver.resolve(Uuid::new_v4()).await.is_ok());
    }

    #[tokio::test]
    async fn test_nothing_configured_is_config_error() {
        let resolver = ProviderResolver::default();
        let err = resolver.resolve(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(
            err.to_string(),
            "Configuration error: no AI provider configured"
        );
    }

    #[test]
    fn test_default_models() {
        assert_eq!(default_model(ProviderType::OpenAI), "gpt-4o-mini");
        assert!(default_model(ProviderType::Anthropic).starts_with("claude"));
        assert!(default_model(ProviderType::Google).starts_with("gemini"));
    }
}
