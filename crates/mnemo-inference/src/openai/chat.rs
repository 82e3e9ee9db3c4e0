//! OpenAI-style chat completions (also Ollama, OpenRouter, vLLM).

use reqwest::Client;
use tracing::debug;

use mnemo_core::{Error, ProviderConfig, Result};

use super::types::*;
use crate::error::{error_from_response, Operation};

/// Send `prompt` as a single user message and return the reply text.
pub async fn chat_completion(
    client: &Client,
    config: &ProviderConfig,
    prompt: &str,
) -> Result<String> {
    let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
    debug!(
        subsystem = "inference",
        component = "openai",
        op = "complete",
        model = %config.model,
        prompt_len = prompt.len(),
        "Chat completion"
    );

    let request = ChatCompletionRequest {
        model: config.model.clone(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: Some(prompt.to_string()),
        }],
        temperature: None,
        max_tokens: None,
    };

    let mut req = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(&request);
    if let Some(ref api_key) = config.api_key {
        req = req.header("Authorization", format!("Bearer {}", api_key));
    }

    let response = req
        .send()
        .await
        .map_err(|e| Error::Provider(format!("Request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(
            error_from_response("OpenAI", response, Operation::Completion, extract_error).await,
        );
    }

    let result: ChatCompletionResponse = response
        .json()
        .await
        .map_err(|e| Error::Provider(format!("Failed to parse response: {}", e)))?;

    result
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Error::Provider("OpenAI returned no choices".to_string()))
}
