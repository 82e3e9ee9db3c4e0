//! Anthropic messages API adapter.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mnemo_core::{Error, ProviderConfig, Result};

use crate::error::{error_from_response, Operation};

/// API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Completion budget per request.
pub const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// Pull `(type, message)` out of an Anthropic error body.
fn extract_error(body: &serde_json::Value) -> Option<(String, String)> {
    let error = body.get("error")?;
    Some((
        error.get("type")?.as_str()?.to_string(),
        error.get("message")?.as_str()?.to_string(),
    ))
}

/// Send `prompt` as a single user turn and return the concatenated text
/// blocks of the reply.
pub async fn messages(client: &Client, config: &ProviderConfig, prompt: &str) -> Result<String> {
    let url = format!("{}/messages", config.base_url.trim_end_matches('/'));
    debug!(
        subsystem = "inference",
        component = "anthropic",
        op = "complete",
        model = %config.model,
        prompt_len = prompt.len(),
        "Messages request"
    );

    let request = MessagesRequest {
        model: &config.model,
        max_tokens: MAX_TOKENS,
        messages: vec![Message {
            role: "user",
            content: prompt,
        }],
    };

    let mut req = client
        .post(&url)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .header("Content-Type", "application/json")
        .json(&request);
    if let Some(ref api_key) = config.api_key {
        req = req.header("x-api-key", api_key);
    }

    let response = req
        .send()
        .await
        .map_err(|e| Error::Provider(format!("Request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(
            error_from_response("Anthropic", response, Operation::Completion, extract_error).await,
        );
    }

    let result: MessagesResponse = response
        .json()
        .await
        .map_err(|e| Error::Provider(format!("Failed to parse response: {}", e)))?;

    let text: Vec<String> = result
        .content
        .into_iter()
        .filter(|b| b.block_type == "text")
        .filter_map(|b| b.text)
        .collect();
    if text.is_empty() {
        return Err(Error::Provider(
            "Anthropic returned no text content".to_string(),
        ));
    }
    Ok(text.join(""))
}
