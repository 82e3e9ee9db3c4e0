//! Google generateContent API adapter.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mnemo_core::{Error, ProviderConfig, Result};

use crate::error::{error_from_response, Operation};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<PartIn<'a>>,
}

#[derive(Debug, Serialize)]
struct PartIn<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartOut>,
}

#[derive(Debug, Deserialize)]
struct PartOut {
    #[serde(default)]
    text: Option<String>,
}

/// Pull `(status, message)` out of a Google error body.
fn extract_error(body: &serde_json::Value) -> Option<(String, String)> {
    let error = body.get("error")?;
    let message = error.get("message")?.as_str()?.to_string();
    let status = error
        .get("status")
        .and_then(|s| s.as_str())
        .unwrap_or("UNKNOWN")
        .to_string();
    Some((status, message))
}

/// Send `prompt` as a single user turn and return the first candidate's text.
pub async fn generate_content(
    client: &Client,
    config: &ProviderConfig,
    prompt: &str,
) -> Result<String> {
    let url = format!(
        "{}/models/{}:generateContent",
        config.base_url.trim_end_matches('/'),
        config.model
    );
    debug!(
        subsystem = "inference",
        component = "gemini",
        op = "complete",
        model = %config.model,
        prompt_len = prompt.len(),
        "generateContent request"
    );

    let request = GenerateRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![PartIn { text: prompt }],
        }],
    };

    let mut req = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(&request);
    if let Some(ref api_key) = config.api_key {
        req = req.header("x-goog-api-key", api_key);
    }

    let response = req
        .send()
        .await
        .map_err(|e| Error::Provider(format!("Request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(
            error_from_response("Google", response, Operation::Completion, extract_error).await,
        );
    }

    let result: GenerateResponse = response
        .json()
        .await
        .map_err(|e| Error::Provider(format!("Failed to parse response: {}", e)))?;

    let text: String = result
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(Error::Provider("Google returned no candidates".to_string()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![PartIn { text: "hello" }],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_extract_error() {
        let body = serde_json::json!({
            "error": {"code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED"}
        });
        let (status, message) = extract_error(&body).unwrap();
        assert_eq!(status, "PERMISSION_DENIED");
        assert_eq!(message, "API key not valid");
    }
}
