//! Completion adapters against mock vendor endpoints.

use mnemo_core::{AiProvider, Error, ProviderConfig, ProviderType};
use mnemo_inference::ProviderClient;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(provider_type: ProviderType, server: &MockServer, model: &str) -> ProviderConfig {
    ProviderConfig {
        provider_type,
        base_url: server.uri(),
        api_key: Some("test-key".to_string()),
        model: model.to_string(),
    }
}

#[tokio::test]
async fn test_openai_chat_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o-mini",
            "messages": [{"role": "user", "content": "What is due today?"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-123",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Renew your passport."},
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ProviderClient::new().unwrap();
    let answer = client
        .complete(
            &config(ProviderType::OpenAI, &server, "gpt-4o-mini"),
            "What is due today?",
        )
        .await
        .unwrap();
    assert_eq!(answer, "Renew your passport.");
}

#[tokio::test]
async fn test_anthropic_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "Hello from Claude"}],
            "stop_reason": "end_turn"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ProviderClient::new().unwrap();
    let answer = client
        .complete(
            &config(ProviderType::Anthropic, &server, "claude-sonnet-4-5"),
            "hi",
        )
        .await
        .unwrap();
    assert_eq!(answer, "Hello from Claude");
}

#[tokio::test]
async fn test_gemini_generate_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Hello "}, {"text": "from Gemini"}]}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ProviderClient::new().unwrap();
    let answer = client
        .complete(
            &config(ProviderType::Google, &server, "gemini-2.0-flash"),
            "hi",
        )
        .await
        .unwrap();
    assert_eq!(answer, "Hello from Gemini");
}

#[tokio::test]
async fn test_anthropic_auth_failure_is_config_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        })))
        .mount(&server)
        .await;

    let err = ProviderClient::new()
        .unwrap()
        .complete(
            &config(ProviderType::Anthropic, &server, "claude-sonnet-4-5"),
            "hi",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_server_error_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "error": {"message": "overloaded", "type": "server_error"}
        })))
        .mount(&server)
        .await;

    let err = ProviderClient::new()
        .unwrap()
        .complete(&config(ProviderType::OpenAI, &server, "gpt-4o-mini"), "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Provider(_)), "got {:?}", err);
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_empty_choices_is_provider_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
        )
        .mount(&server)
        .await;

    let err = ProviderClient::new()
        .unwrap()
        .complete(&config(ProviderType::OpenAI, &server, "gpt-4o-mini"), "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Provider(_)));
}
