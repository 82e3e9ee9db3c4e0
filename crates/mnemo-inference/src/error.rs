//! Provider HTTP error classification.
//!
//! Every vendor adapter funnels non-success responses through
//! [`ProviderErrorCode::from_response`] so credential problems surface as
//! [`Error::Config`] and everything else as a provider or embedding failure.

use mnemo_core::Error;

/// Vendor-neutral error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorCode {
    /// Invalid authentication credentials.
    AuthenticationError,
    /// Rate limit exceeded.
    RateLimitExceeded,
    /// Model not found or not available.
    ModelNotFound,
    /// Request too large.
    ContextLengthExceeded,
    /// Server error.
    ServerError,
    /// Unknown error.
    Unknown,
}

impl ProviderErrorCode {
    /// Determine error code from HTTP status and the vendor's error type.
    pub fn from_response(status: u16, error_type: &str) -> Self {
        match (status, error_type) {
            (401 | 403, _) => Self::AuthenticationError,
            (_, "authentication_error" | "permission_error" | "PERMISSION_DENIED") => {
                Self::AuthenticationError
            }
            (429, _) => Self::RateLimitExceeded,
            (404, _) | (_, "model_not_found" | "not_found_error" | "NOT_FOUND") => {
                Self::ModelNotFound
            }
            (400, _) if error_type.contains("context_length") => Self::ContextLengthExceeded,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Whether the failure is a configuration problem rather than a
    /// transient provider failure.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::AuthenticationError | Self::ModelNotFound)
    }
}

/// Which call produced the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Embedding,
    Completion,
}

/// Convert a classified vendor error into a mnemo [`Error`].
pub fn to_mnemo_error(code: ProviderErrorCode, operation: Operation, message: &str) -> Error {
    let detail = match code {
        ProviderErrorCode::AuthenticationError => {
            return Error::Config(format!("Authentication failed: {}", message))
        }
        ProviderErrorCode::ModelNotFound => {
            return Error::Config(format!("Model not found: {}", message))
        }
        ProviderErrorCode::RateLimitExceeded => format!("Rate limit exceeded: {}", message),
        ProviderErrorCode::ContextLengthExceeded => format!("Context too long: {}", message),
        ProviderErrorCode::ServerError => format!("Server error: {}", message),
        ProviderErrorCode::Unknown => message.to_string(),
    };
    match operation {
        Operation::Embedding => Error::Embedding(detail),
        Operation::Completion => Error::Provider(detail),
    }
}

/// Read a non-success response and classify it.
///
/// `extract` pulls `(error_type, message)` out of the vendor's JSON body.
pub(crate) async fn error_from_response<F>(
    vendor: &str,
    response: reqwest::Response,
    operation: Operation,
    extract: F,
) -> Error
where
    F: FnOnce(&serde_json::Value) -> Option<(String, String)>,
{
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let (error_type, message) = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .as_ref()
        .and_then(extract)
        .unwrap_or_else(|| ("unknown".to_string(), truncate_body(&body)));
    let code = ProviderErrorCode::from_response(status.as_u16(), &error_type);
    to_mnemo_error(
        code,
        operation,
        &format!("{} returned {}: {}", vendor, status, message),
    )
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "Unknown error".to_string();
    }
    trimmed.chars().take(200).collect()
}
