//! Error type shared by every provider and the gateway.

use std::time::Duration;

use thiserror::Error;

use super::provider::ProviderKind;

/// HTTP statuses treated as transient network failures: rate limiting,
/// server errors, gateway errors and Anthropic's "overloaded".
const TRANSIENT_STATUSES: [u16; 6] = [429, 500, 502, 503, 504, 529];

/// Body-level API error codes that mean the upstream was unreachable.
const TRANSIENT_API_CODES: [u64; 2] = [502, 503];

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("read timeout after {0:?}")]
    ReadTimeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("response format error: {0}")]
    ResponseFormat(String),

    #[error("{provider} API HTTP {status}: {body}")]
    Http {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    #[error("{provider} API error {code}: {message}")]
    Api {
        provider: ProviderKind,
        code: String,
        message: String,
    },

    #[error("response truncated by the output token limit (finish reason: {0})")]
    Truncated(String),

    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("{0} environment variable is not set")]
    MissingApiKey(&'static str),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl GatewayError {
    /// Whether the failure is worth another attempt with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::ReadTimeout(_) | GatewayError::Network(_) | GatewayError::ResponseFormat(_)
        )
    }

    /// Short label used in retry log lines ("Read timeout, retrying...").
    pub fn retry_label(&self) -> &'static str {
        match self {
            GatewayError::ReadTimeout(_) => "Read timeout",
            GatewayError::Network(_) => "Network error",
            GatewayError::ResponseFormat(_) => "Response format error",
            _ => "Request failed",
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(provider: ProviderKind, status: u16, body: String) -> Self {
        if TRANSIENT_STATUSES.contains(&status) {
            GatewayError::Network(format!("{provider} API HTTP {status}: {body}"))
        } else {
            GatewayError::Http {
                provider,
                status,
                body,
            }
        }
    }

    /// Classify an error object embedded in an otherwise successful response.
    ///
    /// `code` may arrive as a number or a numeric string depending on the
    /// upstream that produced it.
    pub fn from_api_error(
        provider: ProviderKind,
        code: Option<&serde_json::Value>,
        message: String,
    ) -> Self {
        let numeric = code.and_then(|c| {
            c.as_u64()
                .or_else(|| c.as_str().and_then(|s| s.parse::<u64>().ok()))
        });
        if numeric.is_some_and(|n| TRANSIENT_API_CODES.contains(&n)) {
            return GatewayError::Network(message);
        }
        let code = match code {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "unknown".to_string(),
        };
        GatewayError::Api {
            provider,
            code,
            message,
        }
    }
}
