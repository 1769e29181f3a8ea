//! Anthropic messages provider, including the token counting endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::GatewayError;
use super::http;
use super::provider::{
    Completion, CompletionFuture, CompletionProvider, CompletionRequest, FinishReason,
    ProviderKind, TokenUsage,
};
use crate::context::budget::num_tokens_from_messages;
use crate::{ANTHROPIC_COUNT_TOKENS_URL, ANTHROPIC_URL, ANTHROPIC_VERSION, Message, MessageRole};

/// Timeout for the token counting call, which is never retried.
const COUNT_TOKENS_TIMEOUT: Duration = Duration::from_secs(30);

// ── Wire types ─────────────────────────────────────────────────────

#[derive(Serialize, Debug)]
struct WireMessage<'a> {
    role: MessageRole,
    content: &'a str,
}

#[derive(Serialize, Debug)]
struct MessagesRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Debug)]
struct CountTokensRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Deserialize, Debug)]
struct RawMessagesResponse {
    content: Option<Vec<RawContentBlock>>,
    stop_reason: Option<String>,
    usage: Option<RawUsage>,
    error: Option<RawApiError>,
}

#[derive(Deserialize, Debug)]
struct RawContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct RawApiError {
    #[serde(rename = "type")]
    error_type: Option<serde_json::Value>,
    message: String,
}

#[derive(Deserialize, Debug)]
struct RawCountTokensResponse {
    input_tokens: usize,
}

/// Split the conversation into Anthropic's shape: the first system message
/// becomes the top-level `system` field, everything else stays in order.
fn split_system(messages: &[Message]) -> (Option<&str>, Vec<WireMessage<'_>>) {
    let system = messages
        .iter()
        .find(|m| m.is_system())
        .map(|m| m.content.as_str());
    let rest = messages
        .iter()
        .filter(|m| !m.is_system())
        .map(|m| WireMessage {
            role: m.role,
            content: &m.content,
        })
        .collect();
    (system, rest)
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the Anthropic messages API.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    messages_url: String,
    count_tokens_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, GatewayError> {
        Self::with_urls(api_key, ANTHROPIC_URL, ANTHROPIC_COUNT_TOKENS_URL)
    }

    /// Point the client at different endpoints (proxies, test servers).
    pub fn with_urls(
        api_key: impl Into<String>,
        messages_url: impl Into<String>,
        count_tokens_url: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            client: http::build_client()?,
            api_key: api_key.into(),
            messages_url: messages_url.into(),
            count_tokens_url: count_tokens_url.into(),
        })
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> Result<Completion, GatewayError> {
        let (system, messages) = split_system(&request.messages);
        let body = MessagesRequest {
            model: &request.model,
            system,
            messages,
            max_tokens: request.max_output_tokens,
            temperature: request.temperature,
        };
        debug!(
            "Anthropic request: model={}, messages={}, max_tokens={}, temp={}, timeout={:?}",
            body.model,
            body.messages.len(),
            body.max_tokens,
            body.temperature,
            timeout,
        );

        let (status, text) = http::send(self.post(&self.messages_url).json(&body), timeout).await?;
        if !(200..300).contains(&status) {
            return Err(GatewayError::from_status(
                ProviderKind::Anthropic,
                status,
                text,
            ));
        }
        parse_response(&text)
    }

    async fn count(&self, request: &CompletionRequest) -> Result<usize, GatewayError> {
        let (system, messages) = split_system(&request.messages);
        let body = CountTokensRequest {
            model: &request.model,
            system,
            messages,
        };
        let (status, text) = http::send(
            self.post(&self.count_tokens_url).json(&body),
            COUNT_TOKENS_TIMEOUT,
        )
        .await?;
        if !(200..300).contains(&status) {
            return Err(GatewayError::from_status(
                ProviderKind::Anthropic,
                status,
                text,
            ));
        }
        let parsed: RawCountTokensResponse = serde_json::from_str(&text).map_err(|e| {
            GatewayError::ResponseFormat(format!("failed to parse token count: {e}"))
        })?;
        Ok(parsed.input_tokens)
    }
}

/// Turn a 2xx body into a [`Completion`].
fn parse_response(text: &str) -> Result<Completion, GatewayError> {
    let parsed: RawMessagesResponse = serde_json::from_str(text)
        .map_err(|e| GatewayError::ResponseFormat(format!("failed to parse response: {e}")))?;

    if let Some(err) = parsed.error {
        return Err(GatewayError::from_api_error(
            ProviderKind::Anthropic,
            err.error_type.as_ref(),
            err.message,
        ));
    }

    let content = parsed
        .content
        .unwrap_or_default()
        .into_iter()
        .find(|b| b.block_type == "text")
        .and_then(|b| b.text)
        .ok_or_else(|| GatewayError::ResponseFormat("response has no text block".into()))?;

    let usage = parsed.usage.map(|u| TokenUsage {
        input_tokens: u.input_tokens.unwrap_or(0),
        output_tokens: u.output_tokens.unwrap_or(0),
    });

    Ok(Completion {
        content,
        finish_reason: FinishReason::from_anthropic(parsed.stop_reason.as_deref()),
        usage,
    })
}

impl CompletionProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
        timeout: Duration,
    ) -> CompletionFuture<'a, Completion> {
        Box::pin(self.send(request, timeout))
    }

    fn count_input_tokens<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> CompletionFuture<'a, usize> {
        Box::pin(async move {
            match self.count(request).await {
                Ok(n) => Ok(n),
                Err(e) => {
                    warn!("Token counting endpoint failed ({e}); using local estimate");
                    Ok(num_tokens_from_messages(&request.messages, &request.model))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_message_lifted_out() {
        let messages = vec![
            Message::system("be an agent"),
            Message::user("obs 1"),
            Message::assistant_text("3"),
            Message::user("obs 2"),
        ];
        let (system, rest) = split_system(&messages);
        assert_eq!(system, Some("be an agent"));
        assert_eq!(rest.len(), 3);
        assert_eq!(rest[0].role, MessageRole::User);
        assert_eq!(rest[1].content, "3");
    }

    #[test]
    fn request_omits_missing_system() {
        let messages = vec![Message::user("hi")];
        let (system, messages) = split_system(&messages);
        let body = MessagesRequest {
            model: "claude-3-5-haiku-latest",
            system,
            messages,
            max_tokens: 100,
            temperature: 1.0,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("system").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn parses_text_block_and_stop_reason() {
        let body = r#"{
            "type": "message",
            "content": [{"type": "text", "text": "4"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 300, "output_tokens": 2}
        }"#;
        let completion = parse_response(body).unwrap();
        assert_eq!(completion.content, "4");
        assert_eq!(completion.finish_reason, FinishReason::Stop);
        assert_eq!(completion.usage.unwrap().input_tokens, 300);
    }

    #[test]
    fn max_tokens_stop_is_truncated() {
        let body = r#"{"content": [{"type": "text", "text": "1"}], "stop_reason": "max_tokens"}"#;
        assert!(parse_response(body).unwrap().finish_reason.is_truncated());
    }

    #[test]
    fn empty_content_is_format_error() {
        let body = r#"{"content": [], "stop_reason": "end_turn"}"#;
        let err = parse_response(body).unwrap_err();
        assert!(matches!(err, GatewayError::ResponseFormat(_)));
    }

    #[test]
    fn error_object_is_permanent() {
        let body = r#"{"type": "error", "error": {"type": "invalid_request_error", "message": "bad"}}"#;
        let err = parse_response(body).unwrap_err();
        assert!(matches!(err, GatewayError::Api { ref code, .. } if code == "invalid_request_error"));
    }
}
