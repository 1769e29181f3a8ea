//! OpenAI chat completions provider.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::GatewayError;
use super::http;
use super::provider::{
    Completion, CompletionFuture, CompletionProvider, CompletionRequest, FinishReason,
    ProviderKind, TokenUsage,
};
use crate::{Message, OPENAI_URL};

// ── Wire types ─────────────────────────────────────────────────────

/// Request body. Sampling knobs other than temperature are pinned so runs
/// differ only by the model's own stochasticity.
#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    n: u32,
    stream: bool,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    presence_penalty: f32,
    frequency_penalty: f32,
}

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<RawApiError>,
    usage: Option<RawUsage>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawApiError {
    code: Option<serde_json::Value>,
    message: String,
}

#[derive(Deserialize, Debug)]
struct RawUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the OpenAI chat completions API.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, GatewayError> {
        Self::with_url(api_key, OPENAI_URL)
    }

    /// Point the client at a different endpoint (proxies, test servers).
    pub fn with_url(
        api_key: impl Into<String>,
        url: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            client: http::build_client()?,
            api_key: api_key.into(),
            url: url.into(),
        })
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> Result<Completion, GatewayError> {
        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            n: 1,
            stream: false,
            temperature: request.temperature,
            top_p: 1.0,
            max_tokens: request.max_output_tokens,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
        };
        debug!(
            "OpenAI request: model={}, messages={}, max_tokens={}, temp={}, timeout={:?}",
            body.model,
            body.messages.len(),
            body.max_tokens,
            body.temperature,
            timeout,
        );

        let builder = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body);
        let (status, text) = http::send(builder, timeout).await?;

        if !(200..300).contains(&status) {
            return Err(GatewayError::from_status(ProviderKind::OpenAi, status, text));
        }
        parse_response(&text)
    }
}

/// Turn a 2xx body into a [`Completion`].
fn parse_response(text: &str) -> Result<Completion, GatewayError> {
    let parsed: RawChatResponse = serde_json::from_str(text)
        .map_err(|e| GatewayError::ResponseFormat(format!("failed to parse response: {e}")))?;

    if let Some(err) = parsed.error {
        return Err(GatewayError::from_api_error(
            ProviderKind::OpenAi,
            err.code.as_ref(),
            err.message,
        ));
    }

    let choice = parsed
        .choices
        .and_then(|c| c.into_iter().next())
        .ok_or_else(|| GatewayError::ResponseFormat("response has no choices".into()))?;
    let content = choice
        .message
        .content
        .ok_or_else(|| GatewayError::ResponseFormat("choice has no message content".into()))?;

    let usage = parsed.usage.map(|u| TokenUsage {
        input_tokens: u.prompt_tokens.unwrap_or(0),
        output_tokens: u.completion_tokens.unwrap_or(0),
    });

    Ok(Completion {
        content,
        finish_reason: FinishReason::from_openai(choice.finish_reason.as_deref()),
        usage,
    })
}

impl CompletionProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
        timeout: Duration,
    ) -> CompletionFuture<'a, Completion> {
        Box::pin(self.send(request, timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_pins_sampling_knobs() {
        let messages = vec![Message::system("sys"), Message::user("hi")];
        let body = ChatRequest {
            model: "gpt-4o",
            messages: &messages,
            n: 1,
            stream: false,
            temperature: 1.0,
            top_p: 1.0,
            max_tokens: 100,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["n"], 1);
        assert_eq!(json["stream"], false);
        assert_eq!(json["max_tokens"], 100);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn parses_content_and_finish_reason() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "7"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 1, "total_tokens": 121}
        }"#;
        let completion = parse_response(body).unwrap();
        assert_eq!(completion.content, "7");
        assert_eq!(completion.finish_reason, FinishReason::Stop);
        assert_eq!(
            completion.usage,
            Some(TokenUsage {
                input_tokens: 120,
                output_tokens: 1
            })
        );
    }

    #[test]
    fn length_finish_reason_is_truncated() {
        let body = r#"{"choices": [{"message": {"content": "12"}, "finish_reason": "length"}]}"#;
        assert!(parse_response(body).unwrap().finish_reason.is_truncated());
    }

    #[test]
    fn invalid_json_is_format_error() {
        let err = parse_response("<html>502 Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, GatewayError::ResponseFormat(_)));
    }

    #[test]
    fn missing_choices_is_format_error() {
        let err = parse_response(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, GatewayError::ResponseFormat(_)));
    }

    #[test]
    fn embedded_bad_gateway_is_network_error() {
        let body = r#"{"error": {"code": 502, "message": "Bad gateway."}}"#;
        let err = parse_response(body).unwrap_err();
        assert!(matches!(err, GatewayError::Network(m) if m == "Bad gateway."));
    }

    #[test]
    fn embedded_other_error_is_permanent() {
        let body = r#"{"error": {"code": "model_not_found", "message": "no such model"}}"#;
        let err = parse_response(body).unwrap_err();
        assert!(!err.is_transient());
    }
}
