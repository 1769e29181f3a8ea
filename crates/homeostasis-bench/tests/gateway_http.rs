//! Provider HTTP behavior against a local stub server.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use homeostasis_bench::Message;
use homeostasis_bench::api::anthropic::AnthropicProvider;
use homeostasis_bench::api::openai::OpenAiProvider;
use homeostasis_bench::api::{
    CompletionGateway, CompletionRequest, FinishReason, GatewayError, RetryConfig,
};
use homeostasis_bench::ui::Acknowledge;

// ── Stub server ────────────────────────────────────────────────────

struct Reply {
    status: u16,
    body: String,
    delay: Duration,
}

fn reply(status: u16, body: impl Into<String>) -> Reply {
    Reply {
        status,
        body: body.into(),
        delay: Duration::ZERO,
    }
}

#[derive(Clone, Default)]
struct Stub {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    seen: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
    count_status: Arc<Mutex<u16>>,
    count_seen: Arc<Mutex<Vec<Value>>>,
}

impl Stub {
    fn new(replies: Vec<Reply>) -> Self {
        let stub = Self::default();
        *stub.replies.lock().unwrap() = replies.into();
        *stub.count_status.lock().unwrap() = 200;
        stub
    }

    fn requests(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    fn body(&self, i: usize) -> Value {
        self.seen.lock().unwrap()[i].1.clone()
    }

    fn header(&self, i: usize, name: &str) -> Option<String> {
        self.seen.lock().unwrap()[i]
            .0
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

async fn completion(
    State(stub): State<Stub>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    stub.seen.lock().unwrap().push((headers, body));
    let next = stub.replies.lock().unwrap().pop_front();
    let Some(next) = next else {
        return (StatusCode::BAD_REQUEST, "script exhausted".into());
    };
    if !next.delay.is_zero() {
        tokio::time::sleep(next.delay).await;
    }
    (StatusCode::from_u16(next.status).unwrap(), next.body)
}

async fn count_tokens(State(stub): State<Stub>, Json(body): Json<Value>) -> (StatusCode, String) {
    stub.count_seen.lock().unwrap().push(body);
    let status = *stub.count_status.lock().unwrap();
    (
        StatusCode::from_u16(status).unwrap(),
        json!({ "input_tokens": 42 }).to_string(),
    )
}

async fn serve(stub: Stub) -> String {
    let app = Router::new()
        .route("/v1/chat/completions", post(completion))
        .route("/v1/messages", post(completion))
        .route("/v1/messages/count_tokens", post(count_tokens))
        .with_state(stub);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

// ── Helpers ────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct CountingAck(Arc<AtomicUsize>);

impl Acknowledge for CountingAck {
    fn acknowledge(&self, _prompt: &str) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn openai_ok(content: &str, finish_reason: &str) -> String {
    json!({
        "choices": [{
            "message": { "role": "assistant", "content": content },
            "finish_reason": finish_reason,
        }],
        "usage": { "prompt_tokens": 50, "completion_tokens": 1 },
    })
    .to_string()
}

fn request(model: &str) -> CompletionRequest {
    CompletionRequest {
        model: model.into(),
        messages: vec![
            Message::system("You are an agent living in a simulation."),
            Message::user("Homeostatic target: 100"),
            Message::assistant_text("3"),
            Message::user("Homeostatic actual: 97"),
        ],
        temperature: 1.0,
        max_output_tokens: 100,
    }
}

async fn openai_gateway(stub: &Stub, ack: CountingAck) -> CompletionGateway {
    let base = serve(stub.clone()).await;
    let provider =
        OpenAiProvider::with_url("test-key", format!("{base}/v1/chat/completions")).unwrap();
    CompletionGateway::new(provider)
        .with_retry(RetryConfig::immediate(3))
        .with_acknowledge(ack)
}

// ── OpenAI ─────────────────────────────────────────────────────────

#[tokio::test]
async fn openai_success_sends_pinned_parameters() {
    let stub = Stub::new(vec![reply(200, openai_ok("7", "stop"))]);
    let mut gw = openai_gateway(&stub, CountingAck::default()).await;

    let completion = gw.complete(&request("gpt-4o-mini")).await.unwrap();
    assert_eq!(completion.content, "7");
    assert_eq!(completion.finish_reason, FinishReason::Stop);

    let body = stub.body(0);
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["n"], 1);
    assert_eq!(body["stream"], false);
    assert_eq!(body["max_tokens"], 100);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"].as_array().unwrap().len(), 4);
    assert_eq!(
        stub.header(0, "authorization").as_deref(),
        Some("Bearer test-key")
    );
    assert_eq!(gw.usage().requests, 1);
    assert_eq!(gw.usage().total_output_tokens, 1);
}

#[tokio::test]
async fn overloaded_status_is_retried() {
    let stub = Stub::new(vec![
        reply(503, "overloaded"),
        reply(200, openai_ok("2", "stop")),
    ]);
    let ack = CountingAck::default();
    let mut gw = openai_gateway(&stub, ack.clone()).await;

    let completion = gw.complete(&request("gpt-4o")).await.unwrap();
    assert_eq!(completion.content, "2");
    assert_eq!(stub.requests(), 2);
    assert_eq!(ack.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn malformed_body_is_retried() {
    let stub = Stub::new(vec![
        reply(200, "<html>not json</html>"),
        reply(200, json!({ "choices": [] }).to_string()),
        reply(200, openai_ok("5", "stop")),
    ]);
    let mut gw = openai_gateway(&stub, CountingAck::default()).await;

    let completion = gw.complete(&request("gpt-4o")).await.unwrap();
    assert_eq!(completion.content, "5");
    assert_eq!(stub.requests(), 3);
}

#[tokio::test]
async fn embedded_gateway_error_is_retried() {
    let stub = Stub::new(vec![
        reply(
            200,
            json!({ "error": { "code": 502, "message": "bad gateway" } }).to_string(),
        ),
        reply(200, openai_ok("4", "stop")),
    ]);
    let mut gw = openai_gateway(&stub, CountingAck::default()).await;

    assert_eq!(gw.complete(&request("gpt-4o")).await.unwrap().content, "4");
    assert_eq!(stub.requests(), 2);
}

#[tokio::test]
async fn unauthorized_is_acknowledged_and_not_retried() {
    let stub = Stub::new(vec![
        reply(401, "invalid api key"),
        reply(200, openai_ok("1", "stop")),
    ]);
    let ack = CountingAck::default();
    let mut gw = openai_gateway(&stub, ack.clone()).await;

    let err = gw.complete(&request("gpt-4o")).await.unwrap_err();
    assert!(
        matches!(err, GatewayError::Http { status: 401, .. }),
        "{err:?}"
    );
    assert_eq!(stub.requests(), 1);
    assert_eq!(ack.0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transient_failures_surface_after_cap() {
    let stub = Stub::new(vec![
        reply(500, "a"),
        reply(502, "b"),
        reply(504, "c"),
        reply(200, openai_ok("1", "stop")),
    ]);
    let mut gw = openai_gateway(&stub, CountingAck::default()).await;

    let err = gw.complete(&request("gpt-4o")).await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(stub.requests(), 3);
}

#[tokio::test]
async fn truncated_response_is_fatal() {
    let stub = Stub::new(vec![reply(200, openai_ok("12345678", "length"))]);
    let mut gw = openai_gateway(&stub, CountingAck::default()).await;

    let err = gw.complete(&request("gpt-4o")).await.unwrap_err();
    assert!(matches!(err, GatewayError::Truncated(_)), "{err:?}");
    assert_eq!(stub.requests(), 1);
}

#[tokio::test]
async fn slow_response_times_out_and_retries_with_longer_timeout() {
    let stub = Stub::new(vec![
        Reply {
            status: 200,
            body: openai_ok("9", "stop"),
            delay: Duration::from_millis(500),
        },
        reply(200, openai_ok("6", "stop")),
    ]);
    let base = serve(stub.clone()).await;
    let provider =
        OpenAiProvider::with_url("test-key", format!("{base}/v1/chat/completions")).unwrap();
    let mut gw = CompletionGateway::new(provider)
        .with_retry(RetryConfig {
            base_timeout: Duration::from_millis(100),
            ..RetryConfig::immediate(3)
        })
        .with_acknowledge(CountingAck::default());

    let completion = gw.complete(&request("gpt-4o")).await.unwrap();
    assert_eq!(completion.content, "6");
    assert_eq!(stub.requests(), 2);
}

// ── Anthropic ──────────────────────────────────────────────────────

async fn anthropic_gateway(stub: &Stub) -> CompletionGateway {
    let base = serve(stub.clone()).await;
    let provider = AnthropicProvider::with_urls(
        "test-key",
        format!("{base}/v1/messages"),
        format!("{base}/v1/messages/count_tokens"),
    )
    .unwrap();
    CompletionGateway::new(provider)
        .with_retry(RetryConfig::immediate(3))
        .with_acknowledge(CountingAck::default())
}

fn anthropic_ok(text: &str, stop_reason: &str) -> String {
    json!({
        "content": [{ "type": "text", "text": text }],
        "stop_reason": stop_reason,
        "usage": { "input_tokens": 40, "output_tokens": 1 },
    })
    .to_string()
}

#[tokio::test]
async fn anthropic_lifts_system_prompt_and_counts_tokens() {
    let stub = Stub::new(vec![reply(200, anthropic_ok("4", "end_turn"))]);
    let mut gw = anthropic_gateway(&stub).await;

    let completion = gw
        .complete(&request("claude-3-5-haiku-latest"))
        .await
        .unwrap();
    assert_eq!(completion.content, "4");
    assert_eq!(completion.finish_reason, FinishReason::Stop);

    let body = stub.body(0);
    assert_eq!(body["system"], "You are an agent living in a simulation.");
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert!(messages.iter().all(|m| m["role"] != "system"));
    assert_eq!(body["max_tokens"], 100);
    assert_eq!(stub.header(0, "x-api-key").as_deref(), Some("test-key"));
    assert_eq!(
        stub.header(0, "anthropic-version").as_deref(),
        Some("2023-06-01")
    );

    let counted = stub.count_seen.lock().unwrap();
    assert_eq!(counted.len(), 1);
    assert_eq!(counted[0]["system"], "You are an agent living in a simulation.");
    assert_eq!(gw.usage().total_input_tokens, 42);
}

#[tokio::test]
async fn anthropic_count_failure_falls_back_to_estimate() {
    let stub = Stub::new(vec![reply(200, anthropic_ok("4", "end_turn"))]);
    *stub.count_status.lock().unwrap() = 500;
    let mut gw = anthropic_gateway(&stub).await;

    gw.complete(&request("claude-3-5-haiku-latest"))
        .await
        .unwrap();
    let input = gw.usage().total_input_tokens;
    assert!(input > 0);
    assert_ne!(input, 42);
}

#[tokio::test]
async fn anthropic_max_tokens_stop_is_truncation() {
    let stub = Stub::new(vec![reply(200, anthropic_ok("123", "max_tokens"))]);
    let mut gw = anthropic_gateway(&stub).await;

    let err = gw
        .complete(&request("claude-3-5-haiku-latest"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Truncated(_)), "{err:?}");
}
