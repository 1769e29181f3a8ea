//! Shared HTTP plumbing for the provider clients.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::error::GatewayError;

const USER_AGENT: &str = concat!("homeostasis-bench/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client. Timeouts are applied per request, since they grow
/// with each retry attempt.
pub(crate) fn build_client() -> Result<reqwest::Client, GatewayError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| GatewayError::Client(e.to_string()))
}

/// Send a prepared request and return the status code and raw body.
///
/// Timeouts become [`GatewayError::ReadTimeout`]; every other transport
/// failure becomes [`GatewayError::Network`].
pub(crate) async fn send(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<(u16, String), GatewayError> {
    let start = Instant::now();

    let resp = request
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| transport_error(e, timeout))?;

    let status = resp.status().as_u16();
    let text = resp
        .text()
        .await
        .map_err(|e| transport_error(e, timeout))?;

    debug!(
        "HTTP {} in {:.1}s ({} bytes)",
        status,
        start.elapsed().as_secs_f64(),
        text.len()
    );
    trace!("Response body: {text}");

    Ok((status, text))
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> GatewayError {
    if err.is_timeout() {
        GatewayError::ReadTimeout(timeout)
    } else {
        GatewayError::Network(err.to_string())
    }
}
