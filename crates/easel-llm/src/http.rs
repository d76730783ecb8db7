use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};

use easel_core::errors::GatewayError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Limit on waiting for response headers. The streamed body is governed by
/// the SSE idle timeout instead.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(120);

pub(crate) fn build_client() -> Result<Client, GatewayError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| GatewayError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Send a streaming request and turn a non-2xx reply into a classified error.
pub(crate) async fn send(req: RequestBuilder) -> Result<Response, GatewayError> {
    send_within(req, RESPONSE_TIMEOUT).await
}

async fn send_within(req: RequestBuilder, limit: Duration) -> Result<Response, GatewayError> {
    let resp = tokio::time::timeout(limit, req.send())
        .await
        .map_err(|_| GatewayError::Timeout(limit))?
        .map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout(CONNECT_TIMEOUT)
            } else {
                GatewayError::NetworkError(e.to_string())
            }
        })?;

    if resp.status().is_success() {
        return Ok(resp);
    }

    let status = resp.status().as_u16();
    let retry_after = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = resp.text().await.unwrap_or_default();

    Err(match GatewayError::from_status(status, body) {
        GatewayError::RateLimited { .. } => GatewayError::RateLimited { retry_after },
        other => other,
    })
}

/// Join a configured base URL and a path without doubling slashes.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
