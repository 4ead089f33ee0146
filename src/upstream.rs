//! Shared outbound HTTP plumbing for vendor APIs.

use backon::{ExponentialBuilder, Retryable};
use serde::de::DeserializeOwned;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

use crate::error::{IsRetryable, ToolkitError};
use crate::utils::logging::body_preview;

static NETWORK_RETRY_POLICY: LazyLock<ExponentialBuilder> = LazyLock::new(|| {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_millis(300))
        .with_max_times(2)
        .with_jitter()
});

/// Sends an idempotent request, retrying transport errors and 5xx answers.
///
/// `build` is invoked once per attempt.
pub(crate) async fn send_with_retry<F>(
    service: &'static str,
    build: F,
) -> Result<reqwest::Response, ToolkitError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    (|| async {
        let resp = build().send().await?;

        if resp.status().is_server_error() {
            let status = resp.status();
            let body = match resp.bytes().await {
                Ok(bytes) => body_preview(&bytes),
                Err(e) => format!("<failed to read body: {e}>"),
            };
            debug!(
                service,
                %status,
                body = %body,
                "[{service}] Upstream server error (will retry)"
            );
            return Err(ToolkitError::UpstreamStatus { service, status });
        }

        Ok(resp)
    })
    .retry(*NETWORK_RETRY_POLICY)
    .when(|e: &ToolkitError| e.is_retryable())
    .await
}

/// Fails on non-2xx, otherwise decodes the JSON body.
pub(crate) async fn read_json<T>(
    service: &'static str,
    resp: reqwest::Response,
) -> Result<T, ToolkitError>
where
    T: DeserializeOwned,
{
    let resp = ensure_success(service, resp).await?;
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Maps a non-2xx answer to [`ToolkitError::UpstreamStatus`], logging a body preview.
pub(crate) async fn ensure_success(
    service: &'static str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, ToolkitError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().clone();
    let body = match resp.bytes().await {
        Ok(bytes) => body_preview(&bytes),
        Err(e) => format!("<failed to read body: {e}>"),
    };
    debug!(service, %status, url = %url, body = %body, "[{service}] Upstream rejected request");
    Err(ToolkitError::UpstreamStatus { service, status })
}

/// Appends path segments to `base`, percent-encoding each one.
pub(crate) fn endpoint(base: &url::Url, segments: &[&str]) -> Result<url::Url, ToolkitError> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| ToolkitError::Internal(format!("base url cannot be a base: {base}")))?;
        path.pop_if_empty();
        path.extend(segments);
    }
    Ok(url)
}
