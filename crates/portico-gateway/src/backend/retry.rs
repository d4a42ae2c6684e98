//! Timeout and retry helpers shared by the network adapters.

use portico_kernel::{CallPolicy, GatewayError, GatewayResult, codes};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Linear backoff step between attempts.
pub(crate) const BACKOFF_STEP: Duration = Duration::from_millis(100);

/// Bound `call` by `timeout`, mapping expiry to a `Timeout`-kind failure.
pub(crate) async fn bounded<T, F>(
    timeout: Duration,
    module: &str,
    target: &str,
    call: F,
) -> GatewayResult<T>
where
    F: Future<Output = GatewayResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::timeout(
            codes::UPSTREAM_TIMEOUT,
            module,
            format!(
                "{target} did not answer within {} ms",
                timeout.as_millis()
            ),
        )),
    }
}

/// Run `call` once, then up to `policy.retry_count` more times while it fails
/// with an error `retry_if` accepts.  The closure receives the zero-based
/// attempt number.  The caller bounds the whole loop; see [`deadline`].
pub(crate) async fn with_retry<T, P, F, Fut>(
    policy: &CallPolicy,
    target: &str,
    retry_if: P,
    mut call: F,
) -> GatewayResult<T>
where
    P: Fn(&GatewayError) -> bool,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = GatewayResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match call(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.retry_count && retry_if(&err) => {
                attempt += 1;
                warn!(
                    %target,
                    attempt,
                    max_retries = policy.retry_count,
                    error = %err,
                    "retryable backend failure, retrying"
                );
                tokio::time::sleep(BACKOFF_STEP * attempt).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// [`with_retry`] under a single `policy.timeout` budget covering every
/// attempt and backoff.
pub(crate) async fn deadline<T, P, F, Fut>(
    policy: &CallPolicy,
    module: &str,
    target: &str,
    retry_if: P,
    call: F,
) -> GatewayResult<T>
where
    P: Fn(&GatewayError) -> bool,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = GatewayResult<T>>,
{
    bounded(
        policy.timeout,
        module,
        target,
        with_retry(policy, target, retry_if, call),
    )
    .await
}
