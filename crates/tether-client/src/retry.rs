//! Transport retry for control-plane HTTP calls.
//!
//! Only transport errors are retried. A response of any status goes back to
//! the caller on the first try; a `404` in particular is not retried here.
//! That condition belongs to the poll loop, which sees it as
//! [`crate::ClientError::RetryRead`].
//!
//! Whether a failed request may be replayed depends on its method. An
//! idempotent request is replayed on any transport error. A `POST` is
//! replayed only when the connection was never established: after a
//! timeout the control plane may already have enqueued the action or
//! applied the grant, and sending it again would do so twice.

use std::time::Duration;

use reqwest::Method;

/// Maximum number of replays after the initial request.
const MAX_RETRIES: u32 = 3;

/// First backoff delay; doubles on each replay (200ms, 400ms, 800ms).
const BASE_DELAY_MS: u64 = 200;

pub(crate) fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt))
}

/// Whether sending `method` twice has the same effect as sending it once.
pub(crate) fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE
    )
}

fn may_replay(method: &Method, err: &reqwest::Error) -> bool {
    is_idempotent(method) || err.is_connect()
}

/// Send a `method` request built by `f`, replaying transport failures with
/// exponential backoff while [`may_replay`] allows it.
///
/// `f` is called at most `MAX_RETRIES + 1` times.
pub(crate) async fn retry_send<F, Fut>(
    method: Method,
    endpoint: &str,
    f: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        let err = match f().await {
            Ok(resp) => return Ok(resp),
            Err(e) => e,
        };
        if attempt == MAX_RETRIES {
            return Err(err);
        }
        if !may_replay(&method, &err) {
            tracing::warn!(
                %method,
                endpoint,
                "control plane request failed after it may have been applied, not replaying: {err}"
            );
            return Err(err);
        }
        let delay = retry_delay(attempt);
        attempt += 1;
        tracing::warn!(
            %method,
            endpoint,
            attempt,
            max_retries = MAX_RETRIES,
            "control plane request failed, retrying in {delay:?}: {err}"
        );
        tokio::time::sleep(delay).await;
    }
}
