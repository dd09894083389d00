//! Retry loop for cluster API calls

use std::future::Future;

use tracing::warn;

use super::{CallContext, ClusterError, RetryPolicy};

/// Run `call` under the context, retrying transient failures with the
/// policy's backoff. Backoff sleeps are cut short by cancellation and the
/// deadline like the calls themselves.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    ctx: &CallContext,
    mut call: F,
) -> Result<T, ClusterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClusterError>>,
{
    let mut attempt = 1;

    loop {
        match ctx.guard(call()).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                let backoff = policy.backoff_for(attempt);
                warn!(
                    operation,
                    error = %err,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Transient cluster API failure, retrying"
                );
                ctx.guard(async {
                    tokio::time::sleep(backoff).await;
                    Ok(())
                })
                .await?;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
