use std::future::Future;
use std::time::Duration;
use typed_builder::TypedBuilder;

/// How often and how patiently [`retry`] polls a service that is still
/// starting up.
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct RetryPolicy {
    #[builder(default = 20)]
    pub attempts: usize,
    #[builder(default = Duration::from_millis(500))]
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Runs `attempt` until it succeeds or the policy is exhausted, returning the
/// last error in the latter case.
///
/// Containers report readiness slightly before they accept clients, so the
/// first connections of a test commonly fail.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, mut attempt: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut remaining = policy.attempts.max(1);
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if remaining <= 1 => return Err(err),
            Err(_) => {
                remaining -= 1;
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
