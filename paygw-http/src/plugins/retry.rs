use std::time::Duration;

use http::{Extensions, Method};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
#[cfg(feature = "telemetry")]
use tracing::debug;

use crate::constants::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};

/// Retry limits and backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries attempted after the first failure.
    pub max_retries: u32,
    /// Backoff unit: retry `n` waits `n * base_delay`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Retries failed requests with linear backoff.
///
/// Network failures and timeouts are retried for every method. A 5xx response
/// is retried only for idempotent methods (GET, HEAD, OPTIONS, PUT, DELETE).
/// 4xx responses and errors raised by other stages are returned immediately.
/// Requests with a streaming body cannot be replayed and are sent once.
#[derive(Debug, Clone, Copy, Default)]
pub struct Retry {
    policy: RetryPolicy,
}

impl Retry {
    /// Creates the stage from a policy.
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Returns the policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE
    )
}

fn is_network_error(err: &rqm::Error) -> bool {
    matches!(err, rqm::Error::Reqwest(e) if e.is_timeout() || e.is_connect() || e.is_request())
}

fn should_retry(method: &Method, outcome: &rqm::Result<Response>) -> bool {
    match outcome {
        Ok(res) => res.status().is_server_error() && is_idempotent(method),
        Err(err) => is_network_error(err),
    }
}

#[async_trait::async_trait]
impl rqm::Middleware for Retry {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let mut retries = 0;
        loop {
            let Some(current) = req.try_clone() else {
                return next.run(req, extensions).await;
            };
            let outcome = next.clone().run(current, extensions).await;
            if retries >= self.policy.max_retries || !should_retry(req.method(), &outcome) {
                return outcome;
            }
            retries += 1;
            let delay = self.policy.delay_for(retries);
            #[cfg(feature = "telemetry")]
            debug!(path = req.url().path(), retries, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(max_retries: u32) -> rqm::ClientWithMiddleware {
        rqm::ClientBuilder::new(reqwest::Client::new())
            .with(Retry::new(RetryPolicy {
                max_retries,
                base_delay: Duration::from_millis(5),
            }))
            .build()
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_idempotent_5xx_retried_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let res = client(3).get(server.uri()).send().await.unwrap();
        assert_eq!(res.status(), 200);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4)
            .mount(&server)
            .await;

        let res = client(3).delete(server.uri()).send().await.unwrap();
        assert_eq!(res.status(), 500);
    }

    #[tokio::test]
    async fn test_post_5xx_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;

        let res = client(3).post(server.uri()).body("x=1").send().await.unwrap();
        assert_eq!(res.status(), 502);
    }

    #[tokio::test]
    async fn test_4xx_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let res = client(3).get(server.uri()).send().await.unwrap();
        assert_eq!(res.status(), 404);
    }

    #[tokio::test]
    async fn test_timeout_retried_for_post() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .expect(3)
            .mount(&server)
            .await;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let client = rqm::ClientBuilder::new(http)
            .with(Retry::new(RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
            }))
            .build();

        let err = client.post(server.uri()).body("x=1").send().await.unwrap_err();
        assert!(matches!(err, rqm::Error::Reqwest(ref e) if e.is_timeout()));
    }
}
