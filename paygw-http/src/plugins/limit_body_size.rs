use std::fmt;
use std::sync::Arc;

use http::{Extensions, Method};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
#[cfg(feature = "telemetry")]
use tracing::warn;

use super::body_bytes;
use crate::constants::DEFAULT_MAX_BODY_BYTES;
use crate::error::Rejection;

type LimitFn = dyn Fn(&str) + Send + Sync;

/// Rejects POST, PUT and PATCH requests whose body exceeds a byte limit.
///
/// The check happens before anything is sent. A body exactly at the limit
/// passes. The optional callback receives a message such as
/// `request body too large: 6.00MB > 5.00MB`.
#[derive(Clone)]
pub struct LimitBodySize {
    max_bytes: usize,
    on_limit: Option<Arc<LimitFn>>,
}

impl Default for LimitBodySize {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BODY_BYTES)
    }
}

impl LimitBodySize {
    /// Creates the stage with a limit in bytes.
    #[must_use]
    pub const fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            on_limit: None,
        }
    }

    /// Sets the callback invoked with a human-readable message on rejection.
    #[must_use]
    pub fn with_on_limit<F>(mut self, on_limit: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_limit = Some(Arc::new(on_limit));
        self
    }

    /// Returns the configured limit in bytes.
    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    fn applies_to(method: &Method) -> bool {
        matches!(*method, Method::POST | Method::PUT | Method::PATCH)
    }
}

impl fmt::Debug for LimitBodySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimitBodySize")
            .field("max_bytes", &self.max_bytes)
            .field("has_on_limit", &self.on_limit.is_some())
            .finish()
    }
}

/// Formats a size comparison in mebibytes with two decimals.
fn limit_message(size: usize, limit: usize) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    format!(
        "request body too large: {:.2}MB > {:.2}MB",
        size as f64 / MIB,
        limit as f64 / MIB
    )
}

#[async_trait::async_trait]
impl rqm::Middleware for LimitBodySize {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        if Self::applies_to(req.method()) {
            let size = body_bytes(&req).len();
            if size > self.max_bytes {
                let message = limit_message(size, self.max_bytes);
                #[cfg(feature = "telemetry")]
                warn!(path = req.url().path(), size, limit = self.max_bytes, "{message}");
                if let Some(on_limit) = &self.on_limit {
                    on_limit(&message);
                }
                return Err(rqm::Error::Middleware(
                    Rejection::BodyTooLarge {
                        size,
                        limit: self.max_bytes,
                    }
                    .into(),
                ));
            }
        }
        next.run(req, extensions).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(stage: LimitBodySize) -> rqm::ClientWithMiddleware {
        rqm::ClientBuilder::new(reqwest::Client::new())
            .with(stage)
            .build()
    }

    #[test]
    fn test_limit_message() {
        assert_eq!(
            limit_message(6 * 1024 * 1024, DEFAULT_MAX_BODY_BYTES),
            "request body too large: 6.00MB > 5.00MB"
        );
    }

    #[tokio::test]
    async fn test_oversized_post_never_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let client = client(
            LimitBodySize::new(8)
                .with_on_limit(move |msg| sink.lock().unwrap().push(msg.to_owned())),
        );

        let err = client
            .post(server.uri())
            .body("123456789")
            .send()
            .await
            .unwrap_err();
        let rqm::Error::Middleware(inner) = err else {
            panic!("expected middleware error");
        };
        assert_eq!(
            inner.downcast_ref::<Rejection>(),
            Some(&Rejection::BodyTooLarge { size: 9, limit: 8 })
        );
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_body_at_limit_proceeds() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let res = client(LimitBodySize::new(8))
            .put(server.uri())
            .body("12345678")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
    }

    #[tokio::test]
    async fn test_get_is_not_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let res = client(LimitBodySize::new(0))
            .get(server.uri())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200);
    }
}
