use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use http::{Extensions, Method};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
use tokio_util::sync::CancellationToken;
#[cfg(feature = "telemetry")]
use tracing::debug;

use super::body_bytes;
use crate::error::Rejection;

type RepeatFn = dyn Fn(&str) + Send + Sync;

#[derive(Debug)]
struct Pending {
    id: u64,
    token: CancellationToken,
}

#[derive(Debug, Default)]
struct Registry {
    entries: DashMap<String, Pending>,
    next_id: AtomicU64,
}

/// Keeps at most one request per fingerprint in flight.
///
/// Two requests are identical when method, URL (query string included) and
/// body all match; see [`PreventRepeat::fingerprint`]. When a request arrives
/// while an identical one is still
/// pending, the older one is cancelled and fails with
/// [`Rejection::Superseded`]; the newer one proceeds. The last submitted
/// request therefore wins.
///
/// Clones share the same registry, which is how
/// [`ApiClient::pending_requests`](crate::ApiClient::pending_requests)
/// observes it.
#[derive(Clone)]
pub struct PreventRepeat {
    methods: Vec<Method>,
    on_repeat: Option<Arc<RepeatFn>>,
    registry: Arc<Registry>,
}

impl Default for PreventRepeat {
    fn default() -> Self {
        Self::new()
    }
}

impl PreventRepeat {
    /// Creates the stage guarding GET, POST, PUT, PATCH and DELETE.
    #[must_use]
    pub fn new() -> Self {
        Self {
            methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ],
            on_repeat: None,
            registry: Arc::default(),
        }
    }

    /// Restricts deduplication to `methods`.
    #[must_use]
    pub fn with_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    /// Sets the callback invoked with the fingerprint when a duplicate
    /// cancels an in-flight request.
    #[must_use]
    pub fn with_on_repeat<F>(mut self, on_repeat: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_repeat = Some(Arc::new(on_repeat));
        self
    }

    /// Number of requests currently registered as in flight.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.registry.entries.len()
    }

    /// Returns `true` if a request with `fingerprint` is in flight.
    #[must_use]
    pub fn is_pending(&self, fingerprint: &str) -> bool {
        self.registry.entries.contains_key(fingerprint)
    }

    /// Computes the fingerprint of `req`: `"{METHOD} {path} {digest}"`,
    /// where `digest` is the hex MD5 of method, full URL and body. Query
    /// values and bodies can hold merchant keys, so they only enter the
    /// digest.
    #[must_use]
    pub fn fingerprint(req: &Request) -> String {
        let mut raw = format!("{}:{}", req.method(), req.url()).into_bytes();
        raw.extend_from_slice(body_bytes(req));
        format!(
            "{} {} {}",
            req.method(),
            req.url().path(),
            hex::encode(md5::compute(&raw).0)
        )
    }

    fn register(&self, fingerprint: &str) -> (u64, CancellationToken) {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let previous = self.registry.entries.insert(
            fingerprint.to_owned(),
            Pending {
                id,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
            #[cfg(feature = "telemetry")]
            debug!(fingerprint, "cancelled in-flight duplicate request");
            if let Some(on_repeat) = &self.on_repeat {
                on_repeat(fingerprint);
            }
        }
        (id, token)
    }
}

impl fmt::Debug for PreventRepeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreventRepeat")
            .field("methods", &self.methods)
            .field("pending", &self.pending_len())
            .finish_non_exhaustive()
    }
}

/// Removes a registry entry when its request settles or is dropped, unless a
/// newer request has already taken the slot.
struct SettleGuard<'a> {
    registry: &'a Registry,
    fingerprint: &'a str,
    id: u64,
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        self.registry
            .entries
            .remove_if(self.fingerprint, |_, pending| pending.id == self.id);
    }
}

#[async_trait::async_trait]
impl rqm::Middleware for PreventRepeat {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        if !self.methods.contains(req.method()) {
            return next.run(req, extensions).await;
        }

        let fingerprint = Self::fingerprint(&req);
        let (id, token) = self.register(&fingerprint);
        let _guard = SettleGuard {
            registry: &self.registry,
            fingerprint: &fingerprint,
            id,
        };

        match token.run_until_cancelled(next.run(req, extensions)).await {
            Some(outcome) => outcome,
            None => Err(rqm::Error::Middleware(
                Rejection::Superseded {
                    fingerprint: fingerprint.clone(),
                }
                .into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(stage: PreventRepeat) -> rqm::ClientWithMiddleware {
        rqm::ClientBuilder::new(reqwest::Client::new())
            .with(stage)
            .build()
    }

    fn is_superseded(err: &rqm::Error) -> bool {
        matches!(
            err,
            rqm::Error::Middleware(inner)
                if matches!(inner.downcast_ref::<Rejection>(), Some(Rejection::Superseded { .. }))
        )
    }

    #[tokio::test]
    async fn test_duplicate_cancels_first() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/order"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;

        let repeats = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&repeats);
        let stage =
            PreventRepeat::new().with_on_repeat(move |fp| sink.lock().unwrap().push(fp.to_owned()));
        let observer = stage.clone();
        let client = client(stage);
        let url = format!("{}/order", server.uri());

        let first = {
            let client = client.clone();
            let url = url.clone();
            tokio::spawn(async move { client.post(url).body("a=1").send().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(observer.pending_len(), 1);

        let second = client.post(&url).body("a=1").send().await;
        let first = first.await.unwrap();

        assert!(is_superseded(&first.unwrap_err()));
        assert_eq!(second.unwrap().status(), 200);
        assert_eq!(observer.pending_len(), 0);

        let repeats = repeats.lock().unwrap();
        assert_eq!(repeats.len(), 1);
        let digest = hex::encode(md5::compute(format!("POST:{url}a=1")).0);
        assert_eq!(repeats[0], format!("POST /order {digest}"));
    }

    #[test]
    fn test_fingerprint_keeps_credentials_out() {
        let http = reqwest::Client::new();
        let get = http
            .get("https://pay.example/api.php?act=order&key=TOPSECRET")
            .build()
            .unwrap();
        let post = http
            .post("https://pay.example/api.php")
            .body("act=refund&key=TOPSECRET")
            .build()
            .unwrap();

        for req in [&get, &post] {
            let fingerprint = PreventRepeat::fingerprint(req);
            assert!(!fingerprint.contains("TOPSECRET"));
            assert!(fingerprint.contains("/api.php"));
        }
        assert_ne!(PreventRepeat::fingerprint(&get), PreventRepeat::fingerprint(&post));

        let other = http
            .get("https://pay.example/api.php?act=order&key=OTHER")
            .build()
            .unwrap();
        assert_ne!(PreventRepeat::fingerprint(&get), PreventRepeat::fingerprint(&other));
    }

    #[tokio::test]
    async fn test_different_bodies_do_not_collide() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(100)))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(PreventRepeat::new());
        let (a, b) = tokio::join!(
            client.post(server.uri()).body("a=1").send(),
            client.post(server.uri()).body("a=2").send(),
        );
        assert!(a.is_ok());
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_unguarded_method_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(100)))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(PreventRepeat::new().with_methods([Method::POST]));
        let (a, b) = tokio::join!(
            client.get(server.uri()).send(),
            client.get(server.uri()).send(),
        );
        assert!(a.is_ok());
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_entry_removed_after_failure() {
        let stage = PreventRepeat::new();
        let observer = stage.clone();
        // Nothing listens on port 9 on the loopback interface.
        let err = client(stage)
            .get("http://127.0.0.1:9/")
            .send()
            .await
            .unwrap_err();
        assert!(!is_superseded(&err));
        assert_eq!(observer.pending_len(), 0);
    }
}
