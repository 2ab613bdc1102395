use std::fmt;
use std::sync::Arc;

use http::Extensions;
use http::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
#[cfg(feature = "telemetry")]
use tracing::trace;

type TokenFn = dyn Fn() -> Option<String> + Send + Sync;

/// Attaches `Authorization: Bearer <token>` to every request.
///
/// The token provider runs per request, so a refreshed token is picked up by
/// the next call. Requests that already carry an `Authorization` header, and
/// calls where the provider yields `None` or an empty token, pass unchanged.
#[derive(Clone)]
pub struct BearerAuth {
    token: Arc<TokenFn>,
}

impl BearerAuth {
    /// Creates the stage from a token provider.
    pub fn new<F>(token: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        Self {
            token: Arc::new(token),
        }
    }
}

impl fmt::Debug for BearerAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuth").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl rqm::Middleware for BearerAuth {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        if !req.headers().contains_key(AUTHORIZATION)
            && let Some(token) = (self.token)().filter(|t| !t.is_empty())
        {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| rqm::Error::Middleware(e.into()))?;
            value.set_sensitive(true);
            req.headers_mut().insert(AUTHORIZATION, value);
            #[cfg(feature = "telemetry")]
            trace!(path = req.url().path(), "attached bearer token");
        }
        next.run(req, extensions).await
    }
}
