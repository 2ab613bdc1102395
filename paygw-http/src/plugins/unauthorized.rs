use std::fmt;
use std::sync::Arc;

use http::{Extensions, StatusCode};
use reqwest::{Request, Response, ResponseBuilderExt};
use reqwest_middleware as rqm;
use serde::Deserialize;
use serde_json::Value;
#[cfg(feature = "telemetry")]
use tracing::info;

use crate::constants::{DEFAULT_UNAUTHORIZED_CODE, DEFAULT_UNAUTHORIZED_STATUSES};

/// Why [`Unauthorized`] fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnauthorizedEvent {
    /// HTTP status of the offending response.
    pub status: StatusCode,
    /// Application-level `code` of the response body, if it carried one.
    pub code: Option<i64>,
}

type UnauthorizedFn = dyn Fn(UnauthorizedEvent) + Send + Sync;

/// Reports responses that signal an invalid session.
///
/// A response triggers the callback when its status is one of the configured
/// statuses (401 and 403 by default) or its JSON body has a top-level `code`
/// equal to one of the configured codes (1001 by default). The callback runs
/// at most once per response. The response itself is handed back unchanged:
/// this stage neither retries nor converts anything into success.
#[derive(Clone)]
pub struct Unauthorized {
    on_unauthorized: Arc<UnauthorizedFn>,
    codes: Vec<i64>,
    statuses: Vec<StatusCode>,
}

impl Unauthorized {
    /// Creates the stage with the default codes and statuses.
    pub fn new<F>(on_unauthorized: F) -> Self
    where
        F: Fn(UnauthorizedEvent) + Send + Sync + 'static,
    {
        Self {
            on_unauthorized: Arc::new(on_unauthorized),
            codes: vec![DEFAULT_UNAUTHORIZED_CODE],
            statuses: DEFAULT_UNAUTHORIZED_STATUSES
                .iter()
                .filter_map(|s| StatusCode::from_u16(*s).ok())
                .collect(),
        }
    }

    /// Replaces the application-level codes that trigger the callback.
    #[must_use]
    pub fn with_codes(mut self, codes: impl IntoIterator<Item = i64>) -> Self {
        self.codes = codes.into_iter().collect();
        self
    }

    /// Replaces the HTTP statuses that trigger the callback.
    #[must_use]
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    fn matches(&self, status: StatusCode, code: Option<i64>) -> bool {
        self.statuses.contains(&status) || code.is_some_and(|c| self.codes.contains(&c))
    }
}

impl fmt::Debug for Unauthorized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unauthorized")
            .field("codes", &self.codes)
            .field("statuses", &self.statuses)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct CodeProbe {
    code: Option<Value>,
}

/// Reads a top-level `code` that is either a JSON integer or an integer string.
fn body_code(body: &[u8]) -> Option<i64> {
    match serde_json::from_slice::<CodeProbe>(body).ok()?.code? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Buffers `res` to read its body `code`, and returns an equivalent response
/// with the body restored.
async fn inspect(res: Response) -> rqm::Result<(Response, Option<i64>)> {
    let status = res.status();
    let version = res.version();
    let url = res.url().clone();
    let headers = res.headers().clone();
    let body = res.bytes().await?;
    let code = body_code(&body);

    let mut builder = http::Response::builder()
        .status(status)
        .version(version)
        .url(url);
    if let Some(map) = builder.headers_mut() {
        *map = headers;
    }
    let rebuilt = builder
        .body(body)
        .map_err(|e| rqm::Error::Middleware(e.into()))?;
    Ok((Response::from(rebuilt), code))
}

#[async_trait::async_trait]
impl rqm::Middleware for Unauthorized {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let res = next.run(req, extensions).await?;
        let (res, code) = inspect(res).await?;
        let status = res.status();
        if self.matches(status, code) {
            #[cfg(feature = "telemetry")]
            info!(%status, ?code, path = res.url().path(), "unauthorized response");
            (self.on_unauthorized)(UnauthorizedEvent { status, code });
        }
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn recording() -> (Unauthorized, Arc<Mutex<Vec<UnauthorizedEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let stage = Unauthorized::new(move |event| sink.lock().unwrap().push(event));
        (stage, events)
    }

    async fn call(stage: Unauthorized, template: ResponseTemplate) -> Response {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(template)
            .expect(1)
            .mount(&server)
            .await;
        rqm::ClientBuilder::new(reqwest::Client::new())
            .with(stage)
            .build()
            .get(server.uri())
            .send()
            .await
            .unwrap()
    }

    #[test]
    fn test_body_code_forms() {
        assert_eq!(body_code(br#"{"code":1001}"#), Some(1001));
        assert_eq!(body_code(br#"{"code":"1001"}"#), Some(1001));
        assert_eq!(body_code(br#"{"code":null}"#), None);
        assert_eq!(body_code(b"<html>"), None);
    }

    #[tokio::test]
    async fn test_status_triggers_once_and_passes_response() {
        let (stage, events) = recording();
        let res = call(stage, ResponseTemplate::new(401).set_body_string("denied")).await;
        assert_eq!(res.status(), 401);
        assert_eq!(res.text().await.unwrap(), "denied");
        assert_eq!(
            *events.lock().unwrap(),
            [UnauthorizedEvent {
                status: StatusCode::UNAUTHORIZED,
                code: None
            }]
        );
    }

    #[tokio::test]
    async fn test_body_code_triggers() {
        let (stage, events) = recording();
        let body = serde_json::json!({ "code": 1001, "message": "session expired" });
        let res = call(stage, ResponseTemplate::new(200).set_body_json(&body)).await;
        let echoed: Value = res.json().await.unwrap();
        assert_eq!(echoed, body);
        assert_eq!(events.lock().unwrap()[0].code, Some(1001));
    }

    #[tokio::test]
    async fn test_custom_codes_and_statuses() {
        let (stage, events) = recording();
        let stage = stage.with_codes([401]).with_statuses(Vec::new());
        call(
            stage.clone(),
            ResponseTemplate::new(403).set_body_json(serde_json::json!({ "code": 0 })),
        )
        .await;
        assert!(events.lock().unwrap().is_empty());

        call(
            stage,
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "code": 401 })),
        )
        .await;
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ordinary_response_ignored() {
        let (stage, events) = recording();
        call(
            stage,
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "code": 0 })),
        )
        .await;
        assert!(events.lock().unwrap().is_empty());
    }
}
