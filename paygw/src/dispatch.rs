//! Form-encoded submission of signed parameter sets.

use paygw_http::ApiClient;
use serde::de::DeserializeOwned;
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::error::GatewayError;
use crate::params::Params;

/// HTTP verb used to submit a [`FormRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    /// Parameters travel in the query string.
    Get,
    /// Parameters travel in an `application/x-www-form-urlencoded` body.
    Post,
}

/// A fully assembled gateway request.
#[derive(Debug, Clone, PartialEq)]
pub struct FormRequest {
    /// HTTP verb.
    pub method: FormMethod,
    /// Endpoint path relative to the gateway base URL. May carry a fixed
    /// query string such as `/api.php?act=refund`.
    pub path: &'static str,
    /// Parameters, signature included.
    pub params: Params,
}

impl FormRequest {
    /// A GET request to `path`.
    #[must_use]
    pub const fn get(path: &'static str, params: Params) -> Self {
        Self {
            method: FormMethod::Get,
            path,
            params,
        }
    }

    /// A POST request to `path`.
    #[must_use]
    pub const fn post(path: &'static str, params: Params) -> Self {
        Self {
            method: FormMethod::Post,
            path,
            params,
        }
    }
}

/// Sends `request` through `api` and decodes the JSON response as `T`.
///
/// The response is returned as decoded; nothing is retried here beyond what
/// the client's pipeline does.
///
/// # Errors
///
/// Returns [`GatewayError::Transport`] carrying the pipeline's error
/// unchanged.
#[cfg_attr(
    feature = "telemetry",
    instrument(
        name = "paygw.dispatch",
        skip_all,
        fields(path = request.path, method = ?request.method),
        err
    )
)]
pub async fn dispatch<T: DeserializeOwned>(
    api: &ApiClient,
    request: FormRequest,
) -> Result<T, GatewayError> {
    let pairs = request.params.to_form_pairs();
    let response = match request.method {
        FormMethod::Get => api.get_query(request.path, pairs).await?,
        FormMethod::Post => api.post_form(request.path, pairs).await?,
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use wiremock::matchers::{body_string, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::error::ErrorKind;

    fn params() -> Params {
        [("pid", "1001"), ("act", "order")].into_iter().collect()
    }

    #[tokio::test]
    async fn test_get_uses_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api.php"))
            .and(query_param("act", "order"))
            .and(query_param("pid", "1001"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 1 })))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::builder(server.uri()).build().unwrap();
        let res: Value = dispatch(&api, FormRequest::get("/api.php", params()))
            .await
            .unwrap();
        assert_eq!(res["code"], 1);
    }

    #[tokio::test]
    async fn test_post_uses_form_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mapi.php"))
            .and(body_string("pid=1001&act=order"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 1 })))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::builder(server.uri()).build().unwrap();
        let _: Value = dispatch(&api, FormRequest::post("/mapi.php", params()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let api = ApiClient::builder(server.uri()).build().unwrap();
        let err = dispatch::<Value>(&api, FormRequest::post("/x", params()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
