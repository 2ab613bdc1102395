//! Error types for the request pipeline.

use http::StatusCode;
use reqwest_middleware as rqm;

/// A request refused by a pipeline stage before or instead of completing on
/// the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// The body of a POST/PUT/PATCH request exceeded the configured limit.
    #[error("request body too large: {size} bytes > {limit} bytes")]
    BodyTooLarge {
        /// Body length in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// An identical request was issued while this one was in flight, and
    /// this one was cancelled in its favour.
    #[error("request superseded by an identical request: {fingerprint}")]
    Superseded {
        /// Fingerprint shared by both requests, as computed by
        /// [`PreventRepeat::fingerprint`](crate::PreventRepeat::fingerprint).
        fingerprint: String,
    },
}

/// Errors returned by [`ApiClient`](crate::ApiClient) calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The process-wide client was read before [`init_global`](crate::init_global).
    #[error("API client has not been initialized: call init_global() first")]
    NotInitialized,

    /// The underlying reqwest client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// A base URL or request path did not form a valid URL.
    #[error("invalid URL `{url}`: {source}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },

    /// A pipeline stage refused the request locally.
    #[error(transparent)]
    Rejected(Rejection),

    /// The server answered with a non-2xx status.
    #[error("unexpected HTTP status {status}: {body}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Response body, lossily decoded as UTF-8.
        body: String,
    },

    /// Network failure, timeout or another middleware error.
    #[error("HTTP transport error: {0}")]
    Transport(#[source] rqm::Error),

    /// The response body was not the expected JSON.
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),
}

impl ApiError {
    /// Returns `true` if a pipeline stage refused the request before it
    /// reached the network.
    #[must_use]
    pub const fn is_local_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Returns `true` for network failures, timeouts and non-2xx responses.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { .. } | Self::Decode(_))
    }

    /// Returns `true` if the process-wide client was not initialized.
    #[must_use]
    pub const fn is_not_initialized(&self) -> bool {
        matches!(self, Self::NotInitialized)
    }

    /// Returns `true` if the request timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport(rqm::Error::Reqwest(err)) => err.is_timeout(),
            _ => false,
        }
    }

    /// Returns the HTTP status the server answered with, if any.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Lifts a middleware-chain error, recovering typed [`Rejection`]s.
    pub(crate) fn from_middleware(err: rqm::Error) -> Self {
        match err {
            rqm::Error::Middleware(inner) => match inner.downcast::<Rejection>() {
                Ok(rejection) => Self::Rejected(rejection),
                Err(other) => match other.downcast::<reqwest::Error>() {
                    Ok(err) => err.into(),
                    Err(other) => Self::Transport(rqm::Error::Middleware(other)),
                },
            },
            rqm::Error::Reqwest(err) => err.into(),
        }
    }
}

/// Lifts a reqwest error with its request URL removed.
impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(rqm::Error::Reqwest(err.without_url()))
    }
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        Self::Rejected(rejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_survives_middleware_boundary() {
        let wrapped = rqm::Error::Middleware(
            Rejection::BodyTooLarge {
                size: 10,
                limit: 5,
            }
            .into(),
        );
        let err = ApiError::from_middleware(wrapped);
        assert!(err.is_local_rejection());
        assert!(!err.is_transport());
        assert!(matches!(
            err,
            ApiError::Rejected(Rejection::BodyTooLarge { size: 10, limit: 5 })
        ));
    }

    #[tokio::test]
    async fn test_transport_error_hides_query() {
        // Nothing listens on port 9 on the loopback interface.
        let err = reqwest::get("http://127.0.0.1:9/api.php?act=balance&key=TOPSECRET")
            .await
            .unwrap_err();
        let err = ApiError::from_middleware(rqm::Error::Reqwest(err));
        assert!(err.is_transport());
        assert!(!err.to_string().contains("TOPSECRET"));
        assert!(!format!("{err:?}").contains("TOPSECRET"));
    }

    #[test]
    fn test_status_is_transport() {
        let err = ApiError::Status {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        };
        assert!(err.is_transport());
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
    }
}
