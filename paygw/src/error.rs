//! Error types shared by the gateway clients.
//!
//! Signature mismatches are deliberately absent: verification reports a
//! `bool` because garbled or forged callbacks are an expected input.

use paygw_http::ApiError;

/// Errors returned by gateway client operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// An operation ran before a successful `configure` call.
    #[error("{provider} is not configured: call configure() first")]
    NotConfigured {
        /// Provider the operation belongs to.
        provider: &'static str,
    },

    /// A configuration value failed validation.
    #[error("invalid {provider} configuration: `{field}` {reason}")]
    InvalidConfig {
        /// Provider being configured.
        provider: &'static str,
        /// Offending configuration field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// Caller-supplied parameters could not be flattened into a form.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// The system clock reads before the Unix epoch, so no request timestamp
    /// can be produced.
    #[error("system clock is before the Unix epoch")]
    Clock(#[from] std::time::SystemTimeError),

    /// The request pipeline rejected the call locally, or the gateway could
    /// not be reached, or it answered with a non-success status.
    #[error(transparent)]
    Transport(#[from] ApiError),
}

/// Coarse classification of a [`GatewayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Configuration missing or incomplete; nothing was sent.
    NotConfigured,
    /// Configuration, caller input or local environment was unusable; nothing
    /// was sent.
    InvalidInput,
    /// The pipeline refused the request before it reached the network.
    RequestRejectedLocally,
    /// Network failure, timeout, non-2xx status or undecodable response.
    Transport,
}

impl GatewayError {
    /// Creates a [`GatewayError::NotConfigured`] for `provider`.
    #[must_use]
    pub const fn not_configured(provider: &'static str) -> Self {
        Self::NotConfigured { provider }
    }

    /// Returns the coarse classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotConfigured { .. } => ErrorKind::NotConfigured,
            Self::InvalidConfig { .. } | Self::InvalidParams(_) | Self::Clock(_) => {
                ErrorKind::InvalidInput
            }
            Self::Transport(err) if err.is_local_rejection() => ErrorKind::RequestRejectedLocally,
            Self::Transport(err) if err.is_not_initialized() => ErrorKind::NotConfigured,
            Self::Transport(_) => ErrorKind::Transport,
        }
    }
}
