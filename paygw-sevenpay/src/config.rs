//! Merchant configuration.

use std::fmt;
use std::time::Duration;

use paygw::{GatewayError, require_non_empty};
use serde::{Deserialize, Serialize};

use crate::PROVIDER;

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Merchant configuration for a 7Pay gateway.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SevenPayConfig {
    /// Gateway base URL.
    pub base_url: String,
    /// Merchant secret.
    pub key: String,
    /// Merchant id.
    pub pid: String,
    /// Payment channel id, when the merchant has several.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    /// Asynchronous payment callback URL.
    pub notify_url: String,
    /// Browser redirect URL after payment.
    pub return_url: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Emits configuration and request events.
    #[serde(default = "default_log")]
    pub log: bool,
}

const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

const fn default_log() -> bool {
    true
}

impl SevenPayConfig {
    /// Creates a configuration with the required fields and defaults for the
    /// rest.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        key: impl Into<String>,
        pid: impl Into<String>,
        notify_url: impl Into<String>,
        return_url: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            key: key.into(),
            pid: pid.into(),
            cid: None,
            notify_url: notify_url.into(),
            return_url: return_url.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            log: true,
        }
    }

    /// Sets the channel id.
    #[must_use]
    pub fn with_cid(mut self, cid: impl Into<String>) -> Self {
        self.cid = Some(cid.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Enables or disables configuration and request events.
    #[must_use]
    pub const fn with_log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    /// The request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Checks the fields an operation cannot run without.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidConfig`] if `base_url`, `key` or `pid`
    /// is blank, or if `timeout_ms` is zero.
    pub fn validate(&self) -> Result<(), GatewayError> {
        require_non_empty(PROVIDER, "base_url", &self.base_url)?;
        require_non_empty(PROVIDER, "key", &self.key)?;
        require_non_empty(PROVIDER, "pid", &self.pid)?;
        if self.timeout_ms == 0 {
            return Err(GatewayError::InvalidConfig {
                provider: PROVIDER,
                field: "timeout_ms",
                reason: "must be greater than zero".to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for SevenPayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SevenPayConfig")
            .field("base_url", &self.base_url)
            .field("key", &"[REDACTED]")
            .field("pid", &self.pid)
            .field("cid", &self.cid)
            .field("notify_url", &self.notify_url)
            .field("return_url", &self.return_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("log", &self.log)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_validation() {
        let config: SevenPayConfig = serde_json::from_str(
            r#"{"base_url":"https://pay.example","key":"secret","pid":"1001",
                "notify_url":"https://cb/n","return_url":"https://cb/r","log":false}"#,
        )
        .unwrap();
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(!config.log);
        assert!(config.cid.is_none());
        assert!(config.validate().is_ok());

        let err = SevenPayConfig::new("https://pay.example", "secret", "", "n", "r")
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("`pid`"));
    }

    #[test]
    fn test_debug_hides_key() {
        let config = SevenPayConfig::new("https://pay.example", "secret", "1001", "n", "r");
        assert!(!format!("{config:?}").contains("secret"));
    }
}
