//! Merchant configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use paygw::{GatewayError, require_non_empty};
use serde::{Deserialize, Serialize};

use crate::PROVIDER;
use crate::operation::{LtzfField, LtzfOperation};

/// Per-operation replacement signing whitelists.
pub type SignFilter = BTreeMap<LtzfOperation, Vec<LtzfField>>;

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Merchant configuration for the LTZF gateway.
///
/// Field names follow the gateway's own parameter names so the struct can be
/// loaded straight from a config file:
///
/// ```json
/// {
///   "base_url": "https://api.ltzf.cn",
///   "key": "...",
///   "mch_id": "1230000109",
///   "notify_url": "https://shop.example/pay/notify",
///   "return_url": "https://shop.example/pay/done",
///   "sign_filter": { "getPayOrder": ["mch_id", "out_trade_no"] }
/// }
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LtzfConfig {
    /// Gateway base URL.
    pub base_url: String,
    /// Merchant secret used for signing.
    pub key: String,
    /// Merchant number.
    pub mch_id: String,
    /// Default payment callback URL.
    pub notify_url: String,
    /// Default post-payment redirect URL.
    pub return_url: String,
    /// Default refund callback URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_url: Option<String>,
    /// Developer application id sent with payment orders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer_appid: Option<String>,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Replacement signing whitelists. Use with care: signing fewer fields
    /// than the gateway expects makes its signature check fail, and signing
    /// fewer than it checks weakens tamper protection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_filter: Option<SignFilter>,
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

impl LtzfConfig {
    /// Creates a configuration with the required fields and defaults for the
    /// rest.
    #[must_use]
    pub fn new(
        base_url: impl Into<String>,
        key: impl Into<String>,
        mch_id: impl Into<String>,
        notify_url: impl Into<String>,
        return_url: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            key: key.into(),
            mch_id: mch_id.into(),
            notify_url: notify_url.into(),
            return_url: return_url.into(),
            refund_url: None,
            developer_appid: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            sign_filter: None,
            log: true,
        }
    }

    /// Sets the refund callback URL.
    #[must_use]
    pub fn with_refund_url(mut self, url: impl Into<String>) -> Self {
        self.refund_url = Some(url.into());
        self
    }

    /// Sets the developer application id.
    #[must_use]
    pub fn with_developer_appid(mut self, appid: impl Into<String>) -> Self {
        self.developer_appid = Some(appid.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Replaces the signing whitelist of `operation`.
    #[must_use]
    pub fn with_sign_fields(
        mut self,
        operation: LtzfOperation,
        fields: impl IntoIterator<Item = LtzfField>,
    ) -> Self {
        self.sign_filter
            .get_or_insert_with(BTreeMap::new)
            .insert(operation, fields.into_iter().collect());
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

    /// Returns `true` if any operation has a replacement whitelist.
    #[must_use]
    pub fn has_sign_overrides(&self) -> bool {
        self.sign_filter.as_ref().is_some_and(|f| !f.is_empty())
    }

    /// The signing whitelist in effect for `operation`.
    #[must_use]
    pub fn sign_fields(&self, operation: LtzfOperation) -> &[LtzfField] {
        self.sign_filter
            .as_ref()
            .and_then(|filter| filter.get(&operation))
            .map_or_else(|| operation.sign_fields(), Vec::as_slice)
    }

    /// Checks the fields an operation cannot run without.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidConfig`] if `base_url`, `key` or
    /// `mch_id` is blank, if `timeout_ms` is zero, or if a replacement
    /// whitelist is empty.
    pub fn validate(&self) -> Result<(), GatewayError> {
        require_non_empty(PROVIDER, "base_url", &self.base_url)?;
        require_non_empty(PROVIDER, "key", &self.key)?;
        require_non_empty(PROVIDER, "mch_id", &self.mch_id)?;
        if self.timeout_ms == 0 {
            return Err(GatewayError::InvalidConfig {
                provider: PROVIDER,
                field: "timeout_ms",
                reason: "must be greater than zero".to_owned(),
            });
        }
        if let Some(filter) = &self.sign_filter
            && let Some((operation, _)) = filter.iter().find(|(_, fields)| fields.is_empty())
        {
            return Err(GatewayError::InvalidConfig {
                provider: PROVIDER,
                field: "sign_filter",
                reason: format!("whitelist for {operation} is empty"),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for LtzfConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LtzfConfig")
            .field("base_url", &self.base_url)
            .field("key", &"[REDACTED]")
            .field("mch_id", &self.mch_id)
            .field("notify_url", &self.notify_url)
            .field("return_url", &self.return_url)
            .field("refund_url", &self.refund_url)
            .field("developer_appid", &self.developer_appid)
            .field("timeout_ms", &self.timeout_ms)
            .field("sign_filter", &self.sign_filter)
            .field("log", &self.log)
            .finish()
    }
}
