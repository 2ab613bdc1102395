//! Payment callbacks.
//!
//! The gateway calls `notify_url` with the payment result in the query
//! string. Verify it, then answer with [`NOTIFY_ACK`] so the gateway stops
//! retrying.

use paygw::{GatewayError, Params, verify};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::{SIGN_STYLE, SevenPayClient};

/// Body the callback handler answers with once the notification is handled.
pub const NOTIFY_ACK: &str = "success";

/// Payment callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SevenPayNotify {
    /// Merchant id.
    pub pid: String,
    /// Product name.
    pub name: String,
    /// Amount in yuan.
    pub money: String,
    /// Merchant order number.
    pub out_trade_no: String,
    /// Gateway order number.
    pub trade_no: String,
    /// Echoed `param`.
    #[serde(default)]
    pub param: Option<String>,
    /// `TRADE_SUCCESS` once paid.
    pub trade_status: String,
    /// Payment method.
    #[serde(rename = "type")]
    pub pay_type: String,
    /// Lower-case MD5 signature.
    pub sign: String,
    /// Always `MD5`.
    #[serde(default)]
    pub sign_type: Option<String>,
}

impl SevenPayNotify {
    /// Reads the payload from callback parameters. Does not verify.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidParams`] if a required field is missing.
    pub fn from_params(params: &Params) -> Result<Self, GatewayError> {
        let map: Map<String, Value> = params
            .iter()
            .filter_map(|(k, v)| v.to_text().map(|text| (k.to_owned(), Value::String(text))))
            .collect();
        serde_json::from_value(Value::Object(map))
            .map_err(|e| GatewayError::InvalidParams(e.to_string()))
    }

    /// Returns `true` if the callback reports a completed payment.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.trade_status == "TRADE_SUCCESS"
    }
}

impl SevenPayClient {
    /// Verifies the signature of a payment callback.
    ///
    /// Every non-empty field except `sign` and `sign_type` is signed. The
    /// comparison ignores case. A missing, empty or wrong `sign` yields
    /// `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration.
    pub fn verify_notify(&self, params: &Params) -> Result<bool, GatewayError> {
        let session = self.session()?;
        let expected = params.get_text("sign");
        Ok(verify(
            params,
            None,
            &session.config.key,
            expected.as_deref(),
            &SIGN_STYLE,
        ))
    }
}
