//! Payment and refund callbacks.
//!
//! The gateway POSTs a form to the configured `notify_url`. Verify the
//! signature first, then read the typed payload:
//!
//! ```no_run
//! use paygw::Params;
//! use paygw_ltzf::{LtzfClient, PayNotify};
//!
//! # fn handle(client: &LtzfClient, body: &str) -> Result<(), paygw::GatewayError> {
//! let params = Params::from_form_urlencoded(body);
//! if client.verify_pay_notify(&params)? {
//!     let notify = PayNotify::from_params(&params)?;
//!     assert!(notify.is_paid());
//! }
//! # Ok(())
//! # }
//! ```

use paygw::{GatewayError, Params, verify};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::{LtzfClient, SIGN_STYLE, field_names};
use crate::operation::LtzfOperation;

/// Payment callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayNotify {
    /// `0` when the payment succeeded.
    pub code: String,
    /// Seconds since epoch.
    pub timestamp: String,
    /// Merchant number.
    pub mch_id: String,
    /// Gateway order number.
    pub order_no: String,
    /// Merchant order number.
    pub out_trade_no: String,
    /// WeChat transaction id.
    pub pay_no: String,
    /// Paid amount in yuan.
    pub total_fee: String,
    /// Upper-case MD5 signature.
    #[serde(default)]
    pub sign: Option<String>,
    /// Payment channel such as `wxpay`.
    #[serde(default)]
    pub pay_channel: Option<String>,
    /// Trade type such as `NATIVE`.
    #[serde(default)]
    pub trade_type: Option<String>,
    /// Payment time.
    #[serde(default)]
    pub success_time: Option<String>,
    /// Echoed `attach`.
    #[serde(default)]
    pub attach: Option<String>,
    /// Payer `openid`.
    #[serde(default)]
    pub openid: Option<String>,
}

impl PayNotify {
    /// Reads the payload from callback parameters. Does not verify.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidParams`] if a required field is missing.
    pub fn from_params(params: &Params) -> Result<Self, GatewayError> {
        from_params(params)
    }

    /// Returns `true` if the callback reports a completed payment.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.code == "0"
    }
}

/// Refund callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundNotify {
    /// `0` when the refund succeeded.
    pub code: String,
    /// Seconds since epoch.
    pub timestamp: String,
    /// Merchant number.
    pub mch_id: String,
    /// Gateway order number.
    pub order_no: String,
    /// Merchant order number.
    pub out_trade_no: String,
    /// WeChat transaction id.
    pub pay_no: String,
    /// Gateway refund number.
    pub refund_no: String,
    /// Merchant refund number.
    pub out_refund_no: String,
    /// Payment channel.
    pub pay_channel: String,
    /// Refunded amount in yuan.
    pub refund_fee: String,
    /// Upper-case MD5 signature.
    #[serde(default)]
    pub sign: Option<String>,
    /// Completion time.
    #[serde(default)]
    pub success_time: Option<String>,
}

impl RefundNotify {
    /// Reads the payload from callback parameters. Does not verify.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidParams`] if a required field is missing.
    pub fn from_params(params: &Params) -> Result<Self, GatewayError> {
        from_params(params)
    }

    /// Returns `true` if the callback reports a completed refund.
    #[must_use]
    pub fn is_refunded(&self) -> bool {
        self.code == "0"
    }
}

fn from_params<T: DeserializeOwned>(params: &Params) -> Result<T, GatewayError> {
    let map: Map<String, Value> = params
        .iter()
        .filter_map(|(k, v)| v.to_text().map(|text| (k.to_owned(), Value::String(text))))
        .collect();
    serde_json::from_value(Value::Object(map))
        .map_err(|e| GatewayError::InvalidParams(e.to_string()))
}

impl LtzfClient {
    /// Verifies the signature of a payment callback.
    ///
    /// Only the callback's signing whitelist is checked; other fields such
    /// as `attach` are ignored. A missing, empty or wrong `sign` yields
    /// `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration.
    pub fn verify_pay_notify(&self, params: &Params) -> Result<bool, GatewayError> {
        self.verify_callback(LtzfOperation::Notify, params)
    }

    /// Verifies the signature of a refund callback.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration.
    pub fn verify_refund_notify(&self, params: &Params) -> Result<bool, GatewayError> {
        self.verify_callback(LtzfOperation::RefundNotify, params)
    }

    fn verify_callback(
        &self,
        operation: LtzfOperation,
        params: &Params,
    ) -> Result<bool, GatewayError> {
        let session = self.session()?;
        let fields = field_names(session.config.sign_fields(operation));
        let expected = params.get_text("sign");
        Ok(verify(
            params,
            Some(fields.as_slice()),
            &session.config.key,
            expected.as_deref(),
            &SIGN_STYLE,
        ))
    }
}
