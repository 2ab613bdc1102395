//! Request inputs and response payloads.
//!
//! Inputs carry only what the caller decides. `mch_id`, `timestamp`,
//! `developer_appid` and the callback URL defaults are filled in from the
//! configuration when the request is signed.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields shared by every payment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayOrder {
    /// Merchant order number.
    pub out_trade_no: String,
    /// Amount in yuan, as a decimal string such as `"0.01"`.
    pub total_fee: String,
    /// Order description.
    pub body: String,
    /// Free-form data echoed back in the callback. Not signed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attach: Option<String>,
    /// Order expiry, in the gateway's `time_expire` format. Not signed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_expire: Option<String>,
    /// Overrides the configured payment callback URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_url: Option<String>,
}

impl PayOrder {
    /// Creates an order with the required fields.
    #[must_use]
    pub fn new(
        out_trade_no: impl Into<String>,
        total_fee: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            out_trade_no: out_trade_no.into(),
            total_fee: total_fee.into(),
            body: body.into(),
            attach: None,
            time_expire: None,
            notify_url: None,
        }
    }

    /// Sets `attach`.
    #[must_use]
    pub fn with_attach(mut self, attach: impl Into<String>) -> Self {
        self.attach = Some(attach.into());
        self
    }

    /// Sets `time_expire`.
    #[must_use]
    pub fn with_time_expire(mut self, time_expire: impl Into<String>) -> Self {
        self.time_expire = Some(time_expire.into());
        self
    }

    /// Overrides the payment callback URL for this order.
    #[must_use]
    pub fn with_notify_url(mut self, url: impl Into<String>) -> Self {
        self.notify_url = Some(url.into());
        self
    }
}

/// Input for payments that redirect the payer back afterwards: H5, H5 jump
/// and JSAPI convenient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectPayInput {
    /// The order.
    #[serde(flatten)]
    pub order: PayOrder,
    /// Overrides the configured redirect URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
}

impl From<PayOrder> for RedirectPayInput {
    fn from(order: PayOrder) -> Self {
        Self {
            order,
            return_url: None,
        }
    }
}

/// Input for a JSAPI payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsapiPayInput {
    /// The order.
    #[serde(flatten)]
    pub order: PayOrder,
    /// Payer `openid`.
    pub openid: String,
    /// Overrides the configured redirect URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
}

/// Input for an in-app payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppPayInput {
    /// WeChat open platform application id of the paying app.
    pub app_id: String,
    /// The order.
    #[serde(flatten)]
    pub order: PayOrder,
}

/// Input for a mini program payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiniProgramPayInput {
    /// The order.
    #[serde(flatten)]
    pub order: PayOrder,
    /// Title shown on the cashier page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Input for a refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundOrderInput {
    /// Merchant order number of the paid order.
    pub out_trade_no: String,
    /// Merchant refund number.
    pub out_refund_no: String,
    /// Amount to refund in yuan.
    pub refund_fee: String,
    /// Refund reason. Not signed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_desc: Option<String>,
    /// Overrides the configured refund callback URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_url: Option<String>,
}

/// Input for the `openid` OAuth redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetWechatOpenidInput {
    /// Where WeChat sends the payer with the resolved `openid`.
    pub callback_url: String,
    /// Free-form data echoed back. Not signed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attach: Option<String>,
}

/// Input for a payment order lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetPayOrderInput {
    /// Merchant order number.
    pub out_trade_no: String,
}

/// Input for a refund lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRefundOrderInput {
    /// Merchant refund number.
    pub out_refund_no: String,
}

/// The gateway's response envelope.
///
/// `code` is `0` on success. On failure the gateway usually sends an empty or
/// differently shaped `data`; anything that does not decode as `T` becomes
/// `None` instead of failing the whole response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct LtzfResponse<T> {
    /// Result code, `0` on success.
    pub code: i64,
    /// Operation-specific payload.
    #[serde(default, deserialize_with = "lenient")]
    pub data: Option<T>,
    /// Human-readable message.
    #[serde(default)]
    pub msg: String,
    /// Gateway request id, for support tickets.
    #[serde(default)]
    pub request_id: Option<String>,
}

impl<T> LtzfResponse<T> {
    /// Returns `true` if the gateway accepted the request.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code == 0
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Native payment result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanPayData {
    /// `weixin://` URL to encode as a QR code.
    pub code_url: String,
    /// Hosted QR code image.
    #[serde(rename = "QRcode_url")]
    pub qrcode_url: String,
}

/// Parameters for `WeixinJSBridge.invoke('getBrandWCPayRequest', ...)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsapiPayData {
    /// Official account id.
    pub app_id: String,
    /// Seconds since epoch.
    pub time_stamp: String,
    /// Random string.
    pub nonce_str: String,
    /// `prepay_id=...`
    pub package: String,
    /// Signature algorithm.
    pub sign_type: String,
    /// Payment signature.
    pub pay_sign: String,
}

/// Hosted JSAPI cashier result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsapiConvenientData {
    /// Cashier page URL.
    pub order_url: String,
    /// QR code of the cashier page.
    #[serde(rename = "QRcode_url")]
    pub qrcode_url: String,
}

/// Parameters for the WeChat SDK's in-app payment call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppPayData {
    /// Application id.
    pub appid: String,
    /// Merchant id at WeChat.
    pub partnerid: String,
    /// Prepay id.
    pub prepayid: String,
    /// Fixed `Sign=WXPay`.
    pub package: String,
    /// Random string.
    pub noncestr: String,
    /// Seconds since epoch.
    pub timestamp: String,
    /// Payment signature.
    pub sign: String,
}

/// Mini program payment result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiniProgramPayData {
    /// Echo of the merchant order number.
    pub out_trade_no: String,
}

/// Refund submission result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundOrderData {
    /// Merchant number.
    pub mch_id: String,
    /// Merchant order number.
    pub out_trade_no: String,
    /// Merchant refund number.
    pub out_refund_no: String,
    /// Gateway order number.
    pub order_no: String,
    /// WeChat refund number.
    pub pay_refund_no: String,
}

/// Payment order details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayOrderData {
    /// Creation time.
    pub add_time: String,
    /// Merchant number.
    pub mch_id: String,
    /// Gateway order number.
    pub order_no: String,
    /// Merchant order number.
    pub out_trade_no: String,
    /// WeChat transaction id.
    #[serde(default)]
    pub pay_no: Option<String>,
    /// Order description.
    pub body: String,
    /// Amount in yuan.
    pub total_fee: String,
    /// Trade type such as `NATIVE`.
    pub trade_type: String,
    /// Payment time.
    #[serde(default)]
    pub success_time: Option<String>,
    /// Echoed `attach`.
    #[serde(default)]
    pub attach: Option<String>,
    /// Payer `openid`.
    #[serde(default)]
    pub openid: Option<String>,
    /// `1` once paid.
    pub pay_status: i64,
}

/// Refund details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundStatusData {
    /// `1` once refunded.
    pub refund_status: i64,
    /// Merchant number.
    pub mch_id: String,
    /// Merchant order number.
    pub out_trade_no: String,
    /// WeChat transaction id.
    pub pay_no: String,
    /// Gateway order number.
    pub order_no: String,
    /// Merchant refund number.
    pub out_refund_no: String,
    /// WeChat refund number.
    pub pay_refund_no: String,
    /// Refunded amount in yuan.
    pub refund_fee: String,
    /// Account that received the refund.
    #[serde(default)]
    pub user_received_account: Option<String>,
    /// Completion time.
    #[serde(default)]
    pub success_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_flattened_input_serializes_flat() {
        let input = JsapiPayInput {
            order: PayOrder::new("T1", "0.01", "Coffee").with_attach("a"),
            openid: "o-1".into(),
            return_url: None,
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({
                "out_trade_no": "T1",
                "total_fee": "0.01",
                "body": "Coffee",
                "attach": "a",
                "openid": "o-1",
            })
        );
    }

    #[test]
    fn test_response_decodes_typed_data() {
        let res: LtzfResponse<ScanPayData> = serde_json::from_value(json!({
            "code": 0,
            "data": { "code_url": "weixin://wxpay/1", "QRcode_url": "https://qr/1" },
            "msg": "PAY_SUCCESS",
            "request_id": "r-1",
        }))
        .unwrap();
        assert!(res.is_success());
        assert_eq!(res.data.unwrap().qrcode_url, "https://qr/1");
        assert_eq!(res.request_id.as_deref(), Some("r-1"));
    }

    #[test]
    fn test_failure_with_mismatched_data_still_decodes() {
        let res: LtzfResponse<ScanPayData> = serde_json::from_value(json!({
            "code": 1,
            "data": "",
            "msg": "sign error",
        }))
        .unwrap();
        assert!(!res.is_success());
        assert!(res.data.is_none());
        assert_eq!(res.msg, "sign error");
    }

    #[test]
    fn test_string_payload() {
        let res: LtzfResponse<String> = serde_json::from_value(json!({
            "code": 0,
            "data": "https://wx.tenpay.com/checkmweb?prepay_id=1",
            "msg": "",
            "request_id": "r-2",
        }))
        .unwrap();
        assert!(res.data.unwrap().starts_with("https://wx.tenpay.com"));
    }

    #[test]
    fn test_jsapi_payload_uses_camel_case() {
        let data: JsapiPayData = serde_json::from_value(json!({
            "appId": "wx1",
            "timeStamp": "1700000000",
            "nonceStr": "n",
            "package": "prepay_id=p",
            "signType": "RSA",
            "paySign": "s",
        }))
        .unwrap();
        assert_eq!(data.app_id, "wx1");
        assert_eq!(data.pay_sign, "s");
    }
}
