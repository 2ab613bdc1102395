//! Request inputs and responses.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input for a hosted checkout link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JumpPayInput {
    /// Payment method such as `alipay` or `wxpay`.
    #[serde(rename = "type")]
    pub pay_type: String,
    /// Merchant order number.
    pub out_trade_no: String,
    /// Product name.
    pub name: String,
    /// Amount in yuan, as a decimal string.
    pub money: String,
    /// Free-form data echoed back in the callback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Callback URL for this order; the configured one when absent or empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_url: Option<String>,
    /// Where the payer lands afterwards; the configured one when absent or
    /// empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
}

/// Input for a server-side API order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiPayInput {
    /// Payment method such as `alipay` or `wxpay`.
    #[serde(rename = "type")]
    pub pay_type: String,
    /// Merchant order number.
    pub out_trade_no: String,
    /// Product name.
    pub name: String,
    /// Amount in yuan, as a decimal string.
    pub money: String,
    /// Payer IP address.
    pub clientip: String,
    /// Payer device type such as `pc` or `mobile`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Free-form data echoed back in the callback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Callback URL for this order; the configured one when absent or empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_url: Option<String>,
}

/// Identifies an order by gateway or merchant number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderQueryInput {
    /// Gateway order number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_no: Option<String>,
    /// Merchant order number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_trade_no: Option<String>,
}

impl OrderQueryInput {
    /// Looks up by merchant order number.
    #[must_use]
    pub fn by_out_trade_no(out_trade_no: impl Into<String>) -> Self {
        Self {
            trade_no: None,
            out_trade_no: Some(out_trade_no.into()),
        }
    }

    /// Looks up by gateway order number.
    #[must_use]
    pub fn by_trade_no(trade_no: impl Into<String>) -> Self {
        Self {
            trade_no: Some(trade_no.into()),
            out_trade_no: None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.trade_no.as_deref().is_none_or(str::is_empty)
            && self.out_trade_no.as_deref().is_none_or(str::is_empty)
    }
}

/// Input for a refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundInput {
    /// Gateway order number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_no: Option<String>,
    /// Merchant order number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_trade_no: Option<String>,
    /// Amount to refund in yuan.
    pub money: String,
}

/// Result of an API order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiPayResponse {
    /// `1` on success.
    #[serde(deserialize_with = "code")]
    pub code: i64,
    /// Message.
    #[serde(default)]
    pub msg: String,
    /// Gateway order id.
    #[serde(rename = "O_id", default)]
    pub o_id: Option<String>,
    /// Gateway order number.
    #[serde(default)]
    pub trade_no: Option<String>,
    /// Checkout page to redirect the payer to.
    #[serde(default)]
    pub payurl: Option<String>,
    /// Content to render as a QR code.
    #[serde(default)]
    pub qrcode: Option<String>,
    /// Hosted QR code image.
    #[serde(default)]
    pub img: Option<String>,
}

/// Merchant balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    /// `1` on success.
    #[serde(deserialize_with = "code")]
    pub code: i64,
    /// Message.
    #[serde(default)]
    pub msg: String,
    /// Balance in yuan.
    #[serde(default)]
    pub balance: Option<String>,
}

/// Order details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderQueryResponse {
    /// `1` on success.
    #[serde(deserialize_with = "code")]
    pub code: i64,
    /// Message.
    #[serde(default)]
    pub msg: String,
    /// Gateway order number.
    #[serde(default)]
    pub trade_no: Option<String>,
    /// Merchant order number.
    #[serde(default)]
    pub out_trade_no: Option<String>,
    /// Payment method.
    #[serde(rename = "type", default)]
    pub pay_type: Option<String>,
    /// Merchant id.
    #[serde(default)]
    pub pid: Option<String>,
    /// Creation time.
    #[serde(default)]
    pub addtime: Option<String>,
    /// Completion time.
    #[serde(default)]
    pub endtime: Option<String>,
    /// Product name.
    #[serde(default)]
    pub name: Option<String>,
    /// Amount in yuan.
    #[serde(default)]
    pub money: Option<String>,
    /// `1` once paid.
    #[serde(default)]
    pub status: Option<i64>,
    /// Echoed `param`.
    #[serde(default)]
    pub param: Option<String>,
    /// Payer account.
    #[serde(default)]
    pub buyer: Option<String>,
}

impl OrderQueryResponse {
    /// Returns `true` if the order has been paid.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.status == Some(1)
    }
}

/// Refund result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundResponse {
    /// `1` on success.
    #[serde(deserialize_with = "code")]
    pub code: i64,
    /// Message.
    #[serde(default)]
    pub msg: String,
}

// Some gateway builds quote the code.
fn code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| de::Error::custom("code is not an integer")),
        Value::String(s) => s.trim().parse().map_err(de::Error::custom),
        other => Err(de::Error::custom(format!("unexpected code {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_code_accepts_number_or_string() {
        let a: RefundResponse = serde_json::from_value(json!({ "code": 1, "msg": "ok" })).unwrap();
        let b: RefundResponse =
            serde_json::from_value(json!({ "code": "1", "msg": "ok" })).unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_value::<RefundResponse>(json!({ "code": null })).is_err());
    }

    #[test]
    fn test_order_query_decodes_partial_payload() {
        let res: OrderQueryResponse = serde_json::from_value(json!({
            "code": 1,
            "msg": "succ",
            "trade_no": "2024",
            "out_trade_no": "T1",
            "type": "alipay",
            "status": 1,
        }))
        .unwrap();
        assert!(res.is_paid());
        assert_eq!(res.pay_type.as_deref(), Some("alipay"));
        assert!(res.buyer.is_none());
    }

    #[test]
    fn test_input_renames_type() {
        let input = JumpPayInput {
            pay_type: "wxpay".into(),
            out_trade_no: "T1".into(),
            name: "VIP".into(),
            money: "1.00".into(),
            param: None,
            notify_url: None,
            return_url: None,
        };
        let value = serde_json::to_value(input).unwrap();
        assert_eq!(value["type"], "wxpay");
        assert!(value.get("param").is_none());
        assert!(value.get("notify_url").is_none());
    }

    #[test]
    fn test_empty_order_lookup() {
        assert!(OrderQueryInput::default().is_empty());
        assert!(!OrderQueryInput::by_trade_no("2024").is_empty());
    }
}
