//! LTZF operations and the fields each one signs.
//!
//! The gateway does not sign every parameter it receives. Each operation
//! signs a fixed whitelist, and free-text fields such as `attach` or
//! `time_expire` travel unsigned. [`LtzfOperation::sign_fields`] is the
//! built-in whitelist; a configuration may replace it per operation with a
//! list of [`LtzfField`] values.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Every operation the gateway exposes, including the two callbacks that are
/// only verified, never sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LtzfOperation {
    /// Native QR-code payment.
    ScanPay,
    /// H5 payment in a mobile browser.
    H5Pay,
    /// H5 payment through the gateway's hosted jump page.
    H5JumpPay,
    /// JSAPI payment inside WeChat with a known `openid`.
    JsapiPay,
    /// JSAPI payment through the gateway's hosted cashier.
    JsapiConvenient,
    /// In-app payment.
    AppPay,
    /// Mini program payment.
    MiniProgramPay,
    /// Refund of a paid order.
    RefundOrder,
    /// OAuth redirect that resolves the payer's `openid`.
    GetWechatOpenid,
    /// Payment order lookup.
    GetPayOrder,
    /// Refund lookup.
    GetRefundOrder,
    /// Payment result callback.
    Notify,
    /// Refund result callback.
    RefundNotify,
}

/// Where an operation takes its default `notify_url` from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NotifyTarget {
    /// The payment callback URL.
    Payment,
    /// The refund callback URL.
    Refund,
    /// No callback.
    None,
}

const PAY_FIELDS: &[LtzfField] = &[
    LtzfField::MchId,
    LtzfField::OutTradeNo,
    LtzfField::TotalFee,
    LtzfField::Body,
    LtzfField::Timestamp,
    LtzfField::NotifyUrl,
];

const JSAPI_FIELDS: &[LtzfField] = &[
    LtzfField::MchId,
    LtzfField::OutTradeNo,
    LtzfField::TotalFee,
    LtzfField::Body,
    LtzfField::Openid,
    LtzfField::Timestamp,
    LtzfField::NotifyUrl,
];

const APP_FIELDS: &[LtzfField] = &[
    LtzfField::AppId,
    LtzfField::MchId,
    LtzfField::OutTradeNo,
    LtzfField::TotalFee,
    LtzfField::Body,
    LtzfField::Timestamp,
    LtzfField::NotifyUrl,
];

const REFUND_FIELDS: &[LtzfField] = &[
    LtzfField::MchId,
    LtzfField::OutTradeNo,
    LtzfField::OutRefundNo,
    LtzfField::Timestamp,
    LtzfField::RefundFee,
    LtzfField::NotifyUrl,
];

const OPENID_FIELDS: &[LtzfField] = &[
    LtzfField::MchId,
    LtzfField::Timestamp,
    LtzfField::CallbackUrl,
];

const PAY_QUERY_FIELDS: &[LtzfField] = &[
    LtzfField::MchId,
    LtzfField::OutTradeNo,
    LtzfField::Timestamp,
];

const REFUND_QUERY_FIELDS: &[LtzfField] = &[
    LtzfField::MchId,
    LtzfField::OutRefundNo,
    LtzfField::Timestamp,
];

const NOTIFY_FIELDS: &[LtzfField] = &[
    LtzfField::Code,
    LtzfField::Timestamp,
    LtzfField::MchId,
    LtzfField::OrderNo,
    LtzfField::OutTradeNo,
    LtzfField::PayNo,
    LtzfField::TotalFee,
];

const REFUND_NOTIFY_FIELDS: &[LtzfField] = &[
    LtzfField::Code,
    LtzfField::Timestamp,
    LtzfField::MchId,
    LtzfField::OrderNo,
    LtzfField::OutTradeNo,
    LtzfField::PayNo,
    LtzfField::RefundNo,
    LtzfField::OutRefundNo,
    LtzfField::PayChannel,
    LtzfField::RefundFee,
];

impl LtzfOperation {
    /// All operations, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::ScanPay,
        Self::H5Pay,
        Self::H5JumpPay,
        Self::JsapiPay,
        Self::JsapiConvenient,
        Self::AppPay,
        Self::MiniProgramPay,
        Self::RefundOrder,
        Self::GetWechatOpenid,
        Self::GetPayOrder,
        Self::GetRefundOrder,
        Self::Notify,
        Self::RefundNotify,
    ];

    /// The name used in configuration files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ScanPay => "scanPay",
            Self::H5Pay => "h5Pay",
            Self::H5JumpPay => "h5JumpPay",
            Self::JsapiPay => "jsapiPay",
            Self::JsapiConvenient => "jsapiConvenient",
            Self::AppPay => "appPay",
            Self::MiniProgramPay => "miniProgramPay",
            Self::RefundOrder => "refundOrder",
            Self::GetWechatOpenid => "getWechatOpenid",
            Self::GetPayOrder => "getPayOrder",
            Self::GetRefundOrder => "getRefundOrder",
            Self::Notify => "notify",
            Self::RefundNotify => "refundNotify",
        }
    }

    /// Endpoint path, or `None` for the callbacks.
    #[must_use]
    pub const fn endpoint(self) -> Option<&'static str> {
        match self {
            Self::ScanPay => Some("/api/wxpay/native"),
            Self::H5Pay => Some("/api/wxpay/h5"),
            Self::H5JumpPay => Some("/api/wxpay/jump_h5"),
            Self::JsapiPay => Some("/api/wxpay/jsapi"),
            Self::JsapiConvenient => Some("/api/wxpay/jsapi_convenient"),
            Self::AppPay => Some("/api/wxpay/app"),
            Self::MiniProgramPay => Some("/api/wxpay/mini"),
            Self::RefundOrder => Some("/api/wxpay/refund_order"),
            Self::GetWechatOpenid => Some("/api/wxpay/get_openid"),
            Self::GetPayOrder => Some("/api/wxpay/get_pay_order"),
            Self::GetRefundOrder => Some("/api/wxpay/get_refund_order"),
            Self::Notify | Self::RefundNotify => None,
        }
    }

    /// The built-in signing whitelist.
    #[must_use]
    pub const fn sign_fields(self) -> &'static [LtzfField] {
        match self {
            Self::ScanPay
            | Self::H5Pay
            | Self::H5JumpPay
            | Self::JsapiConvenient
            | Self::MiniProgramPay => PAY_FIELDS,
            Self::JsapiPay => JSAPI_FIELDS,
            Self::AppPay => APP_FIELDS,
            Self::RefundOrder => REFUND_FIELDS,
            Self::GetWechatOpenid => OPENID_FIELDS,
            Self::GetPayOrder => PAY_QUERY_FIELDS,
            Self::GetRefundOrder => REFUND_QUERY_FIELDS,
            Self::Notify => NOTIFY_FIELDS,
            Self::RefundNotify => REFUND_NOTIFY_FIELDS,
        }
    }

    pub(crate) const fn notify_target(self) -> NotifyTarget {
        match self {
            Self::ScanPay
            | Self::H5Pay
            | Self::H5JumpPay
            | Self::JsapiPay
            | Self::JsapiConvenient
            | Self::AppPay
            | Self::MiniProgramPay => NotifyTarget::Payment,
            Self::RefundOrder => NotifyTarget::Refund,
            _ => NotifyTarget::None,
        }
    }

    /// Operations that redirect the payer and take a `return_url`.
    pub(crate) const fn uses_return_url(self) -> bool {
        matches!(
            self,
            Self::H5Pay | Self::H5JumpPay | Self::JsapiPay | Self::JsapiConvenient
        )
    }

    /// Operations that create a payment and carry `developer_appid`.
    pub(crate) const fn is_payment(self) -> bool {
        matches!(self.notify_target(), NotifyTarget::Payment)
    }
}

impl Display for LtzfOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter name that may appear in a signing whitelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LtzfField {
    /// `mch_id`
    MchId,
    /// `out_trade_no`
    OutTradeNo,
    /// `total_fee`
    TotalFee,
    /// `body`
    Body,
    /// `timestamp`
    Timestamp,
    /// `notify_url`
    NotifyUrl,
    /// `openid`
    Openid,
    /// `app_id`
    AppId,
    /// `developer_appid`
    DeveloperAppid,
    /// `quit_url`
    QuitUrl,
    /// `return_url`
    ReturnUrl,
    /// `out_refund_no`
    OutRefundNo,
    /// `refund_fee`
    RefundFee,
    /// `order_no`
    OrderNo,
    /// `pay_no`
    PayNo,
    /// `refund_no`
    RefundNo,
    /// `pay_channel`
    PayChannel,
    /// `code`
    Code,
    /// `callback_url`
    CallbackUrl,
}

impl LtzfField {
    /// The parameter name on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MchId => "mch_id",
            Self::OutTradeNo => "out_trade_no",
            Self::TotalFee => "total_fee",
            Self::Body => "body",
            Self::Timestamp => "timestamp",
            Self::NotifyUrl => "notify_url",
            Self::Openid => "openid",
            Self::AppId => "app_id",
            Self::DeveloperAppid => "developer_appid",
            Self::QuitUrl => "quit_url",
            Self::ReturnUrl => "return_url",
            Self::OutRefundNo => "out_refund_no",
            Self::RefundFee => "refund_fee",
            Self::OrderNo => "order_no",
            Self::PayNo => "pay_no",
            Self::RefundNo => "refund_no",
            Self::PayChannel => "pay_channel",
            Self::Code => "code",
            Self::CallbackUrl => "callback_url",
        }
    }
}

impl Display for LtzfField {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_names_match_as_str() {
        for op in LtzfOperation::ALL {
            let json = serde_json::to_value(op).unwrap();
            assert_eq!(json, op.as_str());
        }
        let field: LtzfField = serde_json::from_str("\"developer_appid\"").unwrap();
        assert_eq!(field, LtzfField::DeveloperAppid);
        assert_eq!(
            serde_json::to_value(LtzfField::Openid).unwrap(),
            LtzfField::Openid.as_str()
        );
    }

    #[test]
    fn test_unknown_names_rejected() {
        assert!(serde_json::from_str::<LtzfOperation>("\"scanpay\"").is_err());
        assert!(serde_json::from_str::<LtzfField>("\"attach\"").is_err());
    }

    #[test]
    fn test_only_callbacks_lack_endpoints() {
        let without: Vec<_> = LtzfOperation::ALL
            .into_iter()
            .filter(|op| op.endpoint().is_none())
            .collect();
        assert_eq!(without, [LtzfOperation::Notify, LtzfOperation::RefundNotify]);
    }

    #[test]
    fn test_every_whitelist_signs_the_merchant() {
        for op in LtzfOperation::ALL {
            assert!(op.sign_fields().contains(&LtzfField::MchId), "{op}");
        }
    }

    #[test]
    fn test_callback_defaults() {
        assert_eq!(LtzfOperation::ScanPay.notify_target(), NotifyTarget::Payment);
        assert_eq!(LtzfOperation::RefundOrder.notify_target(), NotifyTarget::Refund);
        assert_eq!(LtzfOperation::GetPayOrder.notify_target(), NotifyTarget::None);
        assert!(LtzfOperation::JsapiPay.uses_return_url());
        assert!(!LtzfOperation::ScanPay.uses_return_url());
        assert!(LtzfOperation::AppPay.is_payment());
        assert!(!LtzfOperation::RefundOrder.is_payment());
    }
}
