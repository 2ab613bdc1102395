//! The LTZF gateway client.

use std::fmt::Debug;
use std::sync::Arc;

use paygw::{
    ConfigStore, DigestAlgorithm, DigestCase, FieldOrder, FormRequest, GatewayError, Params,
    SecretPlacement, SignStyle, UnixTimestamp, canonicalize, dispatch, sign,
};
use paygw_http::{ApiClient, PipelineOptions};
use serde::Serialize;
use serde::de::DeserializeOwned;
#[cfg(feature = "telemetry")]
use tracing::{debug, info, instrument, warn};

use crate::PROVIDER;
use crate::config::LtzfConfig;
use crate::operation::{LtzfField, LtzfOperation, NotifyTarget};
use crate::types::{
    AppPayData, AppPayInput, GetPayOrderInput, GetRefundOrderInput, GetWechatOpenidInput,
    JsapiConvenientData, JsapiPayData, JsapiPayInput, LtzfResponse, MiniProgramPayData,
    MiniProgramPayInput, PayOrder, PayOrderData, RedirectPayInput, RefundOrderData,
    RefundOrderInput, RefundStatusData, ScanPayData,
};

/// Sorted pairs, `&key=<secret>` suffix, upper-case MD5.
pub const SIGN_STYLE: SignStyle = SignStyle {
    order: FieldOrder::Sorted,
    secret: SecretPlacement::KeyParam,
    case: DigestCase::Upper,
    algorithm: DigestAlgorithm::Md5,
};

/// A validated configuration together with the HTTP client built for it.
pub(crate) struct Session {
    pub(crate) config: LtzfConfig,
    api: ApiClient,
}

/// Client for the LTZF gateway.
///
/// A client starts unconfigured; every operation fails with
/// [`GatewayError::NotConfigured`] without touching the network until
/// [`LtzfClient::configure`] succeeds. Configuration can be replaced at any
/// time; operations already in flight finish with the configuration they
/// started with.
///
/// ```no_run
/// use paygw_ltzf::{LtzfClient, LtzfConfig, PayOrder};
///
/// # async fn run() -> Result<(), paygw::GatewayError> {
/// let client = LtzfClient::new();
/// client.configure(LtzfConfig::new(
///     "https://api.ltzf.cn",
///     "merchant-secret",
///     "1230000109",
///     "https://shop.example/pay/notify",
///     "https://shop.example/pay/done",
/// ))?;
/// let res = client.scan_pay(&PayOrder::new("T1", "0.01", "Coffee")).await?;
/// if let Some(data) = res.data {
///     println!("{}", data.code_url);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LtzfClient {
    pub(crate) store: ConfigStore<Session>,
    pipeline: PipelineOptions,
}

impl Default for LtzfClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LtzfClient {
    /// Creates an unconfigured client whose requests are retried on network
    /// failures.
    #[must_use]
    pub fn new() -> Self {
        Self::with_pipeline(PipelineOptions::with_default_retry())
    }

    /// Creates an unconfigured client with explicit pipeline stages.
    #[must_use]
    pub const fn with_pipeline(pipeline: PipelineOptions) -> Self {
        Self {
            store: ConfigStore::new(PROVIDER),
            pipeline,
        }
    }

    /// Validates `config` and makes it the active configuration.
    ///
    /// The previous configuration is replaced as a whole. If validation
    /// fails the previous configuration stays active.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidConfig`] for a missing required field,
    /// or [`GatewayError::Transport`] if the base URL is not a valid URL.
    pub fn configure(&self, config: LtzfConfig) -> Result<(), GatewayError> {
        config.validate()?;
        let api = ApiClient::builder(config.base_url.clone())
            .timeout(config.timeout())
            .pipeline(self.pipeline.clone())
            .build()?;

        #[cfg(feature = "telemetry")]
        if config.log {
            info!(
                base_url = %config.base_url,
                mch_id = %config.mch_id,
                key = %paygw::mask_secret(&config.key),
                notify_url = %config.notify_url,
                return_url = %config.return_url,
                refund_url = ?config.refund_url,
                developer_appid = ?config.developer_appid,
                timeout_ms = config.timeout_ms,
                "ltzf configured; merchant fields are filled in automatically"
            );
            if config.has_sign_overrides() {
                warn!(
                    sign_filter = ?config.sign_filter,
                    "ltzf sign-field overrides active; signatures differ from gateway defaults"
                );
            }
        }

        self.store.replace(Session { config, api });
        Ok(())
    }

    /// Returns `true` once a configuration is active.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.store.is_ready()
    }

    pub(crate) fn session(&self) -> Result<Arc<Session>, GatewayError> {
        self.store.get()
    }

    /// Signs `params` as they are: every non-empty field except `sign` and
    /// `sign_type` is included. Use [`LtzfClient::signed_params`] to get the
    /// whitelist of an operation applied.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration.
    pub fn sign_params(&self, params: &Params) -> Result<String, GatewayError> {
        let session = self.session()?;
        let canonical = canonicalize(params, None, SIGN_STYLE.order);
        Ok(sign(&canonical, &session.config.key, &SIGN_STYLE))
    }

    /// Builds the complete signed parameter set `operation` would send for
    /// `input`, without sending it.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration and
    /// [`GatewayError::InvalidParams`] if `input` is not a flat struct.
    pub fn signed_params<I>(
        &self,
        operation: LtzfOperation,
        input: &I,
    ) -> Result<Params, GatewayError>
    where
        I: Serialize + ?Sized,
    {
        let session = self.session()?;
        build_params(&session.config, operation, input, UnixTimestamp::now()?)
    }

    /// Native QR-code payment.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration, or
    /// [`GatewayError::Transport`] if the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "ltzf.scan_pay",
            skip_all,
            fields(out_trade_no = %input.out_trade_no),
            err
        )
    )]
    pub async fn scan_pay(
        &self,
        input: &PayOrder,
    ) -> Result<LtzfResponse<ScanPayData>, GatewayError> {
        self.call(LtzfOperation::ScanPay, input).await
    }

    /// H5 payment. `data` is the URL to open in the payer's browser.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration, or
    /// [`GatewayError::Transport`] if the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "ltzf.h5_pay",
            skip_all,
            fields(out_trade_no = %input.order.out_trade_no),
            err
        )
    )]
    pub async fn h5_pay(
        &self,
        input: &RedirectPayInput,
    ) -> Result<LtzfResponse<String>, GatewayError> {
        self.call(LtzfOperation::H5Pay, input).await
    }

    /// H5 payment through the gateway's jump page. `data` is the page URL.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration, or
    /// [`GatewayError::Transport`] if the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "ltzf.h5_jump_pay",
            skip_all,
            fields(out_trade_no = %input.order.out_trade_no),
            err
        )
    )]
    pub async fn h5_jump_pay(
        &self,
        input: &RedirectPayInput,
    ) -> Result<LtzfResponse<String>, GatewayError> {
        self.call(LtzfOperation::H5JumpPay, input).await
    }

    /// JSAPI payment for a known `openid`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration, or
    /// [`GatewayError::Transport`] if the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "ltzf.jsapi_pay",
            skip_all,
            fields(out_trade_no = %input.order.out_trade_no),
            err
        )
    )]
    pub async fn jsapi_pay(
        &self,
        input: &JsapiPayInput,
    ) -> Result<LtzfResponse<JsapiPayData>, GatewayError> {
        self.call(LtzfOperation::JsapiPay, input).await
    }

    /// JSAPI payment through the gateway's hosted cashier.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration, or
    /// [`GatewayError::Transport`] if the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "ltzf.jsapi_convenient_pay",
            skip_all,
            fields(out_trade_no = %input.order.out_trade_no),
            err
        )
    )]
    pub async fn jsapi_convenient_pay(
        &self,
        input: &RedirectPayInput,
    ) -> Result<LtzfResponse<JsapiConvenientData>, GatewayError> {
        self.call(LtzfOperation::JsapiConvenient, input).await
    }

    /// In-app payment.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration, or
    /// [`GatewayError::Transport`] if the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "ltzf.app_pay",
            skip_all,
            fields(out_trade_no = %input.order.out_trade_no),
            err
        )
    )]
    pub async fn app_pay(
        &self,
        input: &AppPayInput,
    ) -> Result<LtzfResponse<AppPayData>, GatewayError> {
        self.call(LtzfOperation::AppPay, input).await
    }

    /// Mini program payment.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration, or
    /// [`GatewayError::Transport`] if the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "ltzf.mini_program_pay",
            skip_all,
            fields(out_trade_no = %input.order.out_trade_no),
            err
        )
    )]
    pub async fn mini_program_pay(
        &self,
        input: &MiniProgramPayInput,
    ) -> Result<LtzfResponse<MiniProgramPayData>, GatewayError> {
        self.call(LtzfOperation::MiniProgramPay, input).await
    }

    /// Refunds a paid order, fully or partially.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration, or
    /// [`GatewayError::Transport`] if the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "ltzf.refund_order",
            skip_all,
            fields(out_trade_no = %input.out_trade_no, out_refund_no = %input.out_refund_no),
            err
        )
    )]
    pub async fn refund_order(
        &self,
        input: &RefundOrderInput,
    ) -> Result<LtzfResponse<RefundOrderData>, GatewayError> {
        self.call(LtzfOperation::RefundOrder, input).await
    }

    /// Starts the OAuth redirect that resolves the payer's `openid`. `data`
    /// is the URL to send the payer to.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration, or
    /// [`GatewayError::Transport`] if the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "ltzf.get_wechat_openid", skip_all, err)
    )]
    pub async fn get_wechat_openid(
        &self,
        input: &GetWechatOpenidInput,
    ) -> Result<LtzfResponse<String>, GatewayError> {
        self.call(LtzfOperation::GetWechatOpenid, input).await
    }

    /// Looks up a payment order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration, or
    /// [`GatewayError::Transport`] if the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "ltzf.get_pay_order",
            skip_all,
            fields(out_trade_no = %input.out_trade_no),
            err
        )
    )]
    pub async fn get_pay_order(
        &self,
        input: &GetPayOrderInput,
    ) -> Result<LtzfResponse<PayOrderData>, GatewayError> {
        self.call(LtzfOperation::GetPayOrder, input).await
    }

    /// Looks up a refund.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration, or
    /// [`GatewayError::Transport`] if the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "ltzf.get_refund_order",
            skip_all,
            fields(out_refund_no = %input.out_refund_no),
            err
        )
    )]
    pub async fn get_refund_order(
        &self,
        input: &GetRefundOrderInput,
    ) -> Result<LtzfResponse<RefundStatusData>, GatewayError> {
        self.call(LtzfOperation::GetRefundOrder, input).await
    }

    async fn call<I, T>(
        &self,
        operation: LtzfOperation,
        input: &I,
    ) -> Result<LtzfResponse<T>, GatewayError>
    where
        I: Serialize + ?Sized,
        T: DeserializeOwned + Debug,
    {
        let session = self.session()?;
        let endpoint = operation.endpoint().ok_or_else(|| {
            GatewayError::InvalidParams(format!("{operation} is a callback and cannot be sent"))
        })?;
        let params = build_params(&session.config, operation, input, UnixTimestamp::now()?)?;

        #[cfg(feature = "telemetry")]
        if session.config.log {
            debug!(%operation, params = ?params.redacted(&["sign"]), "ltzf request");
        }

        let response: LtzfResponse<T> =
            dispatch(&session.api, FormRequest::post(endpoint, params)).await?;

        #[cfg(feature = "telemetry")]
        if session.config.log {
            debug!(
                %operation,
                code = response.code,
                msg = %response.msg,
                request_id = ?response.request_id,
                data = ?response.data,
                "ltzf response"
            );
        }

        Ok(response)
    }
}

pub(crate) fn field_names(fields: &[LtzfField]) -> Vec<&'static str> {
    fields.iter().copied().map(LtzfField::as_str).collect()
}

/// Merges the configuration into `input` and signs the result.
///
/// Caller-supplied callback URLs win over configured defaults; `mch_id` and
/// `timestamp` always come from the configuration and the clock.
fn build_params<I>(
    config: &LtzfConfig,
    operation: LtzfOperation,
    input: &I,
    timestamp: UnixTimestamp,
) -> Result<Params, GatewayError>
where
    I: Serialize + ?Sized,
{
    let mut params = Params::from_serializable(input)?;
    params.insert("mch_id", config.mch_id.as_str());
    params.insert("timestamp", timestamp);

    if operation.is_payment()
        && let Some(appid) = config.developer_appid.as_deref().filter(|s| !s.is_empty())
    {
        params.insert("developer_appid", appid);
    }

    let default_notify = match operation.notify_target() {
        NotifyTarget::Payment => Some(config.notify_url.as_str()),
        NotifyTarget::Refund => config.refund_url.as_deref(),
        NotifyTarget::None => None,
    };
    if let Some(url) = default_notify.filter(|s| !s.is_empty())
        && params.get_text("notify_url").is_none()
    {
        params.insert("notify_url", url);
    }

    if operation.uses_return_url()
        && !config.return_url.is_empty()
        && params.get_text("return_url").is_none()
    {
        params.insert("return_url", config.return_url.as_str());
    }

    let fields = field_names(config.sign_fields(operation));
    let canonical = canonicalize(&params, Some(fields.as_slice()), SIGN_STYLE.order);
    params.insert("sign", sign(&canonical, &config.key, &SIGN_STYLE));
    Ok(params)
}

#[cfg(test)]
mod tests {
    use paygw::ParamValue;

    use super::*;

    const AT: UnixTimestamp = UnixTimestamp::from_secs(1_700_000_000);

    fn config() -> LtzfConfig {
        LtzfConfig::new(
            "https://pay.example",
            "abc123",
            "M1001",
            "https://cb/n",
            "https://cb/r",
        )
    }

    fn keys(params: &Params) -> Vec<&str> {
        params.iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn test_refund_signature() {
        let input = RefundOrderInput {
            out_trade_no: "T1".into(),
            out_refund_no: "R1".into(),
            refund_fee: "10.00".into(),
            refund_desc: Some("damaged".into()),
            notify_url: None,
        };
        let params = build_params(&config(), LtzfOperation::RefundOrder, &input, AT).unwrap();
        assert_eq!(
            keys(&params),
            [
                "out_trade_no",
                "out_refund_no",
                "refund_fee",
                "refund_desc",
                "mch_id",
                "timestamp",
                "sign"
            ]
        );
        assert_eq!(params.get_text("timestamp").as_deref(), Some("1700000000"));
        assert_eq!(
            params.get_text("sign").as_deref(),
            Some("2694009A65503B31D50AA38C3B218B36")
        );
    }

    #[test]
    fn test_refund_uses_refund_callback() {
        let input = RefundOrderInput {
            out_trade_no: "T1".into(),
            out_refund_no: "R1".into(),
            refund_fee: "10.00".into(),
            refund_desc: None,
            notify_url: None,
        };
        let config = config().with_refund_url("https://cb/refund");
        let params = build_params(&config, LtzfOperation::RefundOrder, &input, AT).unwrap();
        assert_eq!(params.get_text("notify_url").as_deref(), Some("https://cb/refund"));
        assert!(!params.contains_key("return_url"));
    }

    #[test]
    fn test_scan_pay_merges_config_and_skips_unsigned_fields() {
        let input = PayOrder::new("T1", "0.01", "Coffee").with_attach("x");
        let config = config().with_developer_appid("dev1");
        let params = build_params(&config, LtzfOperation::ScanPay, &input, AT).unwrap();
        assert_eq!(params.get_text("notify_url").as_deref(), Some("https://cb/n"));
        assert_eq!(params.get_text("developer_appid").as_deref(), Some("dev1"));
        assert!(!params.contains_key("return_url"));
        assert_eq!(
            params.get_text("sign").as_deref(),
            Some("E66D340270501DAC80A3D0A8DB01325C")
        );
    }

    #[test]
    fn test_caller_callback_wins() {
        let input = RedirectPayInput {
            order: PayOrder::new("T1", "0.01", "Coffee").with_notify_url("https://other/n"),
            return_url: Some("https://other/r".into()),
        };
        let params = build_params(&config(), LtzfOperation::H5Pay, &input, AT).unwrap();
        assert_eq!(params.get_text("notify_url").as_deref(), Some("https://other/n"));
        assert_eq!(params.get_text("return_url").as_deref(), Some("https://other/r"));

        let input = RedirectPayInput::from(PayOrder::new("T1", "0.01", "Coffee"));
        let params = build_params(&config(), LtzfOperation::H5Pay, &input, AT).unwrap();
        assert_eq!(params.get_text("return_url").as_deref(), Some("https://cb/r"));
    }

    #[test]
    fn test_queries_carry_no_callbacks() {
        let input = GetPayOrderInput {
            out_trade_no: "T1".into(),
        };
        let config = config().with_developer_appid("dev1");
        let params = build_params(&config, LtzfOperation::GetPayOrder, &input, AT).unwrap();
        assert_eq!(keys(&params), ["out_trade_no", "mch_id", "timestamp", "sign"]);
    }

    #[test]
    fn test_override_narrows_signed_fields() {
        let input = PayOrder::new("T1", "0.01", "Coffee");
        let config = config().with_sign_fields(
            LtzfOperation::ScanPay,
            [LtzfField::MchId, LtzfField::OutTradeNo, LtzfField::Timestamp],
        );
        let params = build_params(&config, LtzfOperation::ScanPay, &input, AT).unwrap();
        assert_eq!(
            params.get_text("sign").as_deref(),
            Some("C521A6F707CBD3A7580460D7D1B8EC82")
        );
        assert_eq!(params.get_text("total_fee").as_deref(), Some("0.01"));
    }

    #[test]
    fn test_sign_params_requires_configuration() {
        let client = LtzfClient::new();
        let params: Params = [("mch_id", "M1001")].into_iter().collect();
        assert!(matches!(
            client.sign_params(&params),
            Err(GatewayError::NotConfigured { provider: "ltzf" })
        ));
        assert!(client
            .signed_params(LtzfOperation::ScanPay, &PayOrder::new("T1", "0.01", "Coffee"))
            .is_err());
    }

    #[test]
    fn test_sign_params_signs_everything_given() {
        let client = LtzfClient::new();
        client.configure(config()).unwrap();
        let params: Params = [("mch_id", "M1001"), ("body", "Coffee"), ("sign", "old")]
            .into_iter()
            .collect();
        assert_eq!(
            client.sign_params(&params).unwrap(),
            "283106109CA21220263FC51FF76D6CDA"
        );
    }

    #[test]
    fn test_signed_params_stamps_current_time() {
        let client = LtzfClient::new();
        client.configure(config()).unwrap();
        let params = client
            .signed_params(LtzfOperation::ScanPay, &PayOrder::new("T1", "0.01", "Coffee"))
            .unwrap();
        let Some(ParamValue::Text(ts)) = params.get("timestamp") else {
            panic!("timestamp missing");
        };
        assert!(ts.parse::<u64>().unwrap() > 1_700_000_000);
    }

    #[test]
    fn test_failed_configure_keeps_previous() {
        let client = LtzfClient::new();
        client.configure(config()).unwrap();
        let mut broken = config();
        broken.key = String::new();
        assert!(client.configure(broken).is_err());
        assert!(client.is_ready());
        assert_eq!(client.session().unwrap().config.key, "abc123");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let client = LtzfClient::new();
        let mut config = config();
        config.base_url = "not a url".into();
        assert!(client.configure(config).is_err());
        assert!(!client.is_ready());
    }
}
