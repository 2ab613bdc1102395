//! The 7Pay gateway client.

use std::fmt::Debug;
use std::sync::Arc;

use paygw::{
    ConfigStore, DigestAlgorithm, DigestCase, FieldOrder, FormRequest, GatewayError, Params,
    SecretPlacement, SignStyle, canonicalize, dispatch, sign,
};
use paygw_http::{ApiClient, PipelineOptions};
use serde::de::DeserializeOwned;
#[cfg(feature = "telemetry")]
use tracing::{debug, info, instrument, warn};

use crate::PROVIDER;
use crate::config::SevenPayConfig;
use crate::types::{
    ApiPayInput, ApiPayResponse, BalanceResponse, JumpPayInput, OrderQueryInput,
    OrderQueryResponse, RefundInput, RefundResponse,
};

/// Sorted pairs, secret appended with no separator, lower-case MD5.
pub const SIGN_STYLE: SignStyle = SignStyle {
    order: FieldOrder::Sorted,
    secret: SecretPlacement::Append,
    case: DigestCase::Lower,
    algorithm: DigestAlgorithm::Md5,
};

const SUBMIT_PATH: &str = "/submit.php";
const MAPI_PATH: &str = "/mapi.php";
const API_PATH: &str = "/api.php";
const REFUND_PATH: &str = "/api.php?act=refund";

/// Values never written to logs in clear.
#[cfg_attr(not(feature = "telemetry"), allow(dead_code))]
const SENSITIVE: &[&str] = &["key", "sign"];

pub(crate) struct Session {
    pub(crate) config: SevenPayConfig,
    api: ApiClient,
}

/// Client for a 7Pay gateway.
///
/// Checkout operations are signed; account operations (`balance_query`,
/// `order_query`, `refund`) authenticate with `pid` and `key` as the
/// gateway's API expects.
#[derive(Debug)]
pub struct SevenPayClient {
    pub(crate) store: ConfigStore<Session>,
    pipeline: PipelineOptions,
}

impl Default for SevenPayClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SevenPayClient {
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
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidConfig`] for a missing required field,
    /// or [`GatewayError::Transport`] if the base URL is not a valid URL. The
    /// previous configuration stays active in both cases.
    pub fn configure(&self, config: SevenPayConfig) -> Result<(), GatewayError> {
        config.validate()?;
        let api = ApiClient::builder(config.base_url.clone())
            .timeout(config.timeout())
            .pipeline(self.pipeline.clone())
            .build()?;

        #[cfg(feature = "telemetry")]
        if config.log {
            info!(
                base_url = %config.base_url,
                pid = %config.pid,
                key = %paygw::mask_secret(&config.key),
                timeout_ms = config.timeout_ms,
                notify_url = %config.notify_url,
                return_url = %config.return_url,
                "7pay configured"
            );
            if config.notify_url.is_empty() {
                warn!("7pay has no default notify_url; orders without one get no callback");
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

    /// Builds a signed link to the gateway's hosted checkout page. Nothing
    /// is sent; redirect the payer to the returned URL.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration.
    pub fn jump_pay(&self, input: &JumpPayInput) -> Result<String, GatewayError> {
        let session = self.session()?;
        let config = &session.config;
        let mut params = Params::from_serializable(input)?;
        params.insert("pid", config.pid.as_str());
        params.insert("cid", config.cid.as_deref());
        fill_default(&mut params, "notify_url", &config.notify_url);
        fill_default(&mut params, "return_url", &config.return_url);
        attach_signature(&mut params, &config.key);

        let mut url = session.api.url(SUBMIT_PATH)?;
        url.set_query(Some(&params.to_form_urlencoded()));
        Ok(url.into())
    }

    /// Creates an order server-side and returns the payment URL or QR code.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration, or
    /// [`GatewayError::Transport`] if the request fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "sevenpay.api_pay",
            skip_all,
            fields(out_trade_no = %input.out_trade_no),
            err
        )
    )]
    pub async fn api_pay(&self, input: &ApiPayInput) -> Result<ApiPayResponse, GatewayError> {
        let session = self.session()?;
        let config = &session.config;
        let mut params = Params::from_serializable(input)?;
        params.insert("pid", config.pid.as_str());
        params.insert("cid", config.cid.as_deref());
        fill_default(&mut params, "notify_url", &config.notify_url);
        attach_signature(&mut params, &config.key);
        send(&session, FormRequest::post(MAPI_PATH, params)).await
    }

    /// Reads the merchant balance.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration, or
    /// [`GatewayError::Transport`] if the request fails.
    #[cfg_attr(feature = "telemetry", instrument(name = "sevenpay.balance_query", skip_all, err))]
    pub async fn balance_query(&self) -> Result<BalanceResponse, GatewayError> {
        let session = self.session()?;
        let params = account_params(&session.config, "balance", &Params::new());
        send(&session, FormRequest::get(API_PATH, params)).await
    }

    /// Looks up one order.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration,
    /// [`GatewayError::InvalidParams`] if neither order number is given, or
    /// [`GatewayError::Transport`] if the request fails.
    #[cfg_attr(feature = "telemetry", instrument(name = "sevenpay.order_query", skip_all, err))]
    pub async fn order_query(
        &self,
        input: &OrderQueryInput,
    ) -> Result<OrderQueryResponse, GatewayError> {
        let session = self.session()?;
        if input.is_empty() {
            return Err(GatewayError::InvalidParams(
                "order_query needs trade_no or out_trade_no".to_owned(),
            ));
        }
        let params = account_params(&session.config, "order", &Params::from_serializable(input)?);
        send(&session, FormRequest::get(API_PATH, params)).await
    }

    /// Refunds an order, fully or partially.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] before configuration,
    /// [`GatewayError::InvalidParams`] if neither order number is given, or
    /// [`GatewayError::Transport`] if the request fails.
    #[cfg_attr(feature = "telemetry", instrument(name = "sevenpay.refund", skip_all, err))]
    pub async fn refund(&self, input: &RefundInput) -> Result<RefundResponse, GatewayError> {
        let session = self.session()?;
        let lookup = OrderQueryInput {
            trade_no: input.trade_no.clone(),
            out_trade_no: input.out_trade_no.clone(),
        };
        if lookup.is_empty() {
            return Err(GatewayError::InvalidParams(
                "refund needs trade_no or out_trade_no".to_owned(),
            ));
        }
        let params = account_params(&session.config, "refund", &Params::from_serializable(input)?);
        send(&session, FormRequest::post(REFUND_PATH, params)).await
    }
}

/// Sets `key` to the configured `value` unless the caller supplied a
/// non-empty one.
fn fill_default(params: &mut Params, key: &str, value: &str) {
    if !value.is_empty() && params.get_text(key).is_none() {
        params.insert(key, value);
    }
}

/// Signs everything present and appends `sign_type` and `sign`.
fn attach_signature(params: &mut Params, key: &str) {
    let canonical = canonicalize(params, None, SIGN_STYLE.order);
    let signature = sign(&canonical, key, &SIGN_STYLE);
    params.insert("sign_type", SIGN_STYLE.algorithm.sign_type());
    params.insert("sign", signature);
}

/// `act`, `pid` and `key` followed by the caller's fields.
fn account_params(config: &SevenPayConfig, act: &str, fields: &Params) -> Params {
    let mut params: Params = [
        ("act", act),
        ("pid", config.pid.as_str()),
        ("key", config.key.as_str()),
    ]
    .into_iter()
    .collect();
    params.extend(fields.iter().map(|(k, v)| (k, v.clone())));
    params
}

async fn send<T>(session: &Session, request: FormRequest) -> Result<T, GatewayError>
where
    T: DeserializeOwned + Debug,
{
    #[cfg(feature = "telemetry")]
    if session.config.log {
        debug!(path = request.path, params = ?request.params.redacted(SENSITIVE), "7pay request");
    }

    let response: T = dispatch(&session.api, request).await?;

    #[cfg(feature = "telemetry")]
    if session.config.log {
        debug!(?response, "7pay response");
    }

    Ok(response)
}
