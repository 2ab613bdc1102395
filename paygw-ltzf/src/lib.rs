#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Client for the LTZF WeChat Pay aggregation gateway.
//!
//! Every request is a form POST carrying `mch_id`, a Unix `timestamp` and an
//! upper-case MD5 `sign` computed over a per-operation field whitelist with
//! the merchant secret appended as `&key=<secret>`. Callback verification
//! uses the same rule over the callback's own whitelist.
//!
//! # Modules
//!
//! - [`client`] - [`LtzfClient`]: configuration, signing and the operations
//! - [`config`] - [`LtzfConfig`] and sign-field overrides
//! - [`operation`] - Operation names, endpoints and signing whitelists
//! - [`types`] - Request inputs and typed response payloads
//! - [`notify`] - Callback payloads and their verification
//!
//! # Feature Flags
//!
//! - `telemetry` (default) - Configuration and request events via `tracing`

pub mod client;
pub mod config;
pub mod notify;
pub mod operation;
pub mod types;

pub use client::{LtzfClient, SIGN_STYLE};
pub use config::{LtzfConfig, SignFilter};
pub use notify::{PayNotify, RefundNotify};
pub use operation::{LtzfField, LtzfOperation};
pub use types::{
    AppPayData, AppPayInput, GetPayOrderInput, GetRefundOrderInput, GetWechatOpenidInput,
    JsapiConvenientData, JsapiPayData, JsapiPayInput, LtzfResponse, MiniProgramPayData,
    MiniProgramPayInput, PayOrder, PayOrderData, RedirectPayInput, RefundOrderData,
    RefundOrderInput, RefundStatusData, ScanPayData,
};

/// Provider name used in errors and events.
pub const PROVIDER: &str = "ltzf";
