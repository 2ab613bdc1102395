#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Client for 7Pay gateways.
//!
//! 7Pay speaks the EPay merchant protocol: checkout requests are signed with
//! a lower-case MD5 over all non-empty fields sorted by name, with the
//! merchant secret appended directly, and carry `sign_type=MD5`. Account
//! lookups and refunds go to `api.php` and authenticate with `pid` and `key`.
//!
//! # Modules
//!
//! - [`client`] - [`SevenPayClient`]: configuration and the operations
//! - [`config`] - [`SevenPayConfig`]
//! - [`types`] - Request inputs and responses
//! - [`notify`] - Callback payload and verification
//!
//! # Feature Flags
//!
//! - `telemetry` (default) - Configuration and request events via `tracing`

pub mod client;
pub mod config;
pub mod notify;
pub mod types;

pub use client::{SIGN_STYLE, SevenPayClient};
pub use config::SevenPayConfig;
pub use notify::{NOTIFY_ACK, SevenPayNotify};
pub use types::{
    ApiPayInput, ApiPayResponse, BalanceResponse, JumpPayInput, OrderQueryInput,
    OrderQueryResponse, RefundInput, RefundResponse,
};

/// Provider name used in errors and events.
pub const PROVIDER: &str = "7pay";
