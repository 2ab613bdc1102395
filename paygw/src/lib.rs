#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for signed payment-gateway clients.
//!
//! This crate holds the provider-independent half of a gateway client: the
//! parameter model, deterministic canonicalization, MD5 request signatures,
//! the configure-once configuration store and the helper that ships a signed
//! parameter set over the [`paygw_http`] request pipeline.
//!
//! Provider crates (`paygw-ltzf`, `paygw-sevenpay`) combine these pieces with
//! their own field whitelists, endpoints and digest styles.
//!
//! # Modules
//!
//! - [`params`] - Ordered flat key/value parameter sets
//! - [`canonical`] - Filtering and ordering of parameters for signing
//! - [`sign`] - Digest computation, verification and secret masking
//! - [`config`] - Process-lifetime configuration store with readiness checks
//! - [`dispatch`] - Form-encoded submission of signed parameter sets
//! - [`timestamp`] - Unix timestamps carried in signed requests
//! - [`error`] - Error taxonomy shared by all gateway clients
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation

pub mod canonical;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod params;
pub mod sign;
pub mod timestamp;

pub use canonical::{CanonicalParams, FieldOrder, canonicalize};
pub use config::{ConfigStore, require_non_empty};
pub use dispatch::{FormMethod, FormRequest, dispatch};
pub use error::{ErrorKind, GatewayError};
pub use params::{ParamValue, Params};
pub use sign::{DigestAlgorithm, DigestCase, SecretPlacement, SignStyle, mask_secret, sign, verify};
pub use timestamp::UnixTimestamp;
