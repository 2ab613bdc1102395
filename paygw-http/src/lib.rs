#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP request pipeline for payment-gateway and REST clients.
//!
//! [`ApiClient`] wraps a [`reqwest`] client in a [`reqwest_middleware`] chain
//! whose stages are chosen through [`PipelineOptions`] and always composed in
//! the same order:
//!
//! 1. [`BearerAuth`] - attaches `Authorization: Bearer <token>`
//! 2. [`LimitBodySize`] - rejects oversized POST/PUT/PATCH bodies locally
//! 3. [`PreventRepeat`] - cancels an in-flight duplicate when a new one starts
//! 4. [`Unauthorized`] - reports 401/403 and application-level session codes
//! 5. [`Retry`] - retries network failures and idempotent 5xx responses
//!
//! Every stage is optional. Local rejections surface as
//! [`ApiError::Rejected`] and never reach the network.
//!
//! # Modules
//!
//! - [`client`] - [`ApiClient`], its builder, enveloped responses and the process-wide handle
//! - [`plugins`] - The pipeline stages
//! - [`constants`] - Defaults shared by the stages
//! - [`error`] - Pipeline error types
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation

pub mod client;
pub mod constants;
pub mod error;
pub mod plugins;

pub use client::{
    ApiClient, ApiClientBuilder, BaseResponse, Enveloped, PipelineOptions, global, init_global,
};
pub use error::{ApiError, Rejection};
pub use plugins::{
    BearerAuth, LimitBodySize, PreventRepeat, Retry, RetryPolicy, Unauthorized, UnauthorizedEvent,
};
