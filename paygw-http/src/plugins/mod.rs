//! Pipeline stages.
//!
//! Each stage is an independent [`reqwest_middleware::Middleware`].
//! [`PipelineOptions`](crate::PipelineOptions) decides which ones run;
//! [`ApiClientBuilder::build`](crate::ApiClientBuilder::build) decides their order.

mod auth;
mod limit_body_size;
mod prevent_repeat;
mod retry;
mod unauthorized;

pub use auth::BearerAuth;
pub use limit_body_size::LimitBodySize;
pub use prevent_repeat::PreventRepeat;
pub use retry::{Retry, RetryPolicy};
pub use unauthorized::{Unauthorized, UnauthorizedEvent};

use reqwest::Request;

/// Returns the in-memory body of `req`, or an empty slice for bodiless or
/// streaming requests.
fn body_bytes(req: &Request) -> &[u8] {
    req.body().and_then(reqwest::Body::as_bytes).unwrap_or_default()
}
