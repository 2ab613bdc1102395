//! Defaults shared by the pipeline stages.

use std::time::Duration;

/// Per-request timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Largest request body [`LimitBodySize`](crate::LimitBodySize) lets through by default (5 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Application-level `code` that signals an invalid session by default.
pub const DEFAULT_UNAUTHORIZED_CODE: i64 = 1001;

/// HTTP statuses that signal an invalid session by default.
pub const DEFAULT_UNAUTHORIZED_STATUSES: [u16; 2] = [401, 403];

/// Retries attempted after the first failure by default.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay unit for linear backoff: attempt `n` waits `n` times this.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Content type of form-encoded request bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
