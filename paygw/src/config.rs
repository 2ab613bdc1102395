//! Configure-once, read-everywhere storage for provider configuration.
//!
//! A [`ConfigStore`] is owned by a gateway client. It starts empty, is filled
//! by a validated `configure` call and is then read by every operation. Reads
//! hand out an [`Arc`] snapshot, so a concurrent reconfiguration never tears a
//! configuration that an in-flight operation is using.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::GatewayError;

/// Holds at most one validated configuration of type `T`.
pub struct ConfigStore<T> {
    provider: &'static str,
    slot: RwLock<Option<Arc<T>>>,
}

impl<T> ConfigStore<T> {
    /// Creates an empty store for `provider`.
    #[must_use]
    pub const fn new(provider: &'static str) -> Self {
        Self {
            provider,
            slot: RwLock::new(None),
        }
    }

    /// Name of the provider this store belongs to.
    #[must_use]
    pub const fn provider(&self) -> &'static str {
        self.provider
    }

    /// Replaces the whole configuration and returns the previous one.
    ///
    /// Callers validate `config` before calling this, so a rejected
    /// configuration never displaces a good one.
    pub fn replace(&self, config: T) -> Option<Arc<T>> {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.replace(Arc::new(config))
    }

    /// Returns a snapshot of the current configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotConfigured`] if nothing has been stored yet.
    pub fn get(&self) -> Result<Arc<T>, GatewayError> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(GatewayError::not_configured(self.provider))
    }

    /// Returns `true` once a configuration has been stored.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Drops the stored configuration.
    pub fn clear(&self) {
        self.slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl<T> fmt::Debug for ConfigStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("provider", &self.provider)
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Fails with [`GatewayError::InvalidConfig`] when `value` is empty or blank.
///
/// # Errors
///
/// Returns an error naming `provider` and `field` if `value` is blank.
pub fn require_non_empty(
    provider: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), GatewayError> {
    if value.trim().is_empty() {
        return Err(GatewayError::InvalidConfig {
            provider,
            field,
            reason: "must not be empty".to_owned(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_get_before_configure_is_not_configured() {
        let store: ConfigStore<String> = ConfigStore::new("demo");
        assert!(!store.is_ready());
        let err = store.get().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConfigured);
        assert!(err.to_string().starts_with("demo is not configured"));
    }

    #[test]
    fn test_replace_swaps_whole_value() {
        let store = ConfigStore::new("demo");
        assert!(store.replace("first".to_owned()).is_none());
        let snapshot = store.get().unwrap();
        let previous = store.replace("second".to_owned()).unwrap();
        assert_eq!(*previous, "first");
        assert_eq!(*snapshot, "first");
        assert_eq!(*store.get().unwrap(), "second");
    }

    #[test]
    fn test_clear() {
        let store = ConfigStore::new("demo");
        store.replace(1_u8);
        store.clear();
        assert!(!store.is_ready());
    }

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty("demo", "key", "abc").is_ok());
        let err = require_non_empty("demo", "key", "  ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(
            err.to_string(),
            "invalid demo configuration: `key` must not be empty"
        );
    }
}
