//! Unix timestamps carried in signed gateway requests.
//!
//! Gateways that require a timestamp expect decimal seconds since the epoch,
//! sent as a string field and included in the signature.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, SystemTimeError};

use crate::params::ParamValue;

/// Seconds since the Unix epoch (1970-01-01T00:00:00Z).
///
/// Serialized as a stringified integer, the form gateways put on the wire:
///
/// ```json
/// "1700000000"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Ord, Eq, Hash)]
pub struct UnixTimestamp(u64);

impl Serialize for UnixTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for UnixTimestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(secs) => Ok(Self(secs)),
            Raw::Text(s) => s
                .trim()
                .parse::<u64>()
                .map(Self)
                .map_err(|_| serde::de::Error::custom("timestamp must be a non-negative integer")),
        }
    }
}

impl Display for UnixTimestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<UnixTimestamp> for ParamValue {
    fn from(ts: UnixTimestamp) -> Self {
        Self::Text(ts.to_string())
    }
}

impl UnixTimestamp {
    /// Creates a timestamp from raw seconds.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Returns the current system time.
    ///
    /// # Errors
    ///
    /// Returns an error if the system clock is set before the Unix epoch.
    pub fn now() -> Result<Self, SystemTimeError> {
        let secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)?
            .as_secs();
        Ok(Self(secs))
    }

    /// Returns the raw seconds.
    #[must_use]
    pub const fn as_secs(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_string() {
        let ts = UnixTimestamp::from_secs(1_700_000_000);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "\"1700000000\"");
        assert_eq!(ParamValue::from(ts).to_text().as_deref(), Some("1700000000"));
    }

    #[test]
    fn test_deserializes_string_or_number() {
        let a: UnixTimestamp = serde_json::from_str("\"1700000000\"").unwrap();
        let b: UnixTimestamp = serde_json::from_str("1700000000").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<UnixTimestamp>("\"-1\"").is_err());
    }

    #[test]
    fn test_now_is_seconds() {
        let now = UnixTimestamp::now().unwrap();
        // Milliseconds would be thirteen digits for any date this century.
        assert_eq!(now.to_string().len(), 10);
    }
}
