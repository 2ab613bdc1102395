//! Ordered flat parameter sets exchanged with payment gateways.
//!
//! Gateways speak `application/x-www-form-urlencoded`: every request and every
//! callback is a flat list of scalar key/value pairs. [`Params`] models that
//! list while keeping insertion order, so the form body mirrors the order in
//! which the client assembled it (caller input first, config-derived fields and
//! the signature last).

use std::fmt::{self, Display, Formatter};

use serde::de::{Deserialize, Deserializer};
use serde::Serialize;
use serde_json::Value;

use crate::error::GatewayError;
use crate::sign::mask_secret;

/// A single scalar parameter value.
///
/// [`ParamValue::Null`] stands for an absent (`undefined`/`null`) value: it is
/// never signed and never serialized into a form body.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// A string value, sent verbatim.
    Text(String),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer that does not fit in `i64`.
    UInt(u64),
    /// A floating point number.
    Float(f64),
    /// A boolean, rendered as `true`/`false`.
    Bool(bool),
    /// An absent value.
    Null,
}

impl ParamValue {
    /// Returns `true` if this value is excluded from signing: absent, or an
    /// empty string.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Returns the textual form used on the wire, or `None` for [`ParamValue::Null`].
    #[must_use]
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Returns the inner string slice if this is a [`ParamValue::Text`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    fn from_json(key: &str, value: Value) -> Result<Self, GatewayError> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::String(s) => Ok(Self::Text(s)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(Self::UInt(u))
                } else {
                    n.as_f64().map(Self::Float).ok_or_else(|| {
                        GatewayError::InvalidParams(format!("`{key}` is not a finite number"))
                    })
                }
            }
            Value::Array(_) | Value::Object(_) => Err(GatewayError::InvalidParams(format!(
                "`{key}` must be a scalar value"
            ))),
        }
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::UInt(u) => write!(f, "{u}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => Ok(()),
        }
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(Self::UInt(value), Self::Int)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// An insertion-ordered flat mapping from parameter name to [`ParamValue`].
///
/// Inserting a key that already exists replaces its value without moving it,
/// so overriding a caller-supplied field keeps the field's original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

impl Params {
    /// Creates an empty parameter set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Flattens a serializable struct or map into a parameter set.
    ///
    /// Fields serialized as `null` become [`ParamValue::Null`]; skipped fields
    /// are simply absent.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidParams`] if the value does not serialize
    /// to an object, or if any field is an array or nested object.
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Self, GatewayError> {
        let value = serde_json::to_value(value)
            .map_err(|e| GatewayError::InvalidParams(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(GatewayError::InvalidParams(
                "parameters must serialize to a flat object".to_owned(),
            ));
        };
        let mut params = Self::new();
        for (key, value) in map {
            let value = ParamValue::from_json(&key, value)?;
            params.insert(key, value);
        }
        Ok(params)
    }

    /// Parses an `application/x-www-form-urlencoded` string, as delivered in a
    /// callback body or query string. Repeated keys keep the last value.
    #[must_use]
    pub fn from_form_urlencoded(input: &str) -> Self {
        url::form_urlencoded::parse(input.trim_start_matches('?').as_bytes())
            .map(|(k, v)| (k.into_owned(), ParamValue::Text(v.into_owned())))
            .collect()
    }

    /// Inserts or replaces a value, returning the previous value if any.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Option<ParamValue> {
        let key = key.into();
        let value = value.into();
        if let Some((_, slot)) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            return Some(std::mem::replace(slot, value));
        }
        self.entries.push((key, value));
        None
    }

    /// Removes a key, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Returns the value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    /// Returns the textual value for `key` if it is present and not blank.
    #[must_use]
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.get(key)
            .filter(|v| !v.is_blank())
            .and_then(ParamValue::to_text)
    }

    /// Returns `true` if `key` is present (even with a blank value).
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of entries, including blank ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the `(key, text)` pairs sent on the wire.
    ///
    /// Absent values are dropped; empty strings are kept.
    #[must_use]
    pub fn to_form_pairs(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.to_text().map(|text| (k.clone(), text)))
            .collect()
    }

    /// Returns the wire pairs with the values of `sensitive` keys masked by
    /// [`mask_secret`], for logging.
    #[must_use]
    pub fn redacted(&self, sensitive: &[&str]) -> Vec<(String, String)> {
        self.to_form_pairs()
            .into_iter()
            .map(|(k, v)| {
                if sensitive.contains(&k.as_str()) {
                    let masked = mask_secret(&v);
                    (k, masked)
                } else {
                    (k, v)
                }
            })
            .collect()
    }

    /// Serializes the wire pairs as a percent-encoded form string.
    #[must_use]
    pub fn to_form_urlencoded(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.to_form_pairs())
            .finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        params.extend(iter);
        params
    }
}

impl<K, V> Extend<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<'de> Deserialize<'de> for Params {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = serde_json::Map::<String, Value>::deserialize(deserializer)?;
        let mut params = Self::new();
        for (key, value) in map {
            let value = ParamValue::from_json(&key, value).map_err(serde::de::Error::custom)?;
            params.insert(key, value);
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Input {
        out_trade_no: &'static str,
        total_fee: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        attach: Option<&'static str>,
        count: u32,
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut params = Params::new();
        params.insert("a", "1");
        params.insert("b", "2");
        let previous = params.insert("a", "3");
        assert_eq!(previous, Some(ParamValue::Text("1".into())));
        let keys: Vec<_> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["a", "b"]);
        assert_eq!(params.get_text("a").as_deref(), Some("3"));
    }

    #[test]
    fn test_numbers_render_naturally() {
        assert_eq!(ParamValue::Int(10).to_string(), "10");
        assert_eq!(ParamValue::Float(10.0).to_string(), "10");
        assert_eq!(ParamValue::Float(0.01).to_string(), "0.01");
        assert_eq!(ParamValue::Bool(true).to_string(), "true");
        assert_eq!(ParamValue::from(u64::MAX).to_string(), u64::MAX.to_string());
    }

    #[test]
    fn test_from_serializable_flattens_scalars() {
        let params = Params::from_serializable(&Input {
            out_trade_no: "T1",
            total_fee: 0.5,
            attach: None,
            count: 2,
        })
        .unwrap();
        assert_eq!(params.get_text("out_trade_no").as_deref(), Some("T1"));
        assert_eq!(params.get_text("total_fee").as_deref(), Some("0.5"));
        assert_eq!(params.get_text("count").as_deref(), Some("2"));
        assert!(!params.contains_key("attach"));
    }

    #[test]
    fn test_from_serializable_rejects_nested() {
        let nested = serde_json::json!({ "a": { "b": 1 } });
        assert!(matches!(
            Params::from_serializable(&nested),
            Err(GatewayError::InvalidParams(_))
        ));
        assert!(Params::from_serializable(&"scalar").is_err());
    }

    #[test]
    fn test_form_pairs_skip_null_keep_empty() {
        let mut params = Params::new();
        params.insert("a", "x y");
        params.insert("b", ParamValue::Null);
        params.insert("c", "");
        assert_eq!(
            params.to_form_pairs(),
            vec![("a".to_owned(), "x y".to_owned()), ("c".to_owned(), String::new())]
        );
        assert_eq!(params.to_form_urlencoded(), "a=x+y&c=");
    }

    #[test]
    fn test_redacted_masks_only_listed_keys() {
        let params: Params = [("pid", "1001"), ("key", "supersecret"), ("sign", "abcdef")]
            .into_iter()
            .collect();
        assert_eq!(
            params.redacted(&["key", "sign"]),
            vec![
                ("pid".to_owned(), "1001".to_owned()),
                ("key".to_owned(), "su*******et".to_owned()),
                ("sign".to_owned(), "ab**ef".to_owned()),
            ]
        );
    }

    #[test]
    fn test_form_urlencoded_roundtrip_input() {
        let params = Params::from_form_urlencoded("?code=0&attach=hello%20world&sign=ABC");
        assert_eq!(params.get_text("attach").as_deref(), Some("hello world"));
        assert_eq!(params.get_text("sign").as_deref(), Some("ABC"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_deserialize_from_json_callback() {
        let params: Params =
            serde_json::from_str(r#"{"code":"0","total_fee":"0.01","pay_no":null}"#).unwrap();
        assert_eq!(params.get("pay_no"), Some(&ParamValue::Null));
        assert_eq!(params.get_text("pay_no"), None);
        assert_eq!(params.get_text("total_fee").as_deref(), Some("0.01"));
    }
}
