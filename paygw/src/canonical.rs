//! Deterministic reduction of a parameter set to the form that gets signed.

use crate::params::{ParamValue, Params};

/// Keys that carry the signature itself and are never part of the signed text.
pub const RESERVED_KEYS: [&str; 2] = ["sign", "sign_type"];

/// How canonical pairs are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldOrder {
    /// Ascending byte order of the key.
    #[default]
    Sorted,
    /// The iteration order of the allow-list. Falls back to [`FieldOrder::Sorted`]
    /// when no allow-list is given.
    Declared,
}

/// Filtered, ordered `(key, value)` pairs ready for concatenation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalParams(Vec<(String, String)>);

impl CanonicalParams {
    /// Returns the pairs in signing order.
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    /// Returns `true` if nothing survived filtering.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the keys in signing order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    /// Joins the pairs as `k1=v1&k2=v2`, without any encoding.
    #[must_use]
    pub fn to_sign_string(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Filters and orders `params` for signing.
///
/// With an allow-list, only listed keys are considered. Keys with an absent or
/// empty value and the [`RESERVED_KEYS`] are always dropped. The survivors are
/// sorted by key unless `order` is [`FieldOrder::Declared`] and an allow-list
/// is present, in which case the allow-list order is kept.
#[must_use]
pub fn canonicalize(
    params: &Params,
    allowed: Option<&[&str]>,
    order: FieldOrder,
) -> CanonicalParams {
    let signable = |key: &str| {
        params
            .get(key)
            .filter(|value| !value.is_blank())
            .and_then(ParamValue::to_text)
    };

    let mut pairs: Vec<(String, String)> = Vec::new();
    match allowed {
        Some(fields) if order == FieldOrder::Declared => {
            for &field in fields {
                if RESERVED_KEYS.contains(&field) || pairs.iter().any(|(k, _)| k == field) {
                    continue;
                }
                if let Some(text) = signable(field) {
                    pairs.push((field.to_owned(), text));
                }
            }
        }
        _ => {
            for (key, value) in params.iter() {
                if RESERVED_KEYS.contains(&key) || value.is_blank() {
                    continue;
                }
                if allowed.is_some_and(|fields| !fields.contains(&key)) {
                    continue;
                }
                if let Some(text) = value.to_text() {
                    pairs.push((key.to_owned(), text));
                }
            }
        }
    }

    if order == FieldOrder::Sorted || allowed.is_none() {
        pairs.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));
    }

    CanonicalParams(pairs)
}
