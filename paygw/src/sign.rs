//! Keyed digests over canonical parameters.
//!
//! Both supported gateways sign `k1=v1&k2=v2...` with the merchant secret
//! mixed in as plain text and hash the result with MD5. They differ in where
//! the secret goes and in the case of the hex digest; [`SignStyle`] captures
//! those differences so the computation itself stays a single pure function.

use subtle::ConstantTimeEq;

use crate::canonical::{CanonicalParams, FieldOrder, canonicalize};
use crate::params::Params;

/// Where the merchant secret is placed relative to the joined pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretPlacement {
    /// Appended as one more pair: `...&key=<secret>`.
    KeyParam,
    /// Appended directly with no separator: `...<secret>`.
    Append,
}

/// Letter case of the hex digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestCase {
    /// `0-9A-F`
    Upper,
    /// `0-9a-f`
    Lower,
}

/// Hash function applied to the string to sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    /// MD5, hex encoded.
    #[default]
    Md5,
}

impl DigestAlgorithm {
    /// Value sent in a `sign_type` field for this algorithm.
    #[must_use]
    pub const fn sign_type(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
        }
    }

    fn digest_hex(self, input: &[u8]) -> String {
        match self {
            Self::Md5 => hex::encode(md5::compute(input).0),
        }
    }
}

/// A provider's signing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignStyle {
    /// Ordering applied during canonicalization.
    pub order: FieldOrder,
    /// Where the secret goes.
    pub secret: SecretPlacement,
    /// Case of the hex digest.
    pub case: DigestCase,
    /// Digest algorithm.
    pub algorithm: DigestAlgorithm,
}

impl SignStyle {
    /// Builds the exact string that is hashed.
    #[must_use]
    pub fn string_to_sign(&self, canonical: &CanonicalParams, secret: &str) -> String {
        let joined = canonical.to_sign_string();
        match self.secret {
            SecretPlacement::KeyParam => format!("{joined}&key={secret}"),
            SecretPlacement::Append => format!("{joined}{secret}"),
        }
    }
}

/// Computes the signature of already-canonicalized parameters.
///
/// Pure: identical inputs always produce the identical digest.
#[must_use]
pub fn sign(canonical: &CanonicalParams, secret: &str, style: &SignStyle) -> String {
    let digest = style
        .algorithm
        .digest_hex(style.string_to_sign(canonical, secret).as_bytes());
    match style.case {
        DigestCase::Upper => digest.to_ascii_uppercase(),
        DigestCase::Lower => digest,
    }
}

/// Recomputes the signature of `params` and compares it with `expected`.
///
/// `params` goes through the same canonicalization (with `allowed` as the
/// allow-list) that produced the original signature. The comparison ignores
/// ASCII case and runs in constant time over the digest. Returns `false` when
/// `expected` is absent or empty.
#[must_use]
pub fn verify(
    params: &Params,
    allowed: Option<&[&str]>,
    secret: &str,
    expected: Option<&str>,
    style: &SignStyle,
) -> bool {
    let Some(expected) = expected.map(str::trim).filter(|s| !s.is_empty()) else {
        return false;
    };
    let canonical = canonicalize(params, allowed, style.order);
    let computed = sign(&canonical, secret, style).to_ascii_lowercase();
    let expected = expected.to_ascii_lowercase();
    computed.len() == expected.len() && bool::from(computed.as_bytes().ct_eq(expected.as_bytes()))
}

/// Masks a secret for logging: keeps the first two and last two characters.
///
/// Secrets of four characters or fewer are fully hidden.
#[must_use]
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_owned();
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 4))
}
