use std::fmt;

use derive_more::{Constructor, Display, From};
use serde::{Deserialize, Serialize};

/// The character used to join the two halves of a [`PairKey`] or [`DirectedKey`].
///
/// Must not appear in any [`TokenId`] the system is configured with. Hex-prefixed
/// addresses (`0x...`) never contain `-`, so it is safe for the common case; callers
/// feeding in a different token-identifier grammar must pick a different separator by
/// choosing `TokenId`s that avoid it.
pub const SEP: char = '-';

/// Opaque address-like identifier for a token. Compared by case-sensitive equality.
#[derive(
    Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Deserialize, Serialize,
)]
pub struct TokenId(pub String);

impl TokenId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TokenId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Canonicalised, unordered key for a pair of tokens: `min(a,b) <SEP> max(a,b)`.
///
/// Two orderings of the same pair of tokens always yield an equal `PairKey`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PairKey(String);

impl PairKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reconstruct a `PairKey` from an already-canonical string, e.g. one read back out
    /// of a serialized snapshot. Does not re-canonicalise; callers must only use this
    /// with strings that were themselves produced by [`pair_key`].
    pub fn from_canonical(raw: String) -> Self {
        Self(raw)
    }
}

/// Ordered `(source, target)` key used to index orders by the direction they trade in.
///
/// Distinct from its reverse: `DirectedKey::new(a, b) != DirectedKey::new(b, a)` whenever
/// `a != b`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Constructor, Deserialize, Serialize)]
pub struct DirectedKey {
    source: TokenId,
    target: TokenId,
}

impl DirectedKey {
    pub fn source(&self) -> &TokenId {
        &self.source
    }

    pub fn target(&self) -> &TokenId {
        &self.target
    }
}

impl fmt::Display for DirectedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEP}{}", self.source, self.target)
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({})", self.0)
    }
}

/// Canonicalise two token identifiers into their unordered [`PairKey`].
pub fn pair_key(a: &TokenId, b: &TokenId) -> PairKey {
    let (min, max) = if a.as_str() <= b.as_str() { (a, b) } else { (b, a) };
    PairKey(format!("{min}{SEP}{max}"))
}

/// Build the [`DirectedKey`] naming the `source -> target` trade direction. Not sorted.
pub fn directed_key(source: &TokenId, target: &TokenId) -> DirectedKey {
    DirectedKey::new(source.clone(), target.clone())
}

/// Split a [`PairKey`] back into `(min, max)` token order. Callers must not assume this
/// matches whatever order the pair was originally added in.
pub fn from_pair_key(key: &PairKey) -> Option<(TokenId, TokenId)> {
    let (min, max) = key.0.split_once(SEP)?;
    Some((TokenId(min.to_string()), TokenId(max.to_string())))
}
