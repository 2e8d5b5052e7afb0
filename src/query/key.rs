//! Structural query keys.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// One segment of a query key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeySegment {
  Bool(bool),
  Int(i64),
  Str(String),
}

impl fmt::Display for KeySegment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      KeySegment::Bool(b) => write!(f, "{}", b),
      KeySegment::Int(i) => write!(f, "{}", i),
      KeySegment::Str(s) => write!(f, "{:?}", s),
    }
  }
}

impl From<&str> for KeySegment {
  fn from(s: &str) -> Self {
    KeySegment::Str(s.to_string())
  }
}

impl From<String> for KeySegment {
  fn from(s: String) -> Self {
    KeySegment::Str(s)
  }
}

impl From<i64> for KeySegment {
  fn from(i: i64) -> Self {
    KeySegment::Int(i)
  }
}

impl From<bool> for KeySegment {
  fn from(b: bool) -> Self {
    KeySegment::Bool(b)
  }
}

/// Identity of a cacheable request: an ordered sequence of segments.
///
/// Two keys are equal iff their segments are structurally equal, so
/// `["show", "hamlet"]` built at two different call sites hit the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryKey(Vec<KeySegment>);

impl QueryKey {
  pub fn new<I, S>(segments: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<KeySegment>,
  {
    Self(segments.into_iter().map(Into::into).collect())
  }

  /// Append a segment, returning the extended key.
  pub fn with(mut self, segment: impl Into<KeySegment>) -> Self {
    self.0.push(segment.into());
    self
  }

  /// Whether `self` matches the leading segments of `other`.
  ///
  /// `["shows"]` is a prefix of `["shows", "hamlet"]` and of itself.
  pub fn is_prefix_of(&self, other: &QueryKey) -> bool {
    other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
  }

  /// Stable, fixed-length digest of the key, used as a storage key.
  pub fn cache_hash(&self) -> String {
    // Serializing the segments keeps "1" and 1 distinct
    let input = serde_json::to_string(&self.0).unwrap_or_else(|_| self.to_string());

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[")?;
    for (i, segment) in self.0.iter().enumerate() {
      if i > 0 {
        write!(f, ", ")?;
      }
      write!(f, "{}", segment)?;
    }
    write!(f, "]")
  }
}
