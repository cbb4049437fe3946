// ── Asset identity ──
//
// AssetKey is the only identifier in the topology. Components are
// addressed by their owner's key plus one trailing character, so the
// owner of any component is recoverable from the key alone.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque asset identifier.
///
/// Top-level assets carry short keys (`"1111"`); their components extend
/// the owner's key by one character (`"11111"` .. `"11118"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetKey(String);

impl AssetKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key of the asset that would own this one as a component.
    ///
    /// Strips the last character. `None` for keys too short to be nested.
    pub fn owner(&self) -> Option<AssetKey> {
        let (idx, _) = self.0.char_indices().last()?;
        if idx == 0 {
            return None;
        }
        Some(Self(self.0[..idx].to_owned()))
    }

    /// Whether `self` is addressed as a component of `owner`.
    pub fn is_component_of(&self, owner: &AssetKey) -> bool {
        self.owner().as_ref() == Some(owner)
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AssetKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<String> for AssetKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AssetKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<AssetKey> for String {
    fn from(key: AssetKey) -> Self {
        key.0
    }
}

impl Borrow<str> for AssetKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
