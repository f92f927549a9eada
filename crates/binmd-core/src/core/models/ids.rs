use serde::{Deserialize, Serialize};
use std::fmt;

/// Persistent global identity of an atom.
///
/// Unlike storage indices, a tag survives neighbor-list rebuilds, periodic remapping
/// and ghost replication, so it is the only safe key for state that must outlive a
/// single list build.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AtomTag(pub u64);

impl AtomTag {
    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for AtomTag {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for AtomTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
