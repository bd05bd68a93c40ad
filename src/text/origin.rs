//! Replica identity and transaction origin tags

use serde::{Deserialize, Serialize};
use std::fmt;

const SAFE_INTEGER_MASK: u64 = (1 << 53) - 1;

/// Identity of the local replica
///
/// Every local transaction is tagged with the replica's identity so that
/// observers can tell their own edits from edits delivered by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReplicaId(u64);

impl ReplicaId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Generate a random replica identity.
    ///
    /// Kept within 53 bits so JavaScript peers read it as a safe integer.
    pub fn random() -> Self {
        let (high, low) = uuid::Uuid::new_v4().as_u64_pair();
        Self((high ^ low) & SAFE_INTEGER_MASK)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Origin tag carried by transactions made by this replica
    pub fn origin(&self) -> OriginTag {
        OriginTag::from(*self)
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque tag attached to a transaction describing where it came from
///
/// Tags compare by equality only; they carry no ordering semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OriginTag(String);

impl OriginTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<ReplicaId> for OriginTag {
    fn from(id: ReplicaId) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for OriginTag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl From<String> for OriginTag {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

impl fmt::Display for OriginTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
