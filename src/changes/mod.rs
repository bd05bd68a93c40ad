//! Change Extractor: typed records for every committed mutation
//!
//! An observer registered on the shared text turns each notification, local
//! or remote, into a [`ChangeRecord`]: what kind of edit it was, where it
//! happened, how many UTF-16 units it touched, who made it, and how large the
//! document and the change are in bytes. Records land in a 20-entry,
//! most-recent-first history meant for inspection only.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use synckit_collab::changes::{ChangeExtractor, OperationKind, Source};
//! use synckit_collab::text::{ReplicaId, SharedText, TextDoc, TextTransaction};
//!
//! let replica = ReplicaId::new(1);
//! let doc = TextDoc::new(replica);
//! let extractor = Rc::new(ChangeExtractor::new(replica.origin()));
//! let _sub = ChangeExtractor::attach(&extractor, &doc);
//!
//! doc.transact(|txn| txn.insert(0, "hi")).unwrap();
//!
//! let latest = extractor.latest().unwrap();
//! assert_eq!(latest.operation_kind, OperationKind::Insert);
//! assert_eq!(latest.length, 2);
//! assert_eq!(latest.origin, Source::Local);
//! ```

mod clock;
mod extractor;
mod history;
mod summary;

pub use clock::{to_datetime, MonotonicClock};
pub use extractor::{ChangeExtractor, ObserverFault, PLACEHOLDER_TEXT};
pub use history::{BoundedHistory, HISTORY_LIMIT};
pub use summary::{classify, summarize_delta, DeltaSummary};

use crate::text::OriginTag;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of edit a notification carried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Delete,
    /// Several kinds of changes in one batch (including formatting)
    Mixed,
    /// No delta content
    Initial,
}

impl OperationKind {
    /// True when the record describes an actual edit
    pub fn is_edit(&self) -> bool {
        !matches!(self, OperationKind::Initial)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Insert => "insert",
            OperationKind::Delete => "delete",
            OperationKind::Mixed => "mixed",
            OperationKind::Initial => "initial",
        };
        f.write_str(name)
    }
}

/// Where a transaction came from, relative to the local replica
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "tag", rename_all = "lowercase")]
pub enum Origin {
    /// Tagged with the local replica's identity
    Local,
    /// Tagged by someone else
    Remote(OriginTag),
    /// Untagged transaction
    Unknown,
}

impl Origin {
    /// Compare a transaction's tag against the local identity
    pub fn classify(tag: Option<&OriginTag>, local: &OriginTag) -> Self {
        match tag {
            Some(tag) if tag == local => Origin::Local,
            Some(tag) => Origin::Remote(tag.clone()),
            None => Origin::Unknown,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Origin::Local)
    }

    /// Raw tag of the transaction, if it carried one
    pub fn tag<'a>(&'a self, local: &'a OriginTag) -> Option<&'a OriginTag> {
        match self {
            Origin::Local => Some(local),
            Origin::Remote(tag) => Some(tag),
            Origin::Unknown => None,
        }
    }

    /// Local/remote bucket for display; untagged transactions count as remote
    pub fn source(&self) -> Source {
        match self {
            Origin::Local => Source::Local,
            Origin::Remote(_) | Origin::Unknown => Source::Remote,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Local => f.write_str("local"),
            Origin::Remote(tag) => write!(f, "remote:{}", tag),
            Origin::Unknown => f.write_str("unknown"),
        }
    }
}

/// Two-way local/remote split shown to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Local,
    Remote,
}

/// One observed mutation of the shared text
///
/// Created only by [`ChangeExtractor`]; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    /// Opaque unique identifier
    pub id: String,
    /// Milliseconds since the Unix epoch, non-decreasing across records
    pub timestamp: u64,
    /// Local/remote bucket; untagged transactions count as remote
    pub origin: Source,
    /// Tag the transaction carried, if any
    pub origin_tag: Option<OriginTag>,
    pub operation_kind: OperationKind,
    /// Offset of the first changed span, in UTF-16 units
    pub position: usize,
    /// Changed units (insertions + deletions + re-formatting)
    pub length: usize,
    /// Human-readable rendering of the delta
    pub rendered_delta: String,
    /// Full-text snapshot taken when the record was built
    pub text: String,
    /// Snapshot size in bytes
    pub full_size: usize,
    /// Rendered delta size in bytes
    pub change_size: usize,
    /// Set when the record is a best-effort fallback after a fault
    pub degraded: bool,
}
