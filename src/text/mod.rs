//! Shared text: the collaborative text structure edits are applied to
//!
//! Conflict resolution between replicas belongs to the CRDT engine (yrs, the
//! Rust port of Yjs). This module describes the contract the rest of the crate
//! relies on and ships [`TextDoc`], the adapter implementing it over a
//! `yrs::TextRef`.
//!
//! # Contract
//!
//! - Full-text projection, which may fail when the text holds embeds
//! - Position-addressed insert/delete inside a transaction
//! - Transactions commit atomically and emit exactly one [`TextEvent`]
//!   (or none when nothing changed)
//! - Observers are invoked synchronously after every commit, local or remote
//!
//! Positions and lengths count UTF-16 code units, as Yjs does.
//!
//! # Example
//!
//! ```rust
//! use synckit_collab::text::{ReplicaId, SharedText, TextDoc, TextTransaction};
//!
//! let doc = TextDoc::new(ReplicaId::new(1));
//! doc.transact(|txn| txn.insert(0, "Hello")).unwrap();
//! doc.transact(|txn| txn.insert(5, " World")).unwrap();
//!
//! assert_eq!(doc.text().unwrap(), "Hello World");
//! ```

mod convert;
mod delta;
mod doc;
mod origin;

pub use delta::{normalize, Attributes, Content, Delta};
pub use doc::{TextDoc, Transaction, DEFAULT_TEXT_NAME};
pub use origin::{OriginTag, ReplicaId};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the shared text when an operation cannot be applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextError {
    #[error("Position {position} out of bounds (length: {length})")]
    PositionOutOfBounds { position: usize, length: usize },

    #[error("Range {start}..{end} out of bounds (length: {length})")]
    RangeOutOfBounds {
        start: usize,
        end: usize,
        length: usize,
    },

    #[error("A transaction is already in progress on this text")]
    TransactionInProgress,

    /// The caller's view of the text no longer matches the shared text
    #[error("Snapshot is stale: expected {expected} units, text has {actual}")]
    StaleSnapshot { expected: usize, actual: usize },

    #[error("Malformed update: {0}")]
    MalformedUpdate(String),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

/// Full-text projection failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("Embedded content at position {index} has no text projection")]
    EmbeddedContent { index: usize },

    #[error("Text is locked by a transaction in progress")]
    Busy,
}

/// Notification emitted once per committed transaction
///
/// Carries the full-text projection taken right after the commit, since the
/// document cannot be read again until the transaction is released.
#[derive(Debug, Clone, PartialEq)]
pub struct TextEvent {
    delta: Vec<Delta>,
    origin: Option<OriginTag>,
    text: Result<String, ProjectionError>,
}

impl TextEvent {
    pub fn new(
        delta: Vec<Delta>,
        origin: Option<OriginTag>,
        text: Result<String, ProjectionError>,
    ) -> Self {
        Self {
            delta,
            origin,
            text,
        }
    }

    /// Changes made by the transaction, relative to the state before it
    pub fn delta(&self) -> &[Delta] {
        &self.delta
    }

    /// Origin tag of the transaction, if it was tagged
    pub fn origin(&self) -> Option<&OriginTag> {
        self.origin.as_ref()
    }

    /// Full text after the commit
    pub fn text(&self) -> Result<&str, ProjectionError> {
        self.text.as_deref().map_err(Clone::clone)
    }
}

/// A single position-addressed edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Edit {
    Insert { index: usize, text: String },
    Delete { index: usize, len: usize },
}

/// Update delivered by the transport from another replica
///
/// `payload` is a Yjs v1 update. It is merged into the local document as
/// one transaction carrying the sender's origin tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUpdate {
    pub origin: OriginTag,
    pub payload: Vec<u8>,
}

/// Mutation primitives available inside a transaction
pub trait TextTransaction {
    /// Insert plain text at a position
    fn insert(&mut self, index: usize, text: &str) -> Result<(), TextError>;

    /// Insert text carrying formatting attributes
    fn insert_with_attributes(
        &mut self,
        index: usize,
        text: &str,
        attributes: Attributes,
    ) -> Result<(), TextError>;

    /// Insert a non-text object occupying one position
    fn insert_embed(&mut self, index: usize, value: serde_json::Value) -> Result<(), TextError>;

    /// Remove `len` units starting at `index`
    fn delete(&mut self, index: usize, len: usize) -> Result<(), TextError>;

    /// Apply formatting attributes to a range. A `null` value clears the key.
    fn format(&mut self, index: usize, len: usize, attributes: Attributes) -> Result<(), TextError>;

    /// Current length as seen inside the transaction
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full text as it was when the transaction started
    fn snapshot(&self) -> Result<String, ProjectionError>;

    fn apply(&mut self, edit: &Edit) -> Result<(), TextError> {
        match edit {
            Edit::Insert { index, text } => self.insert(*index, text),
            Edit::Delete { index, len } => self.delete(*index, *len),
        }
    }
}

/// A shared text structure owned by a CRDT engine
pub trait SharedText {
    type Transaction: TextTransaction;

    /// Identity of the replica this handle edits on behalf of
    fn replica(&self) -> ReplicaId;

    /// Full text projection
    fn text(&self) -> Result<String, ProjectionError>;

    /// Run `f` as one atomic transaction tagged with `origin`.
    ///
    /// If `f` returns an error nothing is applied and no event is emitted.
    fn transact_with<F>(&self, origin: Option<OriginTag>, f: F) -> Result<(), TextError>
    where
        F: FnOnce(&mut Self::Transaction) -> Result<(), TextError>;

    /// Run `f` as a transaction tagged with the local replica's origin
    fn transact<F>(&self, f: F) -> Result<(), TextError>
    where
        F: FnOnce(&mut Self::Transaction) -> Result<(), TextError>,
    {
        self.transact_with(Some(self.replica().origin()), f)
    }

    /// Register a mutation observer. Dropping the subscription unregisters it.
    fn observe<F>(&self, f: F) -> Subscription
    where
        F: Fn(&TextEvent) + 'static;
}

/// Handle keeping an observer registered
///
/// The observer is removed when the subscription is dropped.
#[must_use = "dropping a subscription unregisters the observer"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
