//! Diff Translator: replace-old-with-new as a minimal atomic edit
//!
//! Rather than replacing the whole document (which would clobber concurrent
//! remote edits), the old and new snapshots are diffed character by
//! character and only the changed spans are turned into insert/delete
//! operations, applied inside a single transaction.
//!
//! # Example
//!
//! ```rust
//! use synckit_collab::diff::apply_text_change;
//! use synckit_collab::text::{ReplicaId, SharedText, TextDoc, TextTransaction};
//!
//! let doc = TextDoc::new(ReplicaId::new(1));
//! doc.transact(|txn| txn.insert(0, "hello")).unwrap();
//!
//! apply_text_change(&doc, "hello", "hallo").unwrap();
//! assert_eq!(doc.text().unwrap(), "hallo");
//! ```

use crate::error::Result;
use crate::text::{Edit, SharedText, TextError, TextTransaction};
use crate::util::text_len;
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use tracing::debug;

/// One span of a diff between two snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "text", rename_all = "lowercase")]
pub enum DiffOperation {
    Kept(String),
    Inserted(String),
    Deleted(String),
}

impl DiffOperation {
    pub fn text(&self) -> &str {
        match self {
            DiffOperation::Kept(text)
            | DiffOperation::Inserted(text)
            | DiffOperation::Deleted(text) => text,
        }
    }

    /// Span length in UTF-16 code units
    pub fn len(&self) -> usize {
        text_len(self.text())
    }

    pub fn is_empty(&self) -> bool {
        self.text().is_empty()
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, DiffOperation::Kept(_))
    }
}

/// Compute kept/inserted/deleted spans turning `old` into `new`.
///
/// Uses a character-level Myers diff; consecutive characters with the same
/// tag are coalesced into one span.
pub fn compute_diff(old: &str, new: &str) -> Vec<DiffOperation> {
    let diff = TextDiff::from_chars(old, new);
    let mut operations: Vec<DiffOperation> = Vec::new();

    for change in diff.iter_all_changes() {
        let value = change.value();
        match (change.tag(), operations.last_mut()) {
            (ChangeTag::Equal, Some(DiffOperation::Kept(span)))
            | (ChangeTag::Insert, Some(DiffOperation::Inserted(span)))
            | (ChangeTag::Delete, Some(DiffOperation::Deleted(span))) => span.push_str(value),
            (ChangeTag::Equal, _) => operations.push(DiffOperation::Kept(value.to_string())),
            (ChangeTag::Insert, _) => operations.push(DiffOperation::Inserted(value.to_string())),
            (ChangeTag::Delete, _) => operations.push(DiffOperation::Deleted(value.to_string())),
        }
    }

    operations
}

/// Translate diff spans into position-addressed edits.
///
/// Walks the spans with a write cursor: kept spans advance it, inserted
/// spans are written at it and advance it, deleted spans are removed at it
/// without advancing (the following content shifts left).
pub fn plan_edits(operations: &[DiffOperation]) -> Vec<Edit> {
    let mut cursor = 0;
    let mut edits = Vec::new();

    for operation in operations {
        match operation {
            DiffOperation::Kept(text) => cursor += text_len(text),
            DiffOperation::Inserted(text) => {
                edits.push(Edit::Insert {
                    index: cursor,
                    text: text.clone(),
                });
                cursor += text_len(text);
            }
            DiffOperation::Deleted(text) => edits.push(Edit::Delete {
                index: cursor,
                len: text_len(text),
            }),
        }
    }

    edits
}

/// Units kept before the first change (0 when nothing changed)
pub fn change_position(operations: &[DiffOperation]) -> usize {
    let mut position = 0;
    for operation in operations {
        if operation.is_change() {
            return position;
        }
        position += operation.len();
    }
    0
}

/// Total units inserted plus deleted
pub fn change_length(operations: &[DiffOperation]) -> usize {
    operations
        .iter()
        .filter(|op| op.is_change())
        .map(DiffOperation::len)
        .sum()
}

/// Replace `old_text` with `new_text` on the shared text.
///
/// Both arguments are complete snapshots. Identical snapshots are a no-op:
/// no transaction runs and no notification is emitted. Otherwise all edits
/// are applied in one transaction tagged with the local replica's origin,
/// so observers see exactly one notification.
///
/// # Errors
///
/// Returns [`SyncError::TransactionRejected`](crate::SyncError::TransactionRejected)
/// if `old_text` is not the shared text's current content
/// ([`TextError::StaleSnapshot`]) or the shared text refuses an edit. Nothing
/// is applied in either case.
pub fn apply_text_change<T: SharedText>(text: &T, old_text: &str, new_text: &str) -> Result<()> {
    if old_text == new_text {
        return Ok(());
    }

    let operations = compute_diff(old_text, new_text);
    let edits = plan_edits(&operations);

    debug!(
        spans = operations.len(),
        edits = edits.len(),
        changed = change_length(&operations),
        "translating text change"
    );

    text.transact(|txn| {
        let current = txn.snapshot()?;
        if current != old_text {
            return Err(TextError::StaleSnapshot {
                expected: text_len(old_text),
                actual: text_len(&current),
            });
        }
        edits.iter().try_for_each(|edit| txn.apply(edit))
    })?;
    Ok(())
}
