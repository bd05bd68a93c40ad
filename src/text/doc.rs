//! TextDoc: the shared text backed by a yrs document
//!
//! Edits made inside [`SharedText::transact_with`] are bounds-checked and
//! buffered; they reach the yrs document in one transaction only when the
//! whole closure succeeds, so a rejected edit leaves nothing behind. Remote
//! updates arrive as Yjs v1 payloads and merge with whatever was edited
//! locally in the meantime.

use super::convert::{attrs_from_json, delta_from_yrs, json_to_any};
use super::{
    Attributes, OriginTag, ProjectionError, RemoteUpdate, ReplicaId, SharedText, Subscription,
    TextError, TextEvent, TextTransaction,
};
use crate::util::text_len;
use std::cell::Cell;
use std::rc::Rc;
use tracing::debug;
use yrs::types::text::YChange;
use yrs::types::Attrs;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{
    Any, Doc, Observable, OffsetKind, Options, Out, ReadTxn, StateVector, Text, TextRef, Transact,
    TransactionMut, Update,
};

/// Name of the shared text inside the document when none is configured
pub const DEFAULT_TEXT_NAME: &str = "quill";

/// Full text of `text`, failing on the first embed
fn project<T: ReadTxn>(text: &TextRef, txn: &T) -> Result<String, ProjectionError> {
    let mut projected = String::new();
    let mut index = 0;

    for chunk in text.diff(txn, YChange::identity) {
        match chunk.insert {
            Out::Any(Any::String(part)) => {
                index += text_len(&part);
                projected.push_str(&part);
            }
            _ => return Err(ProjectionError::EmbeddedContent { index }),
        }
    }

    Ok(projected)
}

fn to_offset(value: usize, length: usize) -> Result<u32, TextError> {
    u32::try_from(value).map_err(|_| TextError::PositionOutOfBounds {
        position: value,
        length,
    })
}

/// Edit validated against the transaction's running length
#[derive(Debug)]
enum PendingEdit {
    Insert {
        index: u32,
        chunk: String,
        attributes: Option<Attrs>,
    },
    Embed {
        index: u32,
        value: Any,
    },
    Remove {
        index: u32,
        len: u32,
    },
    Format {
        index: u32,
        len: u32,
        attributes: Attrs,
    },
}

impl PendingEdit {
    fn apply(self, text: &TextRef, txn: &mut TransactionMut) {
        match self {
            PendingEdit::Insert {
                index,
                chunk,
                attributes: None,
            } => text.insert(txn, index, &chunk),
            PendingEdit::Insert {
                index,
                chunk,
                attributes: Some(attributes),
            } => text.insert_with_attributes(txn, index, &chunk, attributes),
            PendingEdit::Embed { index, value } => {
                text.insert_embed(txn, index, value);
            }
            PendingEdit::Remove { index, len } => text.remove_range(txn, index, len),
            PendingEdit::Format {
                index,
                len,
                attributes,
            } => text.format(txn, index, len, attributes),
        }
    }
}

/// Buffered edits of an open transaction
pub struct Transaction {
    doc: Doc,
    text: TextRef,
    len: usize,
    pending: Vec<PendingEdit>,
}

impl Transaction {
    fn begin(owner: &TextDoc) -> Result<Self, TextError> {
        let len = {
            let txn = owner
                .doc
                .try_transact()
                .map_err(|_| TextError::TransactionInProgress)?;
            owner.text.len(&txn) as usize
        };

        Ok(Self {
            doc: owner.doc.clone(),
            text: owner.text.clone(),
            len,
            pending: Vec::new(),
        })
    }

    fn check_position(&self, index: usize) -> Result<u32, TextError> {
        if index > self.len {
            return Err(TextError::PositionOutOfBounds {
                position: index,
                length: self.len,
            });
        }
        to_offset(index, self.len)
    }

    fn check_range(&self, index: usize, len: usize) -> Result<(u32, u32), TextError> {
        match index.checked_add(len) {
            Some(end) if end <= self.len => {
                Ok((to_offset(index, self.len)?, to_offset(len, self.len)?))
            }
            _ => Err(TextError::RangeOutOfBounds {
                start: index,
                end: index.saturating_add(len),
                length: self.len,
            }),
        }
    }

    fn push_insert(
        &mut self,
        index: usize,
        chunk: &str,
        attributes: Option<Attrs>,
    ) -> Result<(), TextError> {
        let index = self.check_position(index)?;
        if chunk.is_empty() {
            return Ok(());
        }
        self.len += text_len(chunk);
        self.pending.push(PendingEdit::Insert {
            index,
            chunk: chunk.to_string(),
            attributes,
        });
        Ok(())
    }

    /// Write the buffered edits to the document under `origin`
    fn commit(self, origin: Option<&OriginTag>) -> Result<usize, TextError> {
        let mut txn = match origin {
            Some(tag) => self.doc.try_transact_mut_with(tag.as_str()),
            None => self.doc.try_transact_mut(),
        }
        .map_err(|_| TextError::TransactionInProgress)?;

        let edits = self.pending.len();
        for edit in self.pending {
            edit.apply(&self.text, &mut txn);
        }
        // Observers run when `txn` drops here
        Ok(edits)
    }
}

impl TextTransaction for Transaction {
    fn insert(&mut self, index: usize, text: &str) -> Result<(), TextError> {
        self.push_insert(index, text, None)
    }

    fn insert_with_attributes(
        &mut self,
        index: usize,
        text: &str,
        attributes: Attributes,
    ) -> Result<(), TextError> {
        let attributes = (!attributes.is_empty()).then(|| attrs_from_json(&attributes));
        self.push_insert(index, text, attributes)
    }

    fn insert_embed(&mut self, index: usize, value: serde_json::Value) -> Result<(), TextError> {
        let index = self.check_position(index)?;
        self.len += 1;
        self.pending.push(PendingEdit::Embed {
            index,
            value: json_to_any(&value),
        });
        Ok(())
    }

    fn delete(&mut self, index: usize, len: usize) -> Result<(), TextError> {
        let (index, count) = self.check_range(index, len)?;
        if count == 0 {
            return Ok(());
        }
        self.len -= len;
        self.pending.push(PendingEdit::Remove { index, len: count });
        Ok(())
    }

    fn format(&mut self, index: usize, len: usize, attributes: Attributes) -> Result<(), TextError> {
        let (index, count) = self.check_range(index, len)?;
        if count == 0 || attributes.is_empty() {
            return Ok(());
        }
        self.pending.push(PendingEdit::Format {
            index,
            len: count,
            attributes: attrs_from_json(&attributes),
        });
        Ok(())
    }

    fn len(&self) -> usize {
        self.len
    }

    fn snapshot(&self) -> Result<String, ProjectionError> {
        let txn = self.doc.try_transact().map_err(|_| ProjectionError::Busy)?;
        project(&self.text, &txn)
    }
}

/// Clears the in-transaction flag even if the transaction body panics
struct TransactionGuard(Rc<Cell<bool>>);

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Shared text of one replica, backed by a `yrs::Doc`
///
/// `TextDoc` is a cheap, cloneable handle; clones refer to the same text.
/// Edits and observer callbacks run to completion on the calling thread.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use synckit_collab::text::{Delta, ReplicaId, SharedText, TextDoc, TextTransaction};
///
/// let doc = TextDoc::new(ReplicaId::new(7));
/// let seen = Rc::new(RefCell::new(Vec::new()));
///
/// let sink = seen.clone();
/// let _sub = doc.observe(move |event| sink.borrow_mut().push(event.delta().to_vec()));
///
/// doc.transact(|txn| txn.insert(0, "hi")).unwrap();
/// assert_eq!(seen.borrow()[0], vec![Delta::insert("hi")]);
/// ```
#[derive(Clone)]
pub struct TextDoc {
    replica: ReplicaId,
    doc: Doc,
    text: TextRef,
    in_transaction: Rc<Cell<bool>>,
}

impl TextDoc {
    /// Create an empty text named [`DEFAULT_TEXT_NAME`] owned by `replica`
    pub fn new(replica: ReplicaId) -> Self {
        Self::with_name(replica, DEFAULT_TEXT_NAME)
    }

    /// Create an empty text called `name` inside a fresh document
    pub fn with_name(replica: ReplicaId, name: &str) -> Self {
        let doc = Doc::with_options(Options {
            client_id: replica.value(),
            offset_kind: OffsetKind::Utf16,
            ..Options::default()
        });
        let text = doc.get_or_insert_text(name);

        Self {
            replica,
            doc,
            text,
            in_transaction: Rc::new(Cell::new(false)),
        }
    }

    /// Merge an update produced by another replica
    pub fn apply_update(&self, update: &RemoteUpdate) -> Result<(), TextError> {
        let decoded = Update::decode_v1(&update.payload)
            .map_err(|err| TextError::MalformedUpdate(err.to_string()))?;

        let _guard = self.enter()?;
        let mut txn = self
            .doc
            .try_transact_mut_with(update.origin.as_str())
            .map_err(|_| TextError::TransactionInProgress)?;
        txn.apply_update(decoded)
            .map_err(|err| TextError::MalformedUpdate(err.to_string()))?;

        debug!(
            replica = %self.replica,
            origin = %update.origin,
            bytes = update.payload.len(),
            "merged remote update"
        );
        Ok(())
    }

    /// Encoded state vector, for asking a peer what is missing
    pub fn state_vector(&self) -> Result<Vec<u8>, TextError> {
        let txn = self
            .doc
            .try_transact()
            .map_err(|_| TextError::TransactionInProgress)?;
        Ok(txn.state_vector().encode_v1())
    }

    /// Encode everything a peer at `state_vector` is missing.
    ///
    /// An empty `state_vector` encodes the whole document.
    pub fn encode_update(&self, state_vector: &[u8]) -> Result<Vec<u8>, TextError> {
        let since = if state_vector.is_empty() {
            StateVector::default()
        } else {
            StateVector::decode_v1(state_vector)
                .map_err(|err| TextError::MalformedUpdate(err.to_string()))?
        };

        let txn = self
            .doc
            .try_transact()
            .map_err(|_| TextError::TransactionInProgress)?;
        Ok(txn.encode_state_as_update_v1(&since))
    }

    fn enter(&self) -> Result<TransactionGuard, TextError> {
        if self.in_transaction.replace(true) {
            return Err(TextError::TransactionInProgress);
        }
        Ok(TransactionGuard(Rc::clone(&self.in_transaction)))
    }
}

impl SharedText for TextDoc {
    type Transaction = Transaction;

    fn replica(&self) -> ReplicaId {
        self.replica
    }

    fn text(&self) -> Result<String, ProjectionError> {
        let txn = self.doc.try_transact().map_err(|_| ProjectionError::Busy)?;
        project(&self.text, &txn)
    }

    fn transact_with<F>(&self, origin: Option<OriginTag>, f: F) -> Result<(), TextError>
    where
        F: FnOnce(&mut Transaction) -> Result<(), TextError>,
    {
        let _guard = self.enter()?;
        let mut txn = Transaction::begin(self)?;
        f(&mut txn)?;

        if txn.pending.is_empty() {
            return Ok(());
        }

        let edits = txn.commit(origin.as_ref())?;
        debug!(
            replica = %self.replica,
            origin = origin.as_ref().map(OriginTag::as_str).unwrap_or("none"),
            edits,
            "committed text transaction"
        );
        Ok(())
    }

    fn observe<F>(&self, f: F) -> Subscription
    where
        F: Fn(&TextEvent) + 'static,
    {
        let text = self.text.clone();
        let subscription = self.text.observe(move |txn, event| {
            let delta = delta_from_yrs(event.delta(txn));
            if delta.is_empty() {
                return;
            }

            let origin = txn
                .origin()
                .map(|origin| OriginTag::from(String::from_utf8_lossy(origin.as_ref()).into_owned()));
            f(&TextEvent::new(delta, origin, project(&text, txn)));
        });

        Subscription::new(move || drop(subscription))
    }
}

impl std::fmt::Debug for TextDoc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextDoc")
            .field("replica", &self.replica)
            .field("client_id", &self.doc.client_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{Content, Delta};
    use serde_json::json;
    use std::cell::RefCell;

    fn doc_with(replica: u64, text: &str) -> TextDoc {
        let doc = TextDoc::new(ReplicaId::new(replica));
        doc.transact(|txn| txn.insert(0, text)).unwrap();
        doc
    }

    fn record_events(doc: &TextDoc) -> (Rc<RefCell<Vec<TextEvent>>>, Subscription) {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        let sub = doc.observe(move |event| sink.borrow_mut().push(event.clone()));
        (events, sub)
    }

    /// Bring `to` up to date with everything `from` has
    fn sync(from: &TextDoc, to: &TextDoc) {
        let payload = from.encode_update(&to.state_vector().unwrap()).unwrap();
        to.apply_update(&RemoteUpdate {
            origin: from.replica().origin(),
            payload,
        })
        .unwrap();
    }

    fn attrs(value: serde_json::Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_insert_and_delete() {
        let doc = doc_with(1, "Hello World");
        doc.transact(|txn| txn.delete(5, 6)).unwrap();
        assert_eq!(doc.text().unwrap(), "Hello");
    }

    #[test]
    fn test_transaction_emits_single_event() {
        let doc = doc_with(1, "hello");
        let (events, _sub) = record_events(&doc);

        doc.transact(|txn| {
            txn.delete(1, 1)?;
            txn.insert(1, "a")
        })
        .unwrap();

        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].text(), Ok("hallo"));
        assert_eq!(events[0].origin(), Some(&OriginTag::from("1")));
        assert_eq!(doc.text().unwrap(), "hallo");
    }

    #[test]
    fn test_failed_transaction_applies_nothing() {
        let doc = doc_with(1, "abc");
        let (events, _sub) = record_events(&doc);

        let result = doc.transact(|txn| {
            txn.insert(0, "zz")?;
            txn.delete(4, 10)
        });

        assert_eq!(
            result,
            Err(TextError::RangeOutOfBounds {
                start: 4,
                end: 14,
                length: 5
            })
        );
        assert_eq!(doc.text().unwrap(), "abc");
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_insert_out_of_bounds() {
        let doc = doc_with(1, "ab");
        let result = doc.transact(|txn| txn.insert(3, "x"));
        assert_eq!(
            result,
            Err(TextError::PositionOutOfBounds {
                position: 3,
                length: 2
            })
        );
    }

    #[test]
    fn test_nested_transaction_rejected() {
        let doc = doc_with(1, "ab");
        let inner = doc.clone();
        let result = doc.transact(|txn| {
            assert_eq!(
                inner.transact(|t| t.insert(0, "x")),
                Err(TextError::TransactionInProgress)
            );
            txn.insert(0, "y")
        });

        assert!(result.is_ok());
        assert_eq!(doc.text().unwrap(), "yab");
    }

    #[test]
    fn test_untagged_transaction_has_no_origin() {
        let doc = doc_with(1, "abc");
        let (events, _sub) = record_events(&doc);

        doc.transact_with(None, |txn| txn.delete(0, 1)).unwrap();

        assert_eq!(events.borrow()[0].origin(), None);
        assert_eq!(events.borrow()[0].delta(), &[Delta::Delete(1)]);
    }

    #[test]
    fn test_remote_update_carries_sender_origin() {
        let local = TextDoc::new(ReplicaId::new(1));
        let peer = doc_with(2, "remote");
        let (events, _sub) = record_events(&local);

        sync(&peer, &local);

        let events = events.borrow();
        assert_eq!(events[0].origin(), Some(&OriginTag::from("2")));
        assert_eq!(events[0].delta(), &[Delta::insert("remote")]);
        assert_eq!(local.text().unwrap(), "remote");
    }

    #[test]
    fn test_concurrent_edits_merge() {
        let local = doc_with(1, "hello world");
        let peer = TextDoc::new(ReplicaId::new(2));
        sync(&local, &peer);

        // Both replicas edit "hello world" without seeing each other
        local.transact(|txn| txn.insert(6, "big ")).unwrap();
        peer.transact(|txn| txn.delete(6, 5)).unwrap();

        sync(&peer, &local);
        sync(&local, &peer);

        assert_eq!(local.text().unwrap(), "hello big ");
        assert_eq!(peer.text().unwrap(), "hello big ");
    }

    #[test]
    fn test_malformed_update_rejected() {
        let doc = doc_with(1, "abc");
        let result = doc.apply_update(&RemoteUpdate {
            origin: OriginTag::from("peer"),
            payload: vec![0xff, 0xff, 0xff],
        });

        assert!(matches!(result, Err(TextError::MalformedUpdate(_))));
        assert_eq!(doc.text().unwrap(), "abc");
    }

    #[test]
    fn test_format_emits_attributed_retain() {
        let doc = doc_with(1, "abcdef");
        let (events, _sub) = record_events(&doc);

        doc.transact(|txn| txn.format(2, 3, attrs(json!({"bold": true}))))
            .unwrap();

        assert_eq!(
            events.borrow()[0].delta(),
            &[Delta::retain(2), Delta::format(3, attrs(json!({"bold": true})))]
        );
    }

    #[test]
    fn test_reapplying_same_format_is_silent() {
        let doc = doc_with(1, "abcdef");
        doc.transact(|txn| txn.format(0, 6, attrs(json!({"bold": true}))))
            .unwrap();
        let (events, _sub) = record_events(&doc);

        doc.transact(|txn| txn.format(0, 6, attrs(json!({"bold": true}))))
            .unwrap();

        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_embed_breaks_projection() {
        let doc = doc_with(1, "ab");
        let (events, _sub) = record_events(&doc);

        doc.transact(|txn| txn.insert_embed(1, json!({"image": "cat.png"})))
            .unwrap();

        assert_eq!(
            doc.text(),
            Err(ProjectionError::EmbeddedContent { index: 1 })
        );
        let events = events.borrow();
        assert_eq!(
            events[0].text(),
            Err(ProjectionError::EmbeddedContent { index: 1 })
        );
        assert_eq!(
            events[0].delta(),
            &[
                Delta::retain(1),
                Delta::Insert {
                    content: Content::Embed(json!({"image": "cat.png"})),
                    attributes: None
                }
            ]
        );
    }

    #[test]
    fn test_dropping_subscription_unregisters() {
        let doc = doc_with(1, "");
        let (events, sub) = record_events(&doc);

        drop(sub);
        doc.transact(|txn| txn.insert(0, "x")).unwrap();

        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_positions_are_utf16_units() {
        let doc = doc_with(1, "a👋b");
        let result = doc.transact(|txn| {
            assert_eq!(txn.len(), 4);
            txn.delete(1, 2)
        });

        assert!(result.is_ok());
        assert_eq!(doc.text().unwrap(), "ab");
    }

    #[test]
    fn test_snapshot_reads_pre_transaction_text() {
        let doc = doc_with(1, "abc");
        doc.transact(|txn| {
            txn.insert(0, "x")?;
            assert_eq!(txn.snapshot(), Ok("abc".to_string()));
            Ok(())
        })
        .unwrap();

        assert_eq!(doc.text().unwrap(), "xabc");
    }
}
