//! Observer turning shared-text notifications into change records

use super::clock::MonotonicClock;
use super::history::BoundedHistory;
use super::summary::{summarize_delta, DeltaSummary};
use super::{ChangeRecord, Origin};
use crate::text::{OriginTag, SharedText, Subscription, TextEvent};
use crate::util::{byte_size, generate_id};
use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, warn};

/// Stand-in for the document text when it has no plain-text projection
pub const PLACEHOLDER_TEXT: &str = "Rich text document";

/// Failure while building a change record
#[derive(Debug, Error)]
pub enum ObserverFault {
    #[error("failed to render delta: {0}")]
    Render(#[from] serde_json::Error),

    #[error("record builder panicked: {0}")]
    Panicked(String),
}

/// Builds change records and keeps the bounded history
///
/// One extractor is attached per shared text for the text's lifetime. It
/// never fails outward: faults are logged and recorded as degraded entries
/// so that the observer keeps receiving notifications.
#[derive(Debug)]
pub struct ChangeExtractor {
    local: OriginTag,
    history: RefCell<BoundedHistory<ChangeRecord>>,
    clock: MonotonicClock,
}

impl ChangeExtractor {
    /// Create an extractor for the replica identified by `local`
    pub fn new(local: OriginTag) -> Self {
        Self {
            local,
            history: RefCell::new(BoundedHistory::new()),
            clock: MonotonicClock::new(),
        }
    }

    /// Register `extractor` as an observer of `text`
    pub fn attach<T: SharedText>(extractor: &Rc<Self>, text: &T) -> Subscription {
        let extractor = Rc::clone(extractor);
        text.observe(move |event| {
            extractor.record(event);
        })
    }

    /// Build a record for `event`, store it, and return it.
    ///
    /// Any fault (including a panic) while building is downgraded to a
    /// placeholder record.
    pub fn record(&self, event: &TextEvent) -> ChangeRecord {
        let built = panic::catch_unwind(AssertUnwindSafe(|| self.build_record(event)))
            .unwrap_or_else(|payload| Err(ObserverFault::Panicked(panic_message(&*payload))));

        let record = match built {
            Ok(record) => record,
            Err(fault) => {
                warn!(%fault, "change record degraded");
                self.degraded_record(event)
            }
        };

        debug!(
            id = %record.id,
            origin = ?record.origin,
            operation = %record.operation_kind,
            position = record.position,
            length = record.length,
            "recorded text change"
        );

        self.history.borrow_mut().push(record.clone());
        record
    }

    /// Build a record without touching the history
    pub fn build_record(&self, event: &TextEvent) -> Result<ChangeRecord, ObserverFault> {
        let snapshot = self.snapshot(event);
        let summary = summarize_delta(event.delta())?;
        Ok(self.assemble(snapshot, summary, event, false))
    }

    /// Records currently held, most recent first
    pub fn updates(&self) -> Vec<ChangeRecord> {
        self.history.borrow().snapshot()
    }

    pub fn latest(&self) -> Option<ChangeRecord> {
        self.history.borrow().latest().cloned()
    }

    pub fn len(&self) -> usize {
        self.history.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.history.borrow_mut().clear();
    }

    /// Full text after the commit, or the placeholder when it has no projection
    fn snapshot(&self, event: &TextEvent) -> String {
        match event.text() {
            Ok(text) => text.to_string(),
            Err(err) => {
                warn!(%err, "text projection failed, using placeholder");
                PLACEHOLDER_TEXT.to_string()
            }
        }
    }

    fn degraded_record(&self, event: &TextEvent) -> ChangeRecord {
        self.assemble(
            PLACEHOLDER_TEXT.to_string(),
            DeltaSummary::initial(),
            event,
            true,
        )
    }

    fn assemble(
        &self,
        text: String,
        summary: DeltaSummary,
        event: &TextEvent,
        degraded: bool,
    ) -> ChangeRecord {
        let origin = Origin::classify(event.origin(), &self.local);
        ChangeRecord {
            id: generate_id(),
            timestamp: self.clock.now_millis(),
            origin: origin.source(),
            origin_tag: origin.tag(&self.local).cloned(),
            operation_kind: summary.operation,
            position: summary.position,
            length: summary.length,
            full_size: byte_size(&text),
            change_size: byte_size(&summary.rendered),
            rendered_delta: summary.rendered,
            text,
            degraded,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{OperationKind, Source, HISTORY_LIMIT};
    use crate::text::{Delta, RemoteUpdate, ReplicaId, TextDoc, TextTransaction};
    use serde_json::json;

    fn attached(replica: u64) -> (TextDoc, Rc<ChangeExtractor>, Subscription) {
        let replica = ReplicaId::new(replica);
        let doc = TextDoc::new(replica);
        let extractor = Rc::new(ChangeExtractor::new(replica.origin()));
        let sub = ChangeExtractor::attach(&extractor, &doc);
        (doc, extractor, sub)
    }

    /// Deliver everything `peer` has that `doc` lacks, tagged `origin`
    fn deliver(peer: &TextDoc, doc: &TextDoc, origin: &str) {
        let payload = peer.encode_update(&doc.state_vector().unwrap()).unwrap();
        doc.apply_update(&RemoteUpdate {
            origin: OriginTag::from(origin),
            payload,
        })
        .unwrap();
    }

    #[test]
    fn test_local_insert_record() {
        let (doc, extractor, _sub) = attached(1);
        doc.transact(|txn| txn.insert(0, "hi")).unwrap();

        let record = extractor.latest().unwrap();
        assert_eq!(record.operation_kind, OperationKind::Insert);
        assert_eq!(record.position, 0);
        assert_eq!(record.length, 2);
        assert_eq!(record.origin, Source::Local);
        assert_eq!(record.origin_tag, Some(OriginTag::from("1")));
        assert_eq!(record.rendered_delta, "\"hi\"");
        assert_eq!(record.text, "hi");
        assert!(!record.degraded);
    }

    #[test]
    fn test_remote_and_untagged_records() {
        let (doc, extractor, _sub) = attached(1);
        let peer = TextDoc::new(ReplicaId::new(2));
        peer.transact(|txn| txn.insert(0, "abc")).unwrap();

        deliver(&peer, &doc, "peer");
        doc.transact_with(None, |txn| txn.delete(0, 1)).unwrap();

        let updates = extractor.updates();
        assert_eq!(updates[0].origin, Source::Remote);
        assert_eq!(updates[0].origin_tag, None);
        assert_eq!(updates[0].operation_kind, OperationKind::Delete);
        assert_eq!(updates[1].origin, Source::Remote);
        assert_eq!(updates[1].origin_tag, Some(OriginTag::from("peer")));
        assert_eq!(updates[1].text, "abc");
    }

    #[test]
    fn test_sizes_are_bytes() {
        let (doc, extractor, _sub) = attached(1);
        doc.transact(|txn| txn.insert(0, "héllo 👋")).unwrap();

        let record = extractor.latest().unwrap();
        assert_eq!(record.length, 8);
        assert_eq!(record.full_size, "héllo 👋".len());
        assert_eq!(record.full_size, 11);
        assert_eq!(record.change_size, record.rendered_delta.len());
    }

    #[test]
    fn test_history_keeps_twenty_most_recent() {
        let (doc, extractor, _sub) = attached(1);
        let peer = TextDoc::new(ReplicaId::new(2));
        for i in 0..25 {
            peer.transact(|txn| txn.insert(0, &i.to_string())).unwrap();
            deliver(&peer, &doc, "peer");
        }

        let updates = extractor.updates();
        assert_eq!(updates.len(), HISTORY_LIMIT);
        assert_eq!(updates[0].rendered_delta, "\"24\"");
        assert_eq!(updates[19].rendered_delta, "\"5\"");
        assert!(updates.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
    }

    #[test]
    fn test_projection_failure_uses_placeholder() {
        let (doc, extractor, _sub) = attached(1);
        doc.transact(|txn| txn.insert_embed(0, json!({"image": "cat.png"})))
            .unwrap();

        let record = extractor.latest().unwrap();
        assert_eq!(record.text, PLACEHOLDER_TEXT);
        assert_eq!(record.full_size, PLACEHOLDER_TEXT.len());
        assert_eq!(record.operation_kind, OperationKind::Insert);
        assert_eq!(record.length, 1);
        assert!(!record.degraded);
    }

    #[test]
    fn test_formatting_same_attributes_twice_records_once() {
        let (doc, extractor, _sub) = attached(1);
        doc.transact(|txn| txn.insert(0, "bold")).unwrap();
        let bold = json!({"bold": true}).as_object().cloned().unwrap();

        doc.transact(|txn| txn.format(0, 4, bold.clone())).unwrap();
        doc.transact(|txn| txn.format(0, 4, bold.clone())).unwrap();

        let updates = extractor.updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].operation_kind, OperationKind::Mixed);
        assert_eq!(updates[1].operation_kind, OperationKind::Insert);
    }

    // Length accumulation only overflows-panics with debug assertions on
    #[cfg(debug_assertions)]
    #[test]
    fn test_panicking_builder_degrades_record() {
        let extractor = ChangeExtractor::new(OriginTag::from("1"));
        let event = TextEvent::new(
            vec![Delta::Delete(usize::MAX), Delta::insert("x")],
            Some(OriginTag::from("1")),
            Ok("x".to_string()),
        );

        let record = extractor.record(&event);

        assert!(record.degraded);
        assert_eq!(record.text, PLACEHOLDER_TEXT);
        assert_eq!(record.rendered_delta, "");
        assert_eq!(record.length, 0);
        assert_eq!(record.origin, Source::Local);
        assert_eq!(extractor.len(), 1);
    }

    #[test]
    fn test_synthetic_empty_event_is_initial() {
        let extractor = ChangeExtractor::new(OriginTag::from("1"));
        let record = extractor.record(&TextEvent::new(Vec::new(), None, Ok(String::new())));

        assert_eq!(record.operation_kind, OperationKind::Initial);
        assert!(!record.operation_kind.is_edit());
        assert_eq!(record.position, 0);
        assert_eq!(record.length, 0);
        assert_eq!(record.change_size, 0);
    }

    #[test]
    fn test_record_ids_are_unique() {
        let (doc, extractor, _sub) = attached(1);
        doc.transact(|txn| txn.insert(0, "a")).unwrap();
        doc.transact(|txn| txn.insert(1, "b")).unwrap();

        let updates = extractor.updates();
        assert_ne!(updates[0].id, updates[1].id);
    }
}
