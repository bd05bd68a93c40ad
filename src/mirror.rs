//! Plain-text mirror: last known content plus a log of text diffs
//!
//! Editors bound to a plain `<textarea>` need the previous content to diff
//! against when the user types. The mirror follows every notification,
//! keeps the latest plain text, and logs what changed between consecutive
//! snapshots as [`DiffRecord`]s (bounded like the change history).

use crate::changes::{BoundedHistory, MonotonicClock, Origin, Source};
use crate::diff::{change_length, change_position, compute_diff, DiffOperation};
use crate::text::{OriginTag, SharedText, Subscription, TextEvent};
use crate::util::generate_id;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// Text-level diff between two consecutive snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffRecord {
    pub id: String,
    pub timestamp: u64,
    /// Local/remote bucket; untagged transactions count as remote
    pub origin: Source,
    /// Tag the transaction carried, if any
    pub origin_tag: Option<OriginTag>,
    pub old_text: String,
    pub new_text: String,
    pub operations: Vec<DiffOperation>,
    /// UTF-16 units kept before the first change
    pub position: usize,
    /// UTF-16 units inserted plus deleted
    pub length: usize,
}

/// Mirror of the shared text's plain content
#[derive(Debug)]
pub struct TextMirror {
    local: OriginTag,
    current: RefCell<String>,
    history: RefCell<BoundedHistory<DiffRecord>>,
    clock: MonotonicClock,
}

impl TextMirror {
    pub fn new(local: OriginTag, initial: String) -> Self {
        Self {
            local,
            current: RefCell::new(initial),
            history: RefCell::new(BoundedHistory::new()),
            clock: MonotonicClock::new(),
        }
    }

    /// Register `mirror` as an observer of `text`
    pub fn attach<T: SharedText>(mirror: &Rc<Self>, text: &T) -> Subscription {
        let mirror = Rc::clone(mirror);
        text.observe(move |event| {
            mirror.sync(event);
        })
    }

    /// Catch up with the text carried by a notification.
    ///
    /// Returns the logged diff, or `None` when the plain content is
    /// unchanged or cannot be projected.
    pub fn sync(&self, event: &TextEvent) -> Option<DiffRecord> {
        let new_text = match event.text() {
            Ok(text) => text.to_string(),
            Err(err) => {
                debug!(%err, "mirror skipped non-text content");
                return None;
            }
        };

        if *self.current.borrow() == new_text {
            return None;
        }

        let old_text = self.current.replace(new_text.clone());
        let operations = compute_diff(&old_text, &new_text);
        let origin = Origin::classify(event.origin(), &self.local);

        let record = DiffRecord {
            id: generate_id(),
            timestamp: self.clock.now_millis(),
            origin: origin.source(),
            origin_tag: origin.tag(&self.local).cloned(),
            position: change_position(&operations),
            length: change_length(&operations),
            old_text,
            new_text,
            operations,
        };

        self.history.borrow_mut().push(record.clone());
        Some(record)
    }

    /// Last plain text seen
    pub fn current(&self) -> String {
        self.current.borrow().clone()
    }

    /// Logged diffs, most recent first
    pub fn diffs(&self) -> Vec<DiffRecord> {
        self.history.borrow().snapshot()
    }
}
