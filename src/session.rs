//! Collaboration session: the explicit lifecycle around one shared text
//!
//! A [`CollabSession`] is created once by [`CollabSession::initialize`] and
//! owns everything the core needs: the shared text, the change extractor,
//! the plain-text mirror, the sync status and the transport handle. Hosts
//! without an interactive client, and invalid configurations, get `None`
//! instead of a half-built session.
//!
//! # Example
//!
//! ```rust
//! use synckit_collab::{CollabSession, DetachedTransport, SessionConfig};
//! use synckit_collab::changes::OperationKind;
//!
//! let session = CollabSession::initialize(SessionConfig::default(), DetachedTransport::default())
//!     .expect("interactive host");
//!
//! session.apply_text_change("", "hi").unwrap();
//!
//! let updates = session.updates();
//! assert_eq!(updates[0].operation_kind, OperationKind::Insert);
//! assert_eq!(session.content().unwrap(), "hi");
//! ```

use crate::changes::{ChangeExtractor, ChangeRecord};
use crate::config::{HostKind, SessionConfig};
use crate::diff;
use crate::error::Result;
use crate::mirror::{DiffRecord, TextMirror};
use crate::text::{ProjectionError, RemoteUpdate, ReplicaId, SharedText, Subscription, TextDoc};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Connection and sync state shown to users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Transport reports an open connection
    pub connected: bool,
    /// Remote delivery is enabled (not paused)
    pub syncing: bool,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            connected: false,
            syncing: true,
        }
    }
}

/// Delivery channel for remote operations
///
/// Only the start/stop boundary is modeled here. The core keeps observing
/// and diffing regardless of whether the transport is connected.
pub trait Transport {
    fn connect(&mut self);
    fn disconnect(&mut self);
}

/// Transport with no network behind it
///
/// Useful for offline editing and tests; remote updates can still be fed
/// in through [`CollabSession::apply_remote_update`].
#[derive(Debug, Default)]
pub struct DetachedTransport {
    connected: bool,
}

impl DetachedTransport {
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl Transport for DetachedTransport {
    fn connect(&mut self) {
        self.connected = true;
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

/// One collaborative editing session
pub struct CollabSession {
    config: SessionConfig,
    replica: ReplicaId,
    doc: TextDoc,
    extractor: Rc<ChangeExtractor>,
    mirror: Rc<TextMirror>,
    status: SyncStatus,
    transport: Box<dyn Transport>,
    subscriptions: Vec<Subscription>,
}

impl CollabSession {
    /// Build a session for `config`, or `None` on a headless host or an
    /// invalid configuration.
    ///
    /// The change extractor and the mirror are attached here, once, and stay
    /// attached until the session is cleaned up.
    pub fn initialize(config: SessionConfig, transport: impl Transport + 'static) -> Option<Self> {
        if let Err(err) = config.validate() {
            warn!(%err, room = %config.room, "invalid session configuration");
            return None;
        }

        if config.host == HostKind::Headless {
            info!(room = %config.room, "headless host, collaboration unavailable");
            return None;
        }

        let replica = config.replica();
        let doc = TextDoc::with_name(replica, &config.text_name);
        let extractor = Rc::new(ChangeExtractor::new(replica.origin()));
        let mirror = Rc::new(TextMirror::new(replica.origin(), String::new()));
        let subscriptions = vec![
            ChangeExtractor::attach(&extractor, &doc),
            TextMirror::attach(&mirror, &doc),
        ];

        let mut transport: Box<dyn Transport> = Box::new(transport);
        let syncing = !config.start_paused;
        if syncing {
            transport.connect();
        }

        info!(
            replica = %replica,
            server = %config.server_url,
            room = %config.room,
            text = %config.text_name,
            syncing,
            "collaboration session initialized"
        );

        Some(Self {
            config,
            replica,
            doc,
            extractor,
            mirror,
            status: SyncStatus {
                connected: false,
                syncing,
            },
            transport,
            subscriptions,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn replica(&self) -> ReplicaId {
        self.replica
    }

    /// Replace `old_text` with `new_text` through the diff path
    pub fn apply_text_change(&self, old_text: &str, new_text: &str) -> Result<()> {
        diff::apply_text_change(&self.doc, old_text, new_text)
    }

    /// Replace the content last seen by the mirror with `new_text`
    pub fn update_text(&self, new_text: &str) -> Result<()> {
        let current = self.mirror.current();
        self.apply_text_change(&current, new_text)
    }

    /// Merge an update received from another replica
    pub fn apply_remote_update(&self, update: &RemoteUpdate) -> Result<()> {
        debug!(origin = %update.origin, bytes = update.payload.len(), "applying remote update");
        self.doc.apply_update(update)?;
        Ok(())
    }

    /// Encoded state vector to send to peers asking for missing updates
    pub fn state_vector(&self) -> Result<Vec<u8>> {
        Ok(self.doc.state_vector()?)
    }

    /// Update holding everything a peer at `state_vector` lacks
    pub fn encode_update(&self, state_vector: &[u8]) -> Result<Vec<u8>> {
        Ok(self.doc.encode_update(state_vector)?)
    }

    /// Current plain-text content
    pub fn content(&self) -> std::result::Result<String, ProjectionError> {
        self.doc.text()
    }

    /// Change history snapshot, most recent first
    pub fn updates(&self) -> Vec<ChangeRecord> {
        self.extractor.updates()
    }

    /// Plain-text diff log snapshot, most recent first
    pub fn diffs(&self) -> Vec<DiffRecord> {
        self.mirror.diffs()
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn is_syncing(&self) -> bool {
        self.status.syncing
    }

    /// Record a connection status change reported by the transport
    pub fn set_connected(&mut self, connected: bool) {
        self.status.connected = connected;
    }

    /// Stop remote delivery; local state and observers are kept
    pub fn pause_sync(&mut self) {
        self.transport.disconnect();
        self.status.connected = false;
        self.status.syncing = false;
        info!(replica = %self.replica, "sync paused");
    }

    /// Restart remote delivery
    pub fn resume_sync(&mut self) {
        self.transport.connect();
        self.status.syncing = true;
        info!(replica = %self.replica, "sync resumed");
    }

    /// Disconnect and detach all observers
    pub fn cleanup(mut self) {
        self.transport.disconnect();
        self.subscriptions.clear();
        info!(replica = %self.replica, "collaboration session closed");
    }
}

impl std::fmt::Debug for CollabSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollabSession")
            .field("replica", &self.replica)
            .field("room", &self.config.room)
            .field("status", &self.status)
            .field("doc", &self.doc)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{OperationKind, Source};
    use crate::text::{OriginTag, TextError, TextTransaction};
    use crate::SyncError;
    use std::cell::RefCell;

    /// Transport logging connect/disconnect calls
    #[derive(Clone, Default)]
    struct RecordingTransport {
        calls: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Transport for RecordingTransport {
        fn connect(&mut self) {
            self.calls.borrow_mut().push("connect");
        }

        fn disconnect(&mut self) {
            self.calls.borrow_mut().push("disconnect");
        }
    }

    fn session() -> CollabSession {
        let config = SessionConfig {
            replica_id: Some(1),
            ..SessionConfig::default()
        };
        CollabSession::initialize(config, DetachedTransport::default()).unwrap()
    }

    /// Everything `peer` has that `session` lacks
    fn update_from(peer: &TextDoc, session: &CollabSession) -> RemoteUpdate {
        RemoteUpdate {
            origin: peer.replica().origin(),
            payload: peer.encode_update(&session.state_vector().unwrap()).unwrap(),
        }
    }

    /// Peer replica already holding `session`'s content
    fn peer_of(session: &CollabSession, replica: u64) -> TextDoc {
        let peer = TextDoc::with_name(ReplicaId::new(replica), &session.config().text_name);
        peer.apply_update(&RemoteUpdate {
            origin: session.replica().origin(),
            payload: session.encode_update(&[]).unwrap(),
        })
        .unwrap();
        peer
    }

    #[test]
    fn test_headless_host_has_no_session() {
        let config = SessionConfig {
            host: HostKind::Headless,
            ..SessionConfig::default()
        };
        assert!(CollabSession::initialize(config, DetachedTransport::default()).is_none());
    }

    #[test]
    fn test_invalid_config_has_no_session() {
        let transport = RecordingTransport::default();
        let calls = transport.calls.clone();
        let config = SessionConfig {
            room: String::new(),
            ..SessionConfig::default()
        };

        assert!(CollabSession::initialize(config, transport).is_none());
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_hello_hallo_scenario() {
        let session = session();
        session.apply_text_change("", "hello").unwrap();
        session.apply_text_change("hello", "hallo").unwrap();

        assert_eq!(session.content().unwrap(), "hallo");

        let record = &session.updates()[0];
        assert_eq!(record.operation_kind, OperationKind::Mixed);
        assert_eq!(record.position, 1);
        assert_eq!(record.length, 2);
        assert_eq!(record.origin, Source::Local);
    }

    #[test]
    fn test_noop_change_records_nothing() {
        let session = session();
        session.apply_text_change("", "same").unwrap();
        session.apply_text_change("same", "same").unwrap();
        assert_eq!(session.updates().len(), 1);
    }

    #[test]
    fn test_update_text_diffs_against_mirror() {
        let session = session();
        session.update_text("draft").unwrap();
        let peer = peer_of(&session, 2);
        peer.transact(|txn| txn.insert(5, "!")).unwrap();
        session.apply_remote_update(&update_from(&peer, &session)).unwrap();
        session.update_text("Draft!").unwrap();

        assert_eq!(session.content().unwrap(), "Draft!");
        let updates = session.updates();
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].origin, Source::Local);
        assert_eq!(updates[1].origin, Source::Remote);
        assert_eq!(updates[1].origin_tag, Some(OriginTag::from("2")));
        assert_eq!(session.diffs().len(), 3);
    }

    #[test]
    fn test_twenty_five_remote_updates_keep_twenty() {
        let session = session();
        let peer = peer_of(&session, 2);
        for i in 0..25 {
            peer.transact(|txn| txn.insert(0, "x")).unwrap();
            session.apply_remote_update(&update_from(&peer, &session)).unwrap();
            assert_eq!(session.content().unwrap().len(), i + 1);
        }

        let updates = session.updates();
        assert_eq!(updates.len(), 20);
        assert!(updates.iter().all(|u| u.origin == Source::Remote));
        assert_eq!(updates[0].text.len(), 25);
        assert_eq!(updates[19].text.len(), 6);
    }

    #[test]
    fn test_rejected_change_propagates() {
        let session = session();
        let err = session.apply_text_change("abc", "xyz").unwrap_err();
        assert!(matches!(err, SyncError::TransactionRejected(_)));
        assert!(session.updates().is_empty());
    }

    #[test]
    fn test_concurrent_remote_delete_merges_with_local_insert() {
        let session = session();
        session.apply_text_change("", "hello world").unwrap();
        let peer = peer_of(&session, 2);

        // Peer deletes "world" from the same "hello world" the session edits
        peer.transact(|txn| txn.delete(6, 5)).unwrap();
        session
            .apply_text_change("hello world", "hello big world")
            .unwrap();
        session.apply_remote_update(&update_from(&peer, &session)).unwrap();

        assert_eq!(session.content().unwrap(), "hello big ");
        assert_eq!(session.updates()[0].origin, Source::Remote);

        peer.apply_update(&RemoteUpdate {
            origin: session.replica().origin(),
            payload: session.encode_update(&peer.state_vector().unwrap()).unwrap(),
        })
        .unwrap();
        assert_eq!(peer.text().unwrap(), "hello big ");
    }

    #[test]
    fn test_garbage_update_is_rejected() {
        let session = session();
        let err = session
            .apply_remote_update(&RemoteUpdate {
                origin: OriginTag::from("peer"),
                payload: vec![0xff; 4],
            })
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::TransactionRejected(TextError::MalformedUpdate(_))
        ));
        assert!(session.updates().is_empty());
    }

    #[test]
    fn test_pause_and_resume() {
        let transport = RecordingTransport::default();
        let calls = transport.calls.clone();
        let mut session = CollabSession::initialize(SessionConfig::default(), transport).unwrap();

        session.set_connected(true);
        assert_eq!(
            session.status(),
            SyncStatus {
                connected: true,
                syncing: true
            }
        );

        session.pause_sync();
        assert!(!session.is_syncing());
        assert!(!session.status().connected);

        // Local editing and observation continue while paused
        session.apply_text_change("", "offline").unwrap();
        assert_eq!(session.updates().len(), 1);

        session.resume_sync();
        assert!(session.is_syncing());
        assert_eq!(*calls.borrow(), vec!["connect", "disconnect", "connect"]);
    }

    #[test]
    fn test_start_paused_skips_connect() {
        let transport = RecordingTransport::default();
        let calls = transport.calls.clone();
        let config = SessionConfig {
            start_paused: true,
            ..SessionConfig::default()
        };
        let session = CollabSession::initialize(config, transport).unwrap();

        assert!(!session.is_syncing());
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_cleanup_disconnects() {
        let transport = RecordingTransport::default();
        let calls = transport.calls.clone();
        let session = CollabSession::initialize(SessionConfig::default(), transport).unwrap();

        session.cleanup();
        assert_eq!(calls.borrow().last(), Some(&"disconnect"));
    }
}
