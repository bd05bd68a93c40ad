//! SyncKit Collab - collaborative text editing core
//!
//! This is the Rust core behind SyncKit's collaborative editor demos,
//! compiled to both native and WASM. It implements:
//! - A yrs-backed shared text with atomic, origin-tagged transactions and change deltas
//! - Diff-to-operation translation from plain-text snapshots
//! - Change extraction into a bounded, most-recent-first history
//! - A plain-text mirror with a text diff log
//! - An explicit session lifecycle with pause/resume of remote delivery
//!
//! # Examples
//!
//! ```rust
//! use synckit_collab::{apply_text_change, ChangeExtractor, ReplicaId, TextDoc};
//! use synckit_collab::changes::OperationKind;
//! use std::rc::Rc;
//!
//! let replica = ReplicaId::new(7);
//! let doc = TextDoc::new(replica);
//! let extractor = Rc::new(ChangeExtractor::new(replica.origin()));
//! let _sub = ChangeExtractor::attach(&extractor, &doc);
//!
//! apply_text_change(&doc, "", "hello").unwrap();
//! apply_text_change(&doc, "hello", "hallo").unwrap();
//!
//! let latest = extractor.latest().unwrap();
//! assert_eq!(latest.operation_kind, OperationKind::Mixed);
//! assert_eq!(latest.position, 1);
//! ```

pub mod changes;
pub mod config;
pub mod diff;
pub mod error;
pub mod mirror;
pub mod session;
pub mod text;
pub mod util;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-exports for convenience
pub use changes::{ChangeExtractor, ChangeRecord, OperationKind, Origin, Source};
pub use config::{HostKind, SessionConfig};
pub use diff::{apply_text_change, compute_diff, DiffOperation};
pub use error::{Result, SyncError};
pub use mirror::{DiffRecord, TextMirror};
pub use session::{CollabSession, DetachedTransport, SyncStatus, Transport};
pub use text::{OriginTag, RemoteUpdate, ReplicaId, SharedText, TextDoc};
