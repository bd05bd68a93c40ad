//! Session configuration
//!
//! Every field has a default, so an empty JSON object is a valid config.

use crate::error::{Result, SyncError};
use crate::text::ReplicaId;
use serde::{Deserialize, Serialize};

/// Public demo relay used when no server is configured
pub const DEFAULT_SERVER_URL: &str = "wss://demos.yjs.dev";

/// Where the session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    /// An interactive client (browser tab, desktop app)
    #[default]
    Interactive,
    /// Server-side rendering, CLI tooling, tests without a UI
    Headless,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Relay the transport connects to
    pub server_url: String,
    /// Room shared by all collaborators on the document
    pub room: String,
    /// Name of the shared text inside the document
    pub text_name: String,
    /// Fixed replica identity; random when absent
    pub replica_id: Option<u64>,
    pub host: HostKind,
    /// Start with remote delivery paused
    pub start_paused: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            room: "svelte-yjs-quill-demo".to_string(),
            text_name: "quill".to_string(),
            replica_id: None,
            host: HostKind::Interactive,
            start_paused: false,
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(SyncError::InvalidConfig(format!(
                "server_url must be a ws:// or wss:// URL, got {:?}",
                self.server_url
            )));
        }
        if self.room.trim().is_empty() {
            return Err(SyncError::InvalidConfig("room must not be empty".to_string()));
        }
        if self.text_name.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "text_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Replica identity for this session
    pub fn replica(&self) -> ReplicaId {
        self.replica_id.map(ReplicaId::new).unwrap_or_else(ReplicaId::random)
    }
}
