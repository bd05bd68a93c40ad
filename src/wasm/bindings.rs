//! JavaScript bindings for the collaboration session

use crate::config::SessionConfig;
use crate::session::{CollabSession, DetachedTransport};
use crate::text::{OriginTag, RemoteUpdate};
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in browser
#[wasm_bindgen(js_name = initPanicHook)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn to_js_error(context: &str, err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, err))
}

/// JavaScript-friendly wrapper for CollabSession
///
/// The network transport lives on the JavaScript side; it forwards Yjs
/// updates through `applyRemoteUpdate` and connection changes through
/// `setConnected`, and asks `encodeUpdate` for what a peer is missing.
#[wasm_bindgen]
pub struct WasmCollabSession {
    inner: CollabSession,
}

#[wasm_bindgen]
impl WasmCollabSession {
    /// Create a session from a JSON config (`{}` for defaults).
    ///
    /// Returns `undefined` on a headless host or an invalid config.
    #[wasm_bindgen(js_name = initialize)]
    pub fn initialize(config_json: String) -> Result<Option<WasmCollabSession>, JsValue> {
        let config = SessionConfig::from_json(&config_json)
            .map_err(|e| to_js_error("Invalid config", e))?;

        Ok(CollabSession::initialize(config, DetachedTransport::default())
            .map(|inner| WasmCollabSession { inner }))
    }

    /// Replace `oldText` with `newText` in the shared text
    #[wasm_bindgen(js_name = applyTextChange)]
    pub fn apply_text_change(&self, old_text: String, new_text: String) -> Result<(), JsValue> {
        self.inner
            .apply_text_change(&old_text, &new_text)
            .map_err(|e| to_js_error("Text change failed", e))
    }

    /// Replace the last known content with `newText`
    #[wasm_bindgen(js_name = updateText)]
    pub fn update_text(&self, new_text: String) -> Result<(), JsValue> {
        self.inner
            .update_text(&new_text)
            .map_err(|e| to_js_error("Text change failed", e))
    }

    /// Merge a Yjs v1 update sent by the peer tagged `origin`
    #[wasm_bindgen(js_name = applyRemoteUpdate)]
    pub fn apply_remote_update(&self, origin: String, update: Vec<u8>) -> Result<(), JsValue> {
        let update = RemoteUpdate {
            origin: OriginTag::from(origin),
            payload: update,
        };

        self.inner
            .apply_remote_update(&update)
            .map_err(|e| to_js_error("Remote update failed", e))
    }

    /// Local state vector (Yjs v1 encoding)
    #[wasm_bindgen(js_name = encodeStateVector)]
    pub fn encode_state_vector(&self) -> Result<Vec<u8>, JsValue> {
        self.inner
            .state_vector()
            .map_err(|e| to_js_error("State vector failed", e))
    }

    /// Update holding everything a peer at `stateVector` is missing.
    /// An empty vector encodes the whole document.
    #[wasm_bindgen(js_name = encodeUpdate)]
    pub fn encode_update(&self, state_vector: Vec<u8>) -> Result<Vec<u8>, JsValue> {
        self.inner
            .encode_update(&state_vector)
            .map_err(|e| to_js_error("Update encoding failed", e))
    }

    /// Current plain text
    #[wasm_bindgen(js_name = text)]
    pub fn text(&self) -> Result<String, JsValue> {
        self.inner
            .content()
            .map_err(|e| to_js_error("Text projection failed", e))
    }

    /// Change history as a JSON array, most recent first
    #[wasm_bindgen(js_name = getUpdates)]
    pub fn get_updates(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.updates())
            .map_err(|e| to_js_error("JSON serialization failed", e))
    }

    /// Plain-text diff log as a JSON array, most recent first
    #[wasm_bindgen(js_name = getDiffs)]
    pub fn get_diffs(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.diffs())
            .map_err(|e| to_js_error("JSON serialization failed", e))
    }

    /// Sync status as JSON `{"connected": bool, "syncing": bool}`
    #[wasm_bindgen(js_name = getStatus)]
    pub fn get_status(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.status())
            .map_err(|e| to_js_error("JSON serialization failed", e))
    }

    #[wasm_bindgen(js_name = isSyncing)]
    pub fn is_syncing(&self) -> bool {
        self.inner.is_syncing()
    }

    #[wasm_bindgen(js_name = setConnected)]
    pub fn set_connected(&mut self, connected: bool) {
        self.inner.set_connected(connected);
    }

    #[wasm_bindgen(js_name = pauseSync)]
    pub fn pause_sync(&mut self) {
        self.inner.pause_sync();
    }

    #[wasm_bindgen(js_name = resumeSync)]
    pub fn resume_sync(&mut self) {
        self.inner.resume_sync();
    }

    /// Local replica identity as a decimal string
    #[wasm_bindgen(js_name = replicaId)]
    pub fn replica_id(&self) -> String {
        self.inner.replica().to_string()
    }
}
