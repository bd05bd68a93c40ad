//! WASM bindings for SyncKit Collab
//!
//! This module provides JavaScript-friendly bindings for the collaboration session.

#[cfg(feature = "wasm")]
pub mod bindings;

// Re-export main types
#[cfg(feature = "wasm")]
pub use bindings::{init_panic_hook, WasmCollabSession};
