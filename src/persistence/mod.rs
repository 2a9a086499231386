//! Ornament persistence
//!
//! Features:
//! - Plain JSON list of ornament records
//! - Per-record tolerant decoding (bad entries are skipped, not fatal)
//! - Pluggable storage: in-memory for native/tests, LocalStorage on web

pub mod record;
pub mod storage;

pub use record::{OrnamentRecord, Position, encode_records, parse_records};
#[cfg(target_arch = "wasm32")]
pub use storage::LocalStorageStore;
pub use storage::{MemoryStore, OrnamentStore};
