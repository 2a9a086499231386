//! Storage backends for the ornament list

use super::record::{OrnamentRecord, encode_records, parse_records};

/// Somewhere the ornament list can be kept between sessions
pub trait OrnamentStore {
    /// Raw stored document, `None` when nothing was ever saved
    fn read(&self) -> Option<String>;

    /// Replace the stored document
    fn write(&mut self, json: &str);

    /// Forget the stored document
    fn clear(&mut self);

    /// Decode the stored records (tolerant of missing or bad data)
    fn load(&self) -> Vec<OrnamentRecord> {
        self.read().map(|json| parse_records(&json)).unwrap_or_default()
    }

    /// Encode and store the records; an empty list clears storage
    fn save(&mut self, records: &[OrnamentRecord]) {
        if records.is_empty() {
            self.clear();
            return;
        }
        match encode_records(records) {
            Ok(json) => self.write(&json),
            Err(e) => log::error!("Failed to encode ornaments: {}", e),
        }
    }
}

/// Process-local storage (native hosts and tests)
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    document: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing document
    pub fn with_document(json: impl Into<String>) -> Self {
        Self {
            document: Some(json.into()),
        }
    }
}

impl OrnamentStore for MemoryStore {
    fn read(&self) -> Option<String> {
        self.document.clone()
    }

    fn write(&mut self, json: &str) {
        self.document = Some(json.to_string());
    }

    fn clear(&mut self) {
        self.document = None;
    }
}

/// Browser LocalStorage
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone)]
pub struct LocalStorageStore {
    key: String,
}

#[cfg(target_arch = "wasm32")]
impl LocalStorageStore {
    pub const DEFAULT_KEY: &'static str = "tree_drops_ornaments";

    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    fn storage() -> Option<web_sys::Storage> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
    }
}

#[cfg(target_arch = "wasm32")]
impl Default for LocalStorageStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_KEY)
    }
}

#[cfg(target_arch = "wasm32")]
impl OrnamentStore for LocalStorageStore {
    fn read(&self) -> Option<String> {
        Self::storage().and_then(|s| s.get_item(&self.key).ok().flatten())
    }

    fn write(&mut self, json: &str) {
        if let Some(storage) = Self::storage() {
            if storage.set_item(&self.key, json).is_err() {
                log::warn!("LocalStorage rejected ornament save");
            }
        }
    }

    fn clear(&mut self) {
        if let Some(storage) = Self::storage() {
            let _ = storage.remove_item(&self.key);
        }
    }
}
