//! Local-only backend: the whole list as one JSON array under a single key.

use std::sync::Arc;

use tracing::debug;

use crate::error::WishlistResult;
use crate::storage::KeyValueStore;
use crate::types::WishlistItem;

/// Key holding the serialized list
pub const LOCAL_STORAGE_KEY: &str = "bilvin-wishlist-v2";

/// Fallback persistence used when the remote backend is not configured
#[derive(Clone)]
pub struct LocalBackend {
    store: Arc<dyn KeyValueStore>,
}

impl LocalBackend {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the saved list; an empty list if nothing was ever saved.
    pub fn load(&self) -> WishlistResult<Vec<WishlistItem>> {
        match self.store.get(LOCAL_STORAGE_KEY)? {
            Some(json) => {
                let items: Vec<WishlistItem> = serde_json::from_str(&json)?;
                debug!(count = items.len(), "Loaded local wishlist");
                Ok(items)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Replace the saved list
    pub fn save(&self, items: &[WishlistItem]) -> WishlistResult<()> {
        let json = serde_json::to_string(items)?;
        self.store.set(LOCAL_STORAGE_KEY, &json)?;
        debug!(count = items.len(), "Saved local wishlist");
        Ok(())
    }

    /// Raw persisted value, exactly as stored
    pub fn raw(&self) -> WishlistResult<Option<String>> {
        self.store.get(LOCAL_STORAGE_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::types::{ItemId, NewItem, User};

    #[test]
    fn test_load_empty() {
        let backend = LocalBackend::new(Arc::new(MemoryStorage::new()));
        assert!(backend.load().unwrap().is_empty());
        assert!(backend.raw().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let backend = LocalBackend::new(Arc::new(MemoryStorage::new()));
        let item =
            NewItem::new("Nonton konser", User::Kevin).into_item(ItemId::generate(), chrono::Utc::now());

        backend.save(std::slice::from_ref(&item)).unwrap();
        assert_eq!(backend.load().unwrap(), vec![item]);
    }

    #[test]
    fn test_corrupt_value_is_serialization_error() {
        let store = Arc::new(MemoryStorage::new());
        store.set(LOCAL_STORAGE_KEY, "{not json").unwrap();
        let backend = LocalBackend::new(store);
        assert!(matches!(
            backend.load(),
            Err(crate::error::WishlistError::Serialization(_))
        ));
    }
}
