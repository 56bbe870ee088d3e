//! Typed repositories over the local key-value space.
//!
//! Three independent namespaces keyed by record id: seen markers, user photo
//! overrides and resolution cache entries. Writes are last-write-wins; there is
//! a single writer.
#![allow(async_fn_in_trait)]

use crate::error::StoreError;
use crate::records::SeenMarker;
use std::collections::HashMap;

/// Memoized provider lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEntry {
    Found(String),
    NotFound,
}

pub trait SeenStore {
    async fn all_seen(&self) -> Result<HashMap<String, SeenMarker>, StoreError>;
    async fn set_seen(&self, id: &str, marker: SeenMarker) -> Result<(), StoreError>;
    async fn clear_seen(&self, id: &str) -> Result<(), StoreError>;
}

/// User-supplied photos, stored as encoded JPEG bytes.
pub trait OverrideStore {
    async fn get_override(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError>;
    async fn set_override(&self, id: &str, jpeg: &[u8]) -> Result<(), StoreError>;
}

pub trait ResolutionCache {
    async fn get_cached(&self, id: &str) -> Result<Option<CacheEntry>, StoreError>;
    async fn set_cached(&self, id: &str, entry: &CacheEntry) -> Result<(), StoreError>;
    /// Forget the memoized result so the next resolution asks the providers.
    async fn clear_cached(&self, id: &str) -> Result<(), StoreError>;
}

/// Reject photo payloads the store is not willing to hold.
pub fn check_capacity(size: usize, limit: usize) -> Result<(), StoreError> {
    if size > limit {
        Err(StoreError::CapacityExceeded { size, limit })
    } else {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) use memory::MemoryStore;

#[cfg(test)]
mod memory {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// In-process store used by tests; counts reads and writes.
    #[derive(Debug)]
    pub struct MemoryStore {
        seen: RefCell<HashMap<String, SeenMarker>>,
        overrides: RefCell<HashMap<String, Vec<u8>>>,
        cache: RefCell<HashMap<String, CacheEntry>>,
        max_photo_bytes: usize,
        pub cache_reads: Cell<usize>,
        pub cache_writes: Cell<usize>,
    }

    impl MemoryStore {
        pub fn new(max_photo_bytes: usize) -> Self {
            Self {
                seen: RefCell::new(HashMap::new()),
                overrides: RefCell::new(HashMap::new()),
                cache: RefCell::new(HashMap::new()),
                max_photo_bytes,
                cache_reads: Cell::new(0),
                cache_writes: Cell::new(0),
            }
        }

        pub fn cached(&self, id: &str) -> Option<CacheEntry> {
            self.cache.borrow().get(id).cloned()
        }
    }

    impl Default for MemoryStore {
        fn default() -> Self {
            Self::new(usize::MAX)
        }
    }

    impl SeenStore for MemoryStore {
        async fn all_seen(&self) -> Result<HashMap<String, SeenMarker>, StoreError> {
            Ok(self.seen.borrow().clone())
        }

        async fn set_seen(&self, id: &str, marker: SeenMarker) -> Result<(), StoreError> {
            self.seen.borrow_mut().insert(id.to_string(), marker);
            Ok(())
        }

        async fn clear_seen(&self, id: &str) -> Result<(), StoreError> {
            self.seen.borrow_mut().remove(id);
            Ok(())
        }
    }

    impl OverrideStore for MemoryStore {
        async fn get_override(&self, id: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Ok(self.overrides.borrow().get(id).cloned())
        }

        async fn set_override(&self, id: &str, jpeg: &[u8]) -> Result<(), StoreError> {
            check_capacity(jpeg.len(), self.max_photo_bytes)?;
            self.overrides
                .borrow_mut()
                .insert(id.to_string(), jpeg.to_vec());
            Ok(())
        }
    }

    impl ResolutionCache for MemoryStore {
        async fn get_cached(&self, id: &str) -> Result<Option<CacheEntry>, StoreError> {
            self.cache_reads.set(self.cache_reads.get() + 1);
            Ok(self.cache.borrow().get(id).cloned())
        }

        async fn set_cached(&self, id: &str, entry: &CacheEntry) -> Result<(), StoreError> {
            self.cache_writes.set(self.cache_writes.get() + 1);
            self.cache.borrow_mut().insert(id.to_string(), entry.clone());
            Ok(())
        }

        async fn clear_cached(&self, id: &str) -> Result<(), StoreError> {
            self.cache.borrow_mut().remove(id);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_capacity_boundary() {
        assert!(check_capacity(10, 10).is_ok());
        assert!(matches!(
            check_capacity(11, 10),
            Err(StoreError::CapacityExceeded { size: 11, limit: 10 })
        ));
    }

    #[tokio::test]
    async fn test_memory_store_enforces_capacity() {
        let store = MemoryStore::new(4);
        assert!(store.set_override("a", &[1, 2, 3, 4]).await.is_ok());
        assert!(store.set_override("b", &[1, 2, 3, 4, 5]).await.is_err());
        assert_eq!(store.get_override("a").await.unwrap(), Some(vec![1, 2, 3, 4]));
        assert_eq!(store.get_override("b").await.unwrap(), None);
    }
}
