//! Fallback chain deciding which photo represents a record.
//!
//! Order, each step short-circuiting: user override, resolution cache, primary
//! provider over every name candidate, secondary provider, and finally the
//! not-found sentinel. The cache is write-through and permanent: a provider that
//! was down during the first lookup is never asked again for that record.

pub mod providers;

use crate::records::SpeciesRecord;
use crate::store::{CacheEntry, OverrideStore, ResolutionCache};
use providers::ImageProvider;
use std::rc::Rc;

/// Where a resolved image lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// JPEG bytes uploaded by the user.
    Override(Rc<[u8]>),
    Remote(String),
}

impl ImageRef {
    pub fn url(&self) -> Option<&str> {
        match self {
            ImageRef::Override(_) => None,
            ImageRef::Remote(url) => Some(url),
        }
    }
}

/// Names tried against the primary provider: scientific name first.
pub fn primary_candidates(record: &SpeciesRecord) -> Vec<&str> {
    [
        &record.latin_name,
        &record.english_name,
        &record.dutch_name,
        &record.spanish_name,
    ]
    .into_iter()
    .map(|s| s.trim())
    .filter(|s| !s.is_empty())
    .collect()
}

/// Titles tried against the secondary provider.
pub fn secondary_candidates(record: &SpeciesRecord) -> Vec<&str> {
    [&record.english_name, &record.latin_name]
        .into_iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}

pub struct Resolver<S, P, W> {
    store: Rc<S>,
    primary: P,
    secondary: W,
}

impl<S, P, W> Resolver<S, P, W>
where
    S: OverrideStore + ResolutionCache,
    P: ImageProvider,
    W: ImageProvider,
{
    pub fn new(store: Rc<S>, primary: P, secondary: W) -> Self {
        Self {
            store,
            primary,
            secondary,
        }
    }

    /// Resolve the image for `record`; `None` means no known image.
    ///
    /// Never fails: store read errors count as a miss and provider errors move
    /// on to the next candidate.
    pub async fn resolve(&self, record: &SpeciesRecord) -> Option<ImageRef> {
        let id = record.id.as_str();

        match self.store.get_override(id).await {
            Ok(Some(bytes)) => return Some(ImageRef::Override(bytes.into())),
            Ok(None) => {}
            Err(e) => tracing::warn!(record = id, error = %e, "override lookup failed"),
        }

        match self.store.get_cached(id).await {
            Ok(Some(CacheEntry::Found(url))) => {
                tracing::trace!(record = id, "cache hit");
                return Some(ImageRef::Remote(url));
            }
            Ok(Some(CacheEntry::NotFound)) => return None,
            Ok(None) => {}
            Err(e) => tracing::warn!(record = id, error = %e, "cache lookup failed"),
        }

        let found = match first_image(&self.primary, &primary_candidates(record)).await {
            Some(url) => Some(url),
            None => first_image(&self.secondary, &secondary_candidates(record)).await,
        };

        let entry = match &found {
            Some(url) => CacheEntry::Found(url.clone()),
            None => CacheEntry::NotFound,
        };
        if let Err(e) = self.store.set_cached(id, &entry).await {
            tracing::warn!(record = id, error = %e, "could not cache resolution");
        }
        if found.is_none() {
            tracing::debug!(record = id, "no provider has an image");
        }
        found.map(ImageRef::Remote)
    }
}

/// Try each candidate in order; failures are logged and skipped.
async fn first_image<P: ImageProvider>(provider: &P, candidates: &[&str]) -> Option<String> {
    for &query in candidates {
        match provider.lookup(query).await {
            Ok(Some(url)) => {
                tracing::debug!(provider = provider.name(), query, %url, "image found");
                return Some(url);
            }
            Ok(None) => {
                tracing::debug!(provider = provider.name(), query, "no image");
            }
            Err(e) => {
                tracing::debug!(provider = provider.name(), query, error = %e, "lookup failed");
            }
        }
    }
    None
}


#[cfg(test)]
mod tests {
    use super::fakes::FakeProvider;
    use super::*;
    use crate::records::test_record;
    use crate::store::MemoryStore;

    type TestResolver = Resolver<MemoryStore, FakeProvider, FakeProvider>;

    fn thrush() -> SpeciesRecord {
        let mut r = test_record("t1", "Clay-colored Thrush", "Turdus grayi", "Turdidae");
        r.dutch_name = "Grijze Lijster".to_string();
        r.spanish_name = "Yigüirro".to_string();
        r
    }

    fn resolver(primary: FakeProvider, secondary: FakeProvider) -> (Rc<MemoryStore>, TestResolver) {
        let store = Rc::new(MemoryStore::default());
        (store.clone(), Resolver::new(store, primary, secondary))
    }

    fn calls(r: &TestResolver) -> usize {
        r.primary.call_count() + r.secondary.call_count()
    }

    #[test]
    fn test_candidate_order() {
        let record = thrush();
        assert_eq!(
            primary_candidates(&record),
            vec!["Turdus grayi", "Clay-colored Thrush", "Grijze Lijster", "Yigüirro"]
        );
        assert_eq!(
            secondary_candidates(&record),
            vec!["Clay-colored Thrush", "Turdus grayi"]
        );
        let sparse = test_record("x", "", "Aa bb", "");
        assert_eq!(primary_candidates(&sparse), vec!["Aa bb"]);
        assert_eq!(secondary_candidates(&sparse), vec!["Aa bb"]);
    }

    #[tokio::test]
    async fn test_primary_hit_is_cached_and_reused() {
        let url = "https://static.inaturalist.org/photos/1/medium.jpg";
        let (store, resolver) = resolver(
            FakeProvider::default().with("Turdus grayi", Some(url)),
            FakeProvider::default(),
        );
        let record = thrush();

        let first = resolver.resolve(&record).await;
        assert_eq!(first, Some(ImageRef::Remote(url.to_string())));
        assert_eq!(resolver.primary.calls.borrow().as_slice(), ["Turdus grayi"]);
        assert_eq!(store.cached("t1"), Some(CacheEntry::Found(url.to_string())));

        let second = resolver.resolve(&record).await;
        assert_eq!(second, first);
        assert_eq!(calls(&resolver), 1);
    }

    #[tokio::test]
    async fn test_override_wins_without_network_or_cache() {
        let (store, resolver) = resolver(FakeProvider::default(), FakeProvider::default());
        store
            .set_cached("t1", &CacheEntry::Found("https://cached".to_string()))
            .await
            .unwrap();
        store.set_override("t1", &[0xff, 0xd8, 0xff]).await.unwrap();
        let reads_before = store.cache_reads.get();

        let got = resolver.resolve(&thrush()).await;
        assert_eq!(got, Some(ImageRef::Override(vec![0xff, 0xd8, 0xff].into())));
        assert_eq!(calls(&resolver), 0);
        assert_eq!(store.cache_reads.get(), reads_before);
    }

    #[tokio::test]
    async fn test_not_found_sentinel_short_circuits() {
        let (store, resolver) = resolver(FakeProvider::default(), FakeProvider::default());
        store.set_cached("t1", &CacheEntry::NotFound).await.unwrap();

        for _ in 0..3 {
            assert_eq!(resolver.resolve(&thrush()).await, None);
        }
        assert_eq!(calls(&resolver), 0);
    }

    #[tokio::test]
    async fn test_failures_advance_to_next_candidate() {
        let url = "https://img/dutch.jpg";
        let (store, resolver) = resolver(
            FakeProvider::default()
                .with("Clay-colored Thrush", None)
                .with("Grijze Lijster", Some(url)),
            FakeProvider::default(),
        );
        let got = resolver.resolve(&thrush()).await;
        assert_eq!(got, Some(ImageRef::Remote(url.to_string())));
        assert_eq!(
            resolver.primary.calls.borrow().as_slice(),
            ["Turdus grayi", "Clay-colored Thrush", "Grijze Lijster"]
        );
        assert_eq!(resolver.secondary.call_count(), 0);
        assert_eq!(store.cache_writes.get(), 1);
    }

    #[tokio::test]
    async fn test_secondary_used_after_primary_exhausted() {
        let url = "https://upload.wikimedia.org/thumb.jpg";
        let (store, resolver) = resolver(
            FakeProvider::default(),
            FakeProvider::default().with("Turdus grayi", Some(url)),
        );
        let got = resolver.resolve(&thrush()).await;
        assert_eq!(got, Some(ImageRef::Remote(url.to_string())));
        assert_eq!(resolver.primary.call_count(), 4);
        assert_eq!(
            resolver.secondary.calls.borrow().as_slice(),
            ["Clay-colored Thrush", "Turdus grayi"]
        );
        assert_eq!(store.cached("t1"), Some(CacheEntry::Found(url.to_string())));
    }

    #[tokio::test]
    async fn test_exhaustion_writes_sentinel_once() {
        let (store, resolver) = resolver(FakeProvider::default(), FakeProvider::default());
        assert_eq!(resolver.resolve(&thrush()).await, None);
        assert_eq!(store.cached("t1"), Some(CacheEntry::NotFound));
        assert_eq!(calls(&resolver), 6);

        assert_eq!(resolver.resolve(&thrush()).await, None);
        assert_eq!(calls(&resolver), 6);
        assert_eq!(store.cache_writes.get(), 1);
    }
}
