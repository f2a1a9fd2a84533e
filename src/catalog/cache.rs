use std::collections::{BTreeMap, HashSet};

use parking_lot::Mutex;

use super::gateway::CatalogGateway;
use super::product::{Cursor, PageEntry};
use crate::error::Error;

/// What a call to [`PageCache::load`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The page was fetched and stored.
    Fetched,
    /// The page was already cached; no request was made.
    Cached,
    /// A fetch for the page was already in flight; this call joined it.
    Coalesced,
    /// The cache was reset while the fetch was in flight; its result was dropped.
    Discarded,
}

#[derive(Default)]
struct CacheState {
    pages: BTreeMap<u32, PageEntry>,
    pending: HashSet<u32>,
    error: Option<String>,
    generation: u64,
}

impl CacheState {
    fn resolve_cursor(&self, page: u32) -> Result<Option<Cursor>, Error> {
        match page {
            0 => Err(Error::InvalidPage(page)),
            1 => Ok(None),
            _ => self
                .pages
                .get(&(page - 1))
                .and_then(|prev| prev.end_cursor.clone())
                .map(Some)
                .ok_or(Error::CursorChainBroken { page }),
        }
    }
}

/// Page-indexed cache over a cursor-paginated [`CatalogGateway`].
///
/// Page `p > 1` can only be fetched once page `p - 1` is cached with an end
/// cursor. At most one fetch per page is in flight; fetches for distinct pages
/// are independent. Pages are never evicted.
pub struct PageCache<G> {
    gateway: G,
    page_size: u32,
    state: Mutex<CacheState>,
}

impl<G: CatalogGateway> PageCache<G> {
    #[must_use]
    pub fn new(gateway: G, page_size: u32) -> Self {
        Self {
            gateway,
            page_size,
            state: Mutex::new(CacheState::default()),
        }
    }

    #[must_use]
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    #[must_use]
    pub fn get(&self, page: u32) -> Option<PageEntry> {
        self.state.lock().pages.get(&page).cloned()
    }

    /// The `after` cursor for `page`: `None` for page 1, otherwise the end
    /// cursor of the previous page.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPage`] for page 0, [`Error::CursorChainBroken`] when the
    /// previous page is missing or has no end cursor.
    pub fn resolve_cursor(&self, page: u32) -> Result<Option<Cursor>, Error> {
        self.state.lock().resolve_cursor(page)
    }

    /// Fetches and stores `page` unless it is cached or already in flight.
    ///
    /// A gateway failure is recorded as the cache's error string and leaves
    /// the page retryable; cached pages are untouched.
    ///
    /// # Errors
    ///
    /// Cursor resolution errors (see [`resolve_cursor`](Self::resolve_cursor))
    /// and gateway errors.
    pub async fn load(&self, page: u32) -> Result<LoadOutcome, Error> {
        let (cursor, generation) = {
            let mut state = self.state.lock();
            if page == 0 {
                return Err(Error::InvalidPage(page));
            }
            if state.pages.contains_key(&page) {
                tracing::debug!(page, "Page cache hit");
                return Ok(LoadOutcome::Cached);
            }
            if state.pending.contains(&page) {
                tracing::debug!(page, "Page fetch already in flight");
                return Ok(LoadOutcome::Coalesced);
            }
            let cursor = state.resolve_cursor(page)?;
            state.pending.insert(page);
            state.error = None;
            (cursor, state.generation)
        };

        let result = self
            .gateway
            .fetch_products(self.page_size, cursor.as_ref())
            .await;

        let mut state = self.state.lock();
        if state.generation != generation {
            tracing::debug!(page, "Discarding page fetched before reset");
            return Ok(LoadOutcome::Discarded);
        }
        state.pending.remove(&page);

        match result {
            Ok(fetched) => {
                let entry = PageEntry::new(page, fetched);
                tracing::info!(
                    page,
                    items = entry.items.len(),
                    has_next_page = entry.has_next_page,
                    "Page stored"
                );
                state.pages.insert(page, entry);
                Ok(LoadOutcome::Fetched)
            }
            Err(e) => {
                tracing::warn!(page, error = %e, "Page fetch failed");
                state.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Drops every page, pending marker and error. Fetches still in flight
    /// are discarded when they complete.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.pages.clear();
        state.pending.clear();
        state.error = None;
        state.generation = state.generation.wrapping_add(1);
        tracing::debug!("Page cache reset");
    }

    /// Message of the last failed fetch.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    pub fn clear_error(&self) {
        self.state.lock().error = None;
    }

    #[must_use]
    pub fn is_pending(&self, page: u32) -> bool {
        self.state.lock().pending.contains(&page)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        !self.state.lock().pending.is_empty()
    }

    /// Cached page numbers in ascending order.
    #[must_use]
    pub fn cached_pages(&self) -> Vec<u32> {
        self.state.lock().pages.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordedFetch, ScriptedCatalog, page};

    fn two_page_catalog() -> ScriptedCatalog {
        ScriptedCatalog::new()
            .with_page(None, page(&["A", "B"], Some("c1"), true))
            .with_page(Some("c1"), page(&["C"], Some("c2"), false))
    }

    #[tokio::test]
    async fn test_load_first_page_uses_start_sentinel() {
        let catalog = two_page_catalog();
        let cache = PageCache::new(catalog.clone(), 2);

        assert_eq!(cache.load(1).await.unwrap(), LoadOutcome::Fetched);
        let entry = cache.get(1).unwrap();
        assert_eq!(entry.items.len(), 2);
        assert_eq!(entry.end_cursor, Some(Cursor::from("c1")));
        assert_eq!(
            catalog.calls(),
            vec![RecordedFetch {
                first: 2,
                after: None
            }]
        );
    }

    #[tokio::test]
    async fn test_second_page_uses_previous_end_cursor() {
        let catalog = two_page_catalog();
        let cache = PageCache::new(catalog.clone(), 2);
        cache.load(1).await.unwrap();
        cache.load(2).await.unwrap();

        assert_eq!(catalog.calls()[1].after.as_deref(), Some("c1"));
        let entry = cache.get(2).unwrap();
        assert!(!entry.has_next_page);
        assert_eq!(cache.cached_pages(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_cursor_chain_broken_without_previous_page() {
        let catalog = two_page_catalog();
        let cache = PageCache::new(catalog.clone(), 2);

        assert!(matches!(
            cache.resolve_cursor(2),
            Err(Error::CursorChainBroken { page: 2 })
        ));
        assert!(matches!(
            cache.load(3).await,
            Err(Error::CursorChainBroken { page: 3 })
        ));
        assert!(catalog.calls().is_empty());
        assert!(cache.error().is_none());
        assert!(!cache.is_pending(3));
    }

    #[tokio::test]
    async fn test_cursor_chain_broken_without_end_cursor() {
        let catalog = ScriptedCatalog::new().with_page(None, page(&["A"], None, true));
        let cache = PageCache::new(catalog, 1);
        cache.load(1).await.unwrap();

        assert!(matches!(
            cache.resolve_cursor(2),
            Err(Error::CursorChainBroken { page: 2 })
        ));
    }

    #[tokio::test]
    async fn test_page_zero_is_invalid() {
        let cache = PageCache::new(two_page_catalog(), 2);
        assert!(matches!(cache.resolve_cursor(0), Err(Error::InvalidPage(0))));
        assert!(matches!(cache.load(0).await, Err(Error::InvalidPage(0))));
        assert_eq!(cache.resolve_cursor(1).unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_one_fetch() {
        let catalog = two_page_catalog();
        let cache = PageCache::new(catalog.clone(), 2);

        let (first, second) = tokio::join!(cache.load(1), cache.load(1));
        assert_eq!(first.unwrap(), LoadOutcome::Fetched);
        assert_eq!(second.unwrap(), LoadOutcome::Coalesced);
        assert_eq!(catalog.calls().len(), 1);
        assert!(!cache.is_loading());
    }

    #[tokio::test]
    async fn test_cached_page_is_not_fetched_again() {
        let catalog = two_page_catalog();
        let cache = PageCache::new(catalog.clone(), 2);
        cache.load(1).await.unwrap();

        assert_eq!(cache.load(1).await.unwrap(), LoadOutcome::Cached);
        assert_eq!(catalog.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_records_error_and_stays_retryable() {
        let catalog = two_page_catalog();
        let cache = PageCache::new(catalog.clone(), 2);
        cache.load(1).await.unwrap();

        catalog.fail_next(502);
        let err = cache.load(2).await.unwrap_err();
        assert!(matches!(err, Error::GatewayHttp { status: 502 }));
        assert_eq!(cache.error().as_deref(), Some("HTTP error! status: 502"));
        assert!(!cache.is_pending(2));
        assert!(cache.get(1).is_some());
        assert!(cache.get(2).is_none());

        assert_eq!(cache.load(2).await.unwrap(), LoadOutcome::Fetched);
        assert!(cache.error().is_none());
    }

    #[tokio::test]
    async fn test_clear_error() {
        let catalog = two_page_catalog();
        let cache = PageCache::new(catalog.clone(), 2);
        catalog.fail_next(500);
        cache.load(1).await.unwrap_err();

        cache.clear_error();
        assert!(cache.error().is_none());
    }

    #[tokio::test]
    async fn test_reset_clears_pages() {
        let cache = PageCache::new(two_page_catalog(), 2);
        cache.load(1).await.unwrap();
        cache.load(2).await.unwrap();

        cache.reset();
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_none());
        assert!(cache.cached_pages().is_empty());
    }

    #[tokio::test]
    async fn test_reset_discards_in_flight_fetch() {
        let catalog = two_page_catalog();
        let cache = PageCache::new(catalog.clone(), 2);

        let (outcome, ()) = tokio::join!(cache.load(1), async {
            assert!(cache.is_pending(1));
            cache.reset();
        });
        assert_eq!(outcome.unwrap(), LoadOutcome::Discarded);
        assert!(cache.get(1).is_none());
        assert!(!cache.is_loading());

        assert_eq!(cache.load(1).await.unwrap(), LoadOutcome::Fetched);
        assert_eq!(catalog.calls().len(), 2);
    }
}
