use std::sync::Arc;

use parking_lot::Mutex;

use super::cache::{LoadOutcome, PageCache};
use super::gateway::CatalogGateway;
use super::product::{PageEntry, Product};
use crate::error::Error;

#[derive(Debug, Clone, Copy)]
struct Nav {
    current: u32,
    requested: u32,
}

impl Default for Nav {
    fn default() -> Self {
        Self {
            current: 1,
            requested: 1,
        }
    }
}

/// Next/previous navigation over a [`PageCache`].
///
/// The visible page only advances once the requested page is cached, so a
/// failed or in-flight fetch leaves the current items on screen.
pub struct PaginationController<G> {
    cache: Arc<PageCache<G>>,
    nav: Mutex<Nav>,
}

impl<G: CatalogGateway> PaginationController<G> {
    #[must_use]
    pub fn new(cache: Arc<PageCache<G>>) -> Self {
        Self {
            cache,
            nav: Mutex::new(Nav::default()),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<PageCache<G>> {
        &self.cache
    }

    #[must_use]
    pub fn current_page(&self) -> u32 {
        self.nav.lock().current
    }

    #[must_use]
    pub fn requested_page(&self) -> u32 {
        self.nav.lock().requested
    }

    #[must_use]
    pub fn current_entry(&self) -> Option<PageEntry> {
        self.cache.get(self.current_page())
    }

    /// Items of the visible page; empty until it is loaded.
    #[must_use]
    pub fn current_items(&self) -> Vec<Product> {
        self.current_entry().map(|e| e.items).unwrap_or_default()
    }

    /// `true` while the visible page is not loaded yet.
    #[must_use]
    pub fn has_next_page(&self) -> bool {
        self.current_entry().is_none_or(|e| e.has_next_page)
    }

    #[must_use]
    pub fn has_previous_page(&self) -> bool {
        self.current_page() > 1
    }

    /// Requests the page after the visible one.
    ///
    /// A no-op when the visible page is not loaded, reports no next page or
    /// has no end cursor, or when the next page is already being fetched.
    ///
    /// # Errors
    ///
    /// Propagates the fetch error; the visible page does not change.
    pub async fn go_next(&self) -> Result<(), Error> {
        {
            let mut nav = self.nav.lock();
            let Some(entry) = self.cache.get(nav.current) else {
                return Ok(());
            };
            if !entry.has_next_page || entry.end_cursor.is_none() {
                tracing::debug!(page = nav.current, "Already on the last page");
                return Ok(());
            }
            let next = nav.current + 1;
            if self.cache.is_pending(next) {
                return Ok(());
            }
            nav.requested = next;
        }
        self.sync().await
    }

    /// Steps back one page. Earlier pages are always cached, so this never
    /// touches the network.
    ///
    /// # Errors
    ///
    /// Only if the previous page was dropped by a concurrent reset and its
    /// refetch fails.
    pub async fn go_previous(&self) -> Result<(), Error> {
        {
            let mut nav = self.nav.lock();
            if nav.current <= 1 {
                return Ok(());
            }
            nav.requested = nav.current - 1;
        }
        self.sync().await
    }

    /// Shows the requested page if cached, otherwise loads it and advances
    /// once it arrives. Also used for the initial page-1 load.
    ///
    /// # Errors
    ///
    /// Propagates [`PageCache::load`] errors.
    pub async fn sync(&self) -> Result<(), Error> {
        let requested = {
            let mut nav = self.nav.lock();
            if self.cache.get(nav.requested).is_some() {
                nav.current = nav.requested;
                return Ok(());
            }
            nav.requested
        };

        let outcome = self.cache.load(requested).await?;
        if outcome == LoadOutcome::Coalesced {
            return Ok(());
        }

        let mut nav = self.nav.lock();
        if nav.requested == requested && self.cache.get(requested).is_some() {
            nav.current = requested;
        }
        Ok(())
    }

    /// Clears the cache error and fetches the requested page again.
    ///
    /// # Errors
    ///
    /// Propagates [`PageCache::load`] errors.
    pub async fn retry(&self) -> Result<(), Error> {
        self.cache.clear_error();
        self.sync().await
    }

    /// Clears the cache and returns to page 1 without fetching it.
    pub fn reset(&self) {
        let mut nav = self.nav.lock();
        self.cache.reset();
        *nav = Nav::default();
    }
}
