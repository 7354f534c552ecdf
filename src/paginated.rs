//! Per-view paginated, filtered query state.
//!
//! A [`PaginatedQuery`] owns `{page, page_size, filters}` for one table view
//! and the latest [`Page`] snapshot fetched for it. State changes bump a
//! generation counter and wake the view's poller through a [`Notify`]
//! trigger; a response whose generation is stale when it settles is dropped,
//! so a slow answer for an old page can never overwrite a newer one.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use async_trait::async_trait;
use tokio::sync::{watch, Notify};
use tracing::{debug, info, warn};

use crate::backend::{
    errors::ApiError,
    models::{Alert, Page, SensorReading},
    query::{FilterChange, Filters, ListQuery},
    ApiClient,
};

/// Something that can answer a [`ListQuery`] with one page of `T`.
#[async_trait]
pub trait PageSource<T: Send>: Send + Sync {
    async fn fetch_page(&self, query: &ListQuery) -> Result<Page<T>, ApiError>;
}

#[async_trait]
impl PageSource<SensorReading> for ApiClient {
    async fn fetch_page(&self, query: &ListQuery) -> Result<Page<SensorReading>, ApiError> {
        self.sensor_data(query).await
    }
}

#[async_trait]
impl PageSource<Alert> for ApiClient {
    async fn fetch_page(&self, query: &ListQuery) -> Result<Page<Alert>, ApiError> {
        self.alerts(query).await
    }
}

#[async_trait]
impl<T: Send, S: PageSource<T>> PageSource<T> for Arc<S> {
    async fn fetch_page(&self, query: &ListQuery) -> Result<Page<T>, ApiError> {
        (**self).fetch_page(query).await
    }
}

/// Result of a [`PaginatedQuery::refresh`] that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The response was stored (or was identical to the stored snapshot).
    Applied,
    /// Page or filters changed while the request was in flight; the
    /// response was dropped.
    Superseded,
    /// The query was closed; nothing was fetched or stored.
    Closed,
}

pub type Snapshot<T> = Option<Arc<Page<T>>>;

#[derive(Debug)]
struct QueryState {
    page: u32,
    filters: Filters,
    generation: u64,
    /// Page count of the last stored snapshot, once one exists.
    known_pages: Option<u32>,
}

pub struct PaginatedQuery<T, S> {
    name: String,
    source: S,
    page_size: u32,
    state: Mutex<QueryState>,
    in_flight: tokio::sync::Mutex<()>,
    snapshot: watch::Sender<Snapshot<T>>,
    trigger: Arc<Notify>,
    alive: AtomicBool,
    failures: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl<T, S> PaginatedQuery<T, S>
where
    T: PartialEq + Send + Sync + 'static,
    S: PageSource<T>,
{
    pub fn new(name: impl Into<String>, source: S, page_size: u32) -> Self {
        Self::with_filters(name, source, page_size, Filters::default())
    }

    pub fn with_filters(
        name: impl Into<String>,
        source: S,
        page_size: u32,
        filters: Filters,
    ) -> Self {
        let (snapshot, _) = watch::channel(None);
        Self {
            name: name.into(),
            source,
            page_size: page_size.max(1),
            state: Mutex::new(QueryState {
                page: 1,
                filters,
                generation: 0,
                known_pages: None,
            }),
            in_flight: tokio::sync::Mutex::new(()),
            snapshot,
            trigger: Arc::new(Notify::new()),
            alive: AtomicBool::new(true),
            failures: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn page(&self) -> u32 {
        self.state().page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn filters(&self) -> Filters {
        self.state().filters.clone()
    }

    /// The request the next refresh will issue.
    pub fn query(&self) -> ListQuery {
        let s = self.state();
        ListQuery {
            page: s.page,
            page_size: self.page_size,
            filters: s.filters.clone(),
        }
    }

    /// Notified whenever page or filters change. Hand this to the poller.
    pub fn trigger(&self) -> Arc<Notify> {
        self.trigger.clone()
    }

    /// Update one filter and return to page 1.
    pub fn set_filter(&self, change: FilterChange) {
        {
            let mut s = self.state();
            s.filters.apply(change);
            s.page = 1;
            s.generation += 1;
            debug!(query = %self.name, filters = ?s.filters, "Filter changed; back to page 1");
        }
        self.trigger.notify_one();
    }

    /// Move to page `n`. Returns `false` (and changes nothing) when `n` is 0
    /// or, once a page has been loaded, beyond the last page.
    pub fn set_page(&self, n: u32) -> bool {
        {
            let mut s = self.state();
            if n < 1 || s.known_pages.is_some_and(|last| n > last) {
                debug!(query = %self.name, requested = n, last = ?s.known_pages, "Page out of range");
                return false;
            }
            if n == s.page {
                return true;
            }
            s.page = n;
            s.generation += 1;
        }
        self.trigger.notify_one();
        true
    }

    pub fn next_page(&self) -> bool {
        let page = self.page();
        self.set_page(page.saturating_add(1))
    }

    pub fn prev_page(&self) -> bool {
        let page = self.page();
        self.set_page(page.saturating_sub(1))
    }

    /// Fetch the current page and store it.
    ///
    /// Only one fetch runs at a time; concurrent callers queue behind it. On
    /// error the previous snapshot is kept, the failure is recorded and
    /// returned.
    pub async fn refresh(&self) -> Result<RefreshOutcome, ApiError> {
        if !self.is_alive() {
            return Ok(RefreshOutcome::Closed);
        }
        let _in_flight = self.in_flight.lock().await;
        if !self.is_alive() {
            return Ok(RefreshOutcome::Closed);
        }

        let (query, generation) = {
            let s = self.state();
            let query = ListQuery {
                page: s.page,
                page_size: self.page_size,
                filters: s.filters.clone(),
            };
            (query, s.generation)
        };

        let result = self.source.fetch_page(&query).await;

        if !self.is_alive() {
            debug!(query = %self.name, "Response after close ignored");
            return Ok(RefreshOutcome::Closed);
        }

        let mut s = self.state();
        if s.generation != generation {
            debug!(
                query = %self.name,
                page = query.page,
                "Discarding response for superseded query"
            );
            return Ok(RefreshOutcome::Superseded);
        }

        match result {
            Ok(page) => {
                s.known_pages = Some(page.page_count());
                self.snapshot.send_if_modified(|current| {
                    if current.as_deref() == Some(&page) {
                        return false;
                    }
                    *current = Some(Arc::new(page));
                    true
                });
                drop(s);
                *self.last_error() = None;
                Ok(RefreshOutcome::Applied)
            }
            Err(e) => {
                drop(s);
                self.failures.fetch_add(1, Ordering::Relaxed);
                *self.last_error() = Some(e.to_string());
                warn!(query = %self.name, page = query.page, error = %e, "Refresh failed; keeping previous page");
                Err(e)
            }
        }
    }

    fn last_error(&self) -> MutexGuard<'_, Option<String>> {
        self.last_error.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Latest stored page, if any fetch has succeeded yet.
    pub fn snapshot(&self) -> Snapshot<T> {
        self.snapshot.borrow().clone()
    }

    /// Receiver that observes every newly stored page.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.snapshot.subscribe()
    }

    /// Message of the most recent failed refresh, cleared by the next success.
    pub fn last_failure(&self) -> Option<String> {
        self.last_error().clone()
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Tear down. Responses that settle afterwards are ignored.
    pub fn close(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            info!(query = %self.name, "Query closed");
        }
    }
}

/// Pagination controls for a table footer: up to five page numbers starting
/// two before the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageNav {
    pub current: u32,
    pub total_pages: u32,
    pub total: u64,
    pub numbers: Vec<u32>,
    pub has_prev: bool,
    pub has_next: bool,
}

impl PageNav {
    pub const WINDOW: u32 = 5;

    /// Built from the stored page alone, so the footer always agrees with
    /// the rows it sits under, even while a newer page is being fetched.
    pub fn new<T>(page: &Page<T>) -> Self {
        let current = page.page;
        let total_pages = page.page_count();
        let start = current.saturating_sub(2).max(1);
        let numbers = (start..start + Self::WINDOW)
            .take_while(|p| *p <= total_pages)
            .collect();
        Self {
            current,
            total_pages,
            total: page.total,
            numbers,
            has_prev: current > 1,
            has_next: current < total_pages,
        }
    }

    pub fn label(&self) -> String {
        format!(
            "Page {} of {} ({} total)",
            self.current, self.total_pages, self.total
        )
    }
}
