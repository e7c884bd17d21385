//! Page fetch orchestration.
//!
//! The loader owns the pending/failed bookkeeping; the cache is passed in by
//! the table so both stay single-owner on the frame loop thread.
//!
//! Every request is tagged with the generation current at dispatch time.
//! Discontinuous navigation bumps the generation, which turns every response
//! still in flight into a no-op when it arrives. Cancellation is logical only:
//! the request itself runs to completion.

use super::async_bridge::TableMessage;
use super::executor::TaskExecutor;
use super::page_source::{LookupRequest, PageRequest, PageResponse, PageSource};
use crate::error::TableError;
use crate::model::query::QueryScope;
use crate::model::row::{decode_page_rows, PageGeometry, PageIndex};
use crate::model::row_cache::RowCache;
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;

/// Monotonic request epoch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    AlreadyCached,
    AlreadyPending,
    Issued,
    /// The page failed with an error that retrying will not fix
    Failed,
    /// Page index beyond the dataset
    OutOfRange,
}

/// Result of applying a current-generation page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedPage {
    pub page: PageIndex,
    pub rows: usize,
    /// Dataset size reported by the response envelope, if any
    pub total_rows: Option<u64>,
}

#[derive(Debug, Clone)]
struct PageFailure {
    message: String,
    retryable: bool,
}

pub struct PageLoader {
    source: Arc<dyn PageSource>,
    executor: Arc<dyn TaskExecutor>,
    sender: mpsc::Sender<TableMessage>,
    geometry: PageGeometry,
    generation: Generation,
    /// At most one in-flight request per page, with the generation it was issued under
    pending: HashMap<PageIndex, Generation>,
    /// Pages whose last current-generation fetch failed
    failed: HashMap<PageIndex, PageFailure>,
    requests_issued: u64,
}

impl std::fmt::Debug for PageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageLoader")
            .field("generation", &self.generation)
            .field("pending", &self.pending)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

impl PageLoader {
    pub fn new(
        source: Arc<dyn PageSource>,
        executor: Arc<dyn TaskExecutor>,
        sender: mpsc::Sender<TableMessage>,
        geometry: PageGeometry,
    ) -> Self {
        Self {
            source,
            executor,
            sender,
            geometry,
            generation: Generation::default(),
            pending: HashMap::new(),
            failed: HashMap::new(),
            requests_issued: 0,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    /// Make sure `page` is cached or on its way
    ///
    /// A page that failed with a retryable error is fetched again; any other
    /// failure sticks until `reset`.
    pub fn ensure(
        &mut self,
        page: PageIndex,
        total_rows: u64,
        cache: &RowCache,
        scope: &QueryScope,
    ) -> EnsureOutcome {
        if page >= self.geometry.page_count(total_rows) {
            return EnsureOutcome::OutOfRange;
        }
        if cache.contains_page(page) {
            return EnsureOutcome::AlreadyCached;
        }
        if self.pending.contains_key(&page) {
            return EnsureOutcome::AlreadyPending;
        }
        match self.failed.get(&page) {
            Some(failure) if !failure.retryable => return EnsureOutcome::Failed,
            Some(_) => {
                self.failed.remove(&page);
                tracing::debug!("Retrying failed page {}", page);
            }
            None => {}
        }
        self.dispatch(page, scope);
        EnsureOutcome::Issued
    }

    fn dispatch(&mut self, page: PageIndex, scope: &QueryScope) {
        let generation = self.generation;
        let request = PageRequest {
            page,
            offset: self.geometry.offset(page),
            limit: self.geometry.limit(),
            scope: scope.clone(),
        };
        self.pending.insert(page, generation);
        self.requests_issued += 1;
        tracing::debug!(
            "Requesting page {} (offset {}) under {}",
            page,
            request.offset,
            generation
        );

        let source = self.source.clone();
        let sender = self.sender.clone();
        self.executor.execute(Box::new(move || {
            let result = source.fetch_page(&request);
            // The table may already be gone
            let _ = sender.send(TableMessage::PageLoaded {
                page,
                generation,
                result,
            });
        }));
    }

    /// Apply a finished fetch
    ///
    /// Stale responses (success or failure) free the pending slot and return
    /// `StaleResponse` without touching the cache. A current-generation failure
    /// marks the page failed and returns the error.
    pub fn on_page_loaded(
        &mut self,
        page: PageIndex,
        generation: Generation,
        result: Result<PageResponse, TableError>,
        cache: &mut RowCache,
    ) -> Result<AppliedPage, TableError> {
        if self.pending.get(&page) == Some(&generation) {
            self.pending.remove(&page);
        }

        if generation != self.generation {
            tracing::debug!(
                "Dropping stale response for page {} ({} != {})",
                page,
                generation,
                self.generation
            );
            return Err(TableError::StaleResponse { page });
        }

        match result {
            Ok(response) => {
                let total_rows = response.total_rows();
                let rows = decode_page_rows(response.rows, page, &self.geometry);
                let count = rows.len();
                cache.put(page, rows);
                self.failed.remove(&page);
                Ok(AppliedPage {
                    page,
                    rows: count,
                    total_rows,
                })
            }
            Err(err) => {
                tracing::warn!("Page {} failed to load: {}", page, err);
                self.failed.insert(
                    page,
                    PageFailure {
                        message: err.to_string(),
                        retryable: err.is_retryable(),
                    },
                );
                Err(err)
            }
        }
    }

    /// Start a new generation; responses issued earlier become stale
    pub fn bump_generation(&mut self) -> Generation {
        self.generation = self.generation.next();
        tracing::debug!("Generation bumped to {}", self.generation);
        self.generation
    }

    /// Dataset reset: new generation and no remembered failures.
    ///
    /// Pending entries stay until their (now stale) responses arrive so a
    /// page never has two requests in flight.
    pub fn reset(&mut self) -> Generation {
        self.failed.clear();
        self.bump_generation()
    }

    /// Forget the retryable failures, returning their pages (ascending).
    /// Permanent failures stay recorded.
    pub fn take_retryable(&mut self) -> Vec<PageIndex> {
        let mut pages: Vec<_> = self
            .failed
            .iter()
            .filter(|(_, failure)| failure.retryable)
            .map(|(page, _)| *page)
            .collect();
        pages.sort_unstable();
        for page in &pages {
            self.failed.remove(page);
        }
        pages
    }

    pub fn is_pending(&self, page: PageIndex) -> bool {
        self.pending.contains_key(&page)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn failure(&self, page: PageIndex) -> Option<&str> {
        self.failed.get(&page).map(|failure| failure.message.as_str())
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Total fetches dispatched since creation
    pub fn requests_issued(&self) -> u64 {
        self.requests_issued
    }

    /// Run a search-by-value lookup on the executor
    pub fn dispatch_lookup(&self, ticket: u64, request: LookupRequest) {
        tracing::debug!(
            "Dispatching lookup #{} for {}={}",
            ticket,
            request.field,
            request.value
        );
        let source = self.source.clone();
        let sender = self.sender.clone();
        self.executor.execute(Box::new(move || {
            let result = source.lookup(&request);
            let _ = sender.send(TableMessage::LookupResolved { ticket, result });
        }));
    }
}
