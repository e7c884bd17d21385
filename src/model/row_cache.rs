//! Bounded row store with page-granularity eviction.
//!
//! Rows are stored per page in an `LruCache` keyed by page index. The cache
//! itself is unbounded; eviction runs explicitly through `evict_outside` once
//! the total row count exceeds the cleanup threshold, and never removes a page
//! in the range the caller keeps.

use super::row::{PageGeometry, PageIndex, Row, RowId};
use lru::LruCache;
use std::collections::{BTreeSet, HashMap};
use std::ops::RangeInclusive;

/// One resident page
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub page: PageIndex,
    rows: HashMap<RowId, Row>,
    /// Logical clock value of the last access
    pub last_access: u64,
}

impl CacheEntry {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub struct RowCache {
    pages: LruCache<PageIndex, CacheEntry>,
    geometry: PageGeometry,
    cleanup_threshold: usize,
    /// Pages supplied locally rather than fetched; never evicted
    pinned: BTreeSet<PageIndex>,
    row_count: usize,
    clock: u64,
}

impl std::fmt::Debug for RowCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowCache")
            .field("pages", &self.pages.len())
            .field("row_count", &self.row_count)
            .field("cleanup_threshold", &self.cleanup_threshold)
            .finish()
    }
}

impl RowCache {
    pub fn new(geometry: PageGeometry, cleanup_threshold: usize) -> Self {
        Self {
            pages: LruCache::unbounded(),
            geometry,
            cleanup_threshold,
            pinned: BTreeSet::new(),
            row_count: 0,
            clock: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Look up a row without changing recency
    pub fn get(&self, id: RowId) -> Option<&Row> {
        let page = self.geometry.page_of(id);
        self.pages.peek(&page).and_then(|entry| entry.rows.get(&id))
    }

    pub fn contains_page(&self, page: PageIndex) -> bool {
        self.pages.contains(&page)
    }

    /// Insert (or replace) a page's rows and mark it most recently used
    pub fn put(&mut self, page: PageIndex, rows: Vec<Row>) {
        let now = self.tick();
        let rows: HashMap<RowId, Row> = rows.into_iter().map(|row| (row.id(), row)).collect();
        let added = rows.len();
        let entry = CacheEntry {
            page,
            rows,
            last_access: now,
        };
        if let Some(previous) = self.pages.put(page, entry) {
            self.row_count -= previous.len();
        }
        self.row_count += added;
        tracing::trace!(
            "Cached page {} ({} rows, {} total)",
            page,
            added,
            self.row_count
        );
    }

    /// Insert a locally supplied page that eviction must keep
    pub fn put_pinned(&mut self, page: PageIndex, rows: Vec<Row>) {
        self.put(page, rows);
        self.pinned.insert(page);
    }

    pub fn is_pinned(&self, page: PageIndex) -> bool {
        self.pinned.contains(&page)
    }

    /// Resident rows in id order
    pub fn rows_by_id(&self) -> Vec<&Row> {
        let mut rows: Vec<&Row> = self
            .pages
            .iter()
            .flat_map(|(_, entry)| entry.rows.values())
            .collect();
        rows.sort_unstable_by_key(|row| row.id());
        rows
    }

    /// First resident row (lowest id) matching `predicate`
    pub fn find(&self, predicate: impl Fn(&Row) -> bool) -> Option<&Row> {
        self.pages
            .iter()
            .flat_map(|(_, entry)| entry.rows.values())
            .filter(|row| predicate(row))
            .min_by_key(|row| row.id())
    }

    /// Make `head` row 1 and move every resident row one id down
    ///
    /// Rows that cross a page boundary move into the next page. A page that
    /// is left with a gap among its first `total_rows` ids is dropped so it
    /// gets fetched again. Returns the dropped pages.
    pub fn insert_head(&mut self, head: Row, total_rows: u64) -> Vec<PageIndex> {
        let mut old = std::mem::replace(&mut self.pages, LruCache::unbounded());
        let old_pinned = std::mem::take(&mut self.pinned);
        let head_page_resident = old.contains(&0);

        let mut rank: HashMap<PageIndex, usize> = HashMap::new();
        let mut shifted: HashMap<PageIndex, HashMap<RowId, Row>> = HashMap::new();
        let mut position = 0;
        while let Some((page, entry)) = old.pop_lru() {
            rank.insert(page, position);
            position += 1;
            for (_, row) in entry.rows {
                let id = row.id() + 1;
                shifted
                    .entry(self.geometry.page_of(id))
                    .or_default()
                    .insert(id, row.with_id(id));
            }
        }
        if head_page_resident {
            shifted.entry(0).or_default().insert(1, head.with_id(1));
        }

        let mut kept: Vec<(usize, PageIndex, HashMap<RowId, Row>)> = Vec::new();
        let mut dropped = Vec::new();
        for (page, rows) in shifted {
            let last = self.geometry.last_id(page).min(total_rows);
            let complete = (self.geometry.first_id(page)..=last).all(|id| rows.contains_key(&id));
            if complete {
                let previous = page.checked_sub(1).and_then(|p| rank.get(&p)).copied();
                let recency = rank.get(&page).copied().max(previous).unwrap_or(0);
                kept.push((recency, page, rows));
            } else {
                dropped.push(page);
            }
        }

        self.row_count = 0;
        kept.sort_unstable_by_key(|(recency, page, _)| (*recency, *page));
        for (_, page, rows) in kept {
            let pinned = old_pinned.contains(&page)
                || page.checked_sub(1).is_some_and(|p| old_pinned.contains(&p));
            let rows: Vec<Row> = rows.into_values().collect();
            if pinned {
                self.put_pinned(page, rows);
            } else {
                self.put(page, rows);
            }
        }

        dropped.sort_unstable();
        if !dropped.is_empty() {
            tracing::debug!("Head insert left gaps, dropped pages {:?}", dropped);
        }
        dropped
    }

    /// Mark a page as recently used
    pub fn touch(&mut self, page: PageIndex) {
        let now = self.tick();
        if let Some(entry) = self.pages.get_mut(&page) {
            entry.last_access = now;
        }
    }

    /// Touch every resident page overlapping `range`
    pub fn touch_range(&mut self, range: &RangeInclusive<RowId>) {
        if range.is_empty() {
            return;
        }
        for page in self.geometry.pages_for(range) {
            self.touch(page);
        }
    }

    /// Overwrite a single row if its page is resident. Returns whether it was applied.
    pub fn upsert(&mut self, row: Row) -> bool {
        let page = self.geometry.page_of(row.id());
        match self.pages.peek_mut(&page) {
            Some(entry) => {
                if entry.rows.insert(row.id(), row).is_none() {
                    self.row_count += 1;
                }
                true
            }
            None => false,
        }
    }

    /// Evict least recently used pages outside `keep` until the row count is
    /// back under the threshold.
    ///
    /// Returns the evicted page indices in eviction order.
    pub fn evict_outside(&mut self, keep: &RangeInclusive<PageIndex>) -> Vec<PageIndex> {
        if self.row_count <= self.cleanup_threshold {
            return Vec::new();
        }

        // LruCache iterates most recent first
        let candidates: Vec<PageIndex> = self
            .pages
            .iter()
            .rev()
            .map(|(page, _)| *page)
            .filter(|page| !keep.contains(page) && !self.pinned.contains(page))
            .collect();

        let mut evicted = Vec::new();
        for page in candidates {
            if self.row_count <= self.cleanup_threshold {
                break;
            }
            if let Some(entry) = self.pages.pop(&page) {
                self.row_count -= entry.len();
                evicted.push(page);
            }
        }

        if !evicted.is_empty() {
            tracing::debug!(
                "Evicted {} page(s) {:?}, {} rows remain",
                evicted.len(),
                evicted,
                self.row_count
            );
        }
        evicted
    }

    pub fn clear(&mut self) {
        self.pages.clear();
        self.pinned.clear();
        self.row_count = 0;
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Resident page indices, most recently used first
    pub fn pages(&self) -> Vec<PageIndex> {
        self.pages.iter().map(|(page, _)| *page).collect()
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }
}
