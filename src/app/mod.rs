mod host;
pub mod navigation;

pub use host::{HostGeometry, HostReady};
pub use navigation::{NavState, PendingNavigation};

use crate::config::TableConfig;
use crate::error::TableError;
use crate::model::columns::ColumnSet;
use crate::model::export::{write_csv, DatasetStats};
use crate::model::query::{QueryScope, SortState};
use crate::model::row::{decode_page_rows, PageGeometry, PageIndex, Row, RowId};
use crate::model::row_cache::RowCache;
use crate::services::async_bridge::{AsyncBridge, TableMessage};
use crate::services::executor::TaskExecutor;
use crate::services::page_loader::{EnsureOutcome, Generation, PageLoader};
use crate::services::page_source::{LookupRequest, PageResponse, PageSource};
use crate::services::settings::ColumnSettingsStore;
use crate::view::frame_queue::{FrameQueue, ScrollInput, ScrollStep};
use crate::view::layout::{TableLayout, DEFAULT_MAX_PANEL_RATIO};
use crate::view::row_renderer::{RenderStats, RowLookup, RowRenderer, RowSlot, RowState};
use crate::view::scrollbar::{ScrollOrigin, ScrollbarGeometry, ScrollbarSync};
use crate::view::viewport::{PrefetchSignal, ViewportWindow, WindowSample};
use navigation::{LookupOutcome, NavigationController};
use serde_json::Value;
use std::collections::VecDeque;
use std::io::Write;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

/// Everything the table talks to outside itself
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn PageSource>,
    pub executor: Arc<dyn TaskExecutor>,
    pub settings: Arc<dyn ColumnSettingsStore>,
    pub bridge: AsyncBridge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// Notifications for the host, drained with `drain_events`
#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent {
    StatusMessage { level: StatusLevel, text: String },
    NavigationSettled { found: bool },
    PageFailed { page: u64, message: String },
}

/// Snapshot of engine counters
#[derive(Debug, Clone, PartialEq)]
pub struct TableStats {
    pub total_rows: u64,
    pub cached_rows: usize,
    pub cached_pages: usize,
    pub pending_pages: usize,
    pub failed_pages: usize,
    pub generation: Generation,
    pub requests_issued: u64,
    pub render_range: Option<RangeInclusive<RowId>>,
    pub render_passes: u64,
    /// Scroll inputs folded into an already pending frame step
    pub coalesced_scrolls: u64,
    pub pool_size: usize,
    pub last_render: RenderStats,
}

/// What `update_or_add_row` did with a live record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowChange {
    /// Merged into the resident row with this id
    Updated(RowId),
    /// Inserted as row 1; every other row moved one id down
    Inserted,
    /// Not a JSON object
    Ignored,
}

/// Row states as seen through the cache and the loader
struct RowStates<'a> {
    cache: &'a RowCache,
    loader: &'a PageLoader,
    geometry: PageGeometry,
}

impl RowLookup for RowStates<'_> {
    fn row_state(&self, id: RowId) -> RowState<'_> {
        if let Some(row) = self.cache.get(id) {
            return RowState::Ready(row);
        }
        let page = self.geometry.page_of(id);
        if let Some(message) = self.loader.failure(page) {
            RowState::Failed(message)
        } else if self.cache.contains_page(page) {
            RowState::Missing
        } else {
            RowState::Loading
        }
    }
}

/// The table engine
///
/// Single owner, single thread. Fetches run on the executor and report back
/// through the bridge; `tick()` is the frame boundary where results, scroll
/// input and rendering are applied in that order.
pub struct VirtualTable {
    container_id: String,
    config: TableConfig,
    geometry: PageGeometry,
    window: ViewportWindow,
    frames: FrameQueue,
    cache: RowCache,
    loader: PageLoader,
    renderer: RowRenderer,
    scrollbar: ScrollbarSync,
    navigation: NavigationController,
    columns: ColumnSet,
    layout: TableLayout,
    scope: QueryScope,
    settings: Arc<dyn ColumnSettingsStore>,
    bridge: AsyncBridge,
    host: HostReady,
    host_geometry: Option<HostGeometry>,
    render_range: Option<RangeInclusive<RowId>>,
    /// Pages chosen by the last preload; eviction keeps these
    preload_pages: Option<RangeInclusive<PageIndex>>,
    needs_render: bool,
    force_render: bool,
    last_render: RenderStats,
    events: VecDeque<TableEvent>,
}

impl std::fmt::Debug for VirtualTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualTable")
            .field("container_id", &self.container_id)
            .field("scroll_top", &self.window.scroll_top())
            .field("total_rows", &self.window.total_rows())
            .field("render_range", &self.render_range)
            .finish()
    }
}

impl VirtualTable {
    /// Mount a table into `container_id`
    ///
    /// Saved column visibility is applied before the first render. If the host
    /// has not reported geometry yet, the first window is computed on the tick
    /// after it does.
    pub fn mount(
        container_id: &str,
        config: TableConfig,
        host: HostReady,
        collaborators: Collaborators,
    ) -> Result<Self, TableError> {
        Self::mount_with_scope(container_id, config, host, collaborators, QueryScope::default())
    }

    /// Mount with an initial session, filter and sort scope, so the first
    /// fetch and the saved column choices already use it
    pub fn mount_with_scope(
        container_id: &str,
        config: TableConfig,
        host: HostReady,
        collaborators: Collaborators,
        scope: QueryScope,
    ) -> Result<Self, TableError> {
        config.validate()?;

        let geometry = PageGeometry::new(config.limit);
        let Collaborators {
            source,
            executor,
            settings,
            bridge,
        } = collaborators;

        let loader = PageLoader::new(source, executor, bridge.sender(), geometry);
        let cache = RowCache::new(geometry, config.cleanup_threshold);
        let window = ViewportWindow::new(
            config.row_height,
            config.buffer,
            config.preload_threshold,
            config.total_rows,
        );

        let mut table = Self {
            container_id: container_id.to_string(),
            geometry,
            window,
            frames: FrameQueue::new(),
            cache,
            loader,
            renderer: RowRenderer::new(),
            scrollbar: ScrollbarSync::new(config.min_thumb),
            navigation: NavigationController::new(),
            columns: ColumnSet::new(config.columns.clone()),
            layout: TableLayout::new(1, config.min_panel_width, DEFAULT_MAX_PANEL_RATIO),
            scope,
            settings,
            bridge,
            host,
            host_geometry: None,
            render_range: None,
            preload_pages: None,
            needs_render: true,
            force_render: false,
            last_render: RenderStats::default(),
            events: VecDeque::new(),
            config,
        };

        table.load_column_settings();
        table.update_table_width();
        if let Some(geometry) = table.host.current() {
            table.resize(geometry);
            table.refresh_window();
            table.render_if_needed();
        }

        tracing::info!(
            "Mounted table '{}' ({} rows, page size {})",
            table.container_id,
            table.window.total_rows(),
            table.geometry.limit()
        );
        Ok(table)
    }

    /// Wait for the host to report geometry, then mount
    pub async fn mount_when_ready(
        container_id: &str,
        config: TableConfig,
        host: HostReady,
        collaborators: Collaborators,
        timeout: Duration,
    ) -> Result<Self, TableError> {
        host.wait(timeout).await?;
        Self::mount(container_id, config, host, collaborators)
    }

    /// Tear the table down. Any live navigation settles with `false`.
    pub fn destroy(mut self) {
        self.navigation.supersede();
        self.cache.clear();
        self.renderer.clear();
        tracing::info!("Destroyed table '{}'", self.container_id);
    }

    /// One frame: apply fetch results, the coalesced scroll step, prefetch
    /// and rendering. Returns true when the host should redraw.
    pub fn tick(&mut self) -> bool {
        let mut redraw = false;

        if let Some(geometry) = self.host.current() {
            if self.host_geometry != Some(geometry) {
                self.resize(geometry);
                redraw = true;
            }
        }

        for message in self.bridge.try_recv_all() {
            match message {
                TableMessage::PageLoaded {
                    page,
                    generation,
                    result,
                } => self.handle_page_loaded(page, generation, result),
                TableMessage::LookupResolved { ticket, result } => {
                    self.handle_lookup_resolved(ticket, result)
                }
            }
        }

        if let Some(step) = self.frames.take() {
            let target = step.apply(self.window.scroll_top());
            let applied = self.window.set_scroll_top(target);
            self.scrollbar.sync_to(applied, ScrollOrigin::User);
            redraw = true;
        }

        self.refresh_window();

        if let Some(range) = self.render_range.clone() {
            self.cache.touch_range(&range);
            let keep = self.kept_pages(&range);
            let evicted = self.cache.evict_outside(&keep);
            if !evicted.is_empty() {
                tracing::debug!("Evicted pages {:?}", evicted);
            }
        }

        redraw |= self.render_if_needed();
        redraw
    }

    /// Queue a scroll for the next tick
    pub fn scroll(&mut self, input: ScrollInput) {
        let step = input.resolve(
            self.window.row_height(),
            self.window.viewport_height(),
            self.window.max_scroll_top(),
        );
        self.frames.push(step);
    }

    /// The host's own scroll notification. Echoes of programmatic moves are dropped.
    pub fn on_native_scroll(&mut self, offset: f64) {
        if let Some(offset) = self.scrollbar.on_scroll_event(offset) {
            self.frames.push(ScrollStep {
                absolute: Some(offset),
                delta: 0.0,
            });
        }
    }

    pub fn begin_scrollbar_drag(&mut self, pointer: f64) {
        self.scrollbar.begin_drag(pointer);
    }

    pub fn drag_scrollbar(&mut self, pointer: f64) {
        if let Some(target) = self.scrollbar.drag_to(pointer) {
            self.scroll(ScrollInput::To(target));
        }
    }

    pub fn end_scrollbar_drag(&mut self) {
        self.scrollbar.end_drag();
    }

    pub fn is_scrollbar_dragging(&self) -> bool {
        self.scrollbar.is_dragging()
    }

    /// Whether a track position lands on the scrollbar thumb
    pub fn scrollbar_hits_thumb(&self, pointer: f64) -> bool {
        self.scrollbar.hits_thumb(pointer)
    }

    /// The host showed the current offset without a scroll notification of
    /// its own (terminal hosts). Drops any armed echo guard.
    pub fn scroll_presented(&mut self) {
        self.scrollbar.clear_echo();
    }

    pub fn has_pending_scroll_echo(&self) -> bool {
        self.scrollbar.has_pending_echo()
    }

    /// Click on the scrollbar track outside the thumb
    pub fn scrollbar_click(&mut self, pointer: f64) {
        let target = self.scrollbar.track_click(pointer);
        self.scroll(ScrollInput::To(target));
    }

    /// Jump so that row `id` is at the top of the viewport
    ///
    /// Fails without side effects when `id` is outside `[1, N]`.
    pub fn scroll_to_id(&mut self, id: i64) -> Result<(), TableError> {
        let id = NavigationController::validate_target(id, self.window.total_rows())?;
        if self.navigation.supersede() {
            self.events
                .push_back(TableEvent::NavigationSettled { found: false });
        }
        self.jump_to(id);
        Ok(())
    }

    /// Look up the first row where `field == value` and jump to it
    ///
    /// Resolves to whether the row was found. Empty input resolves `false`
    /// immediately without a request.
    pub fn navigate_to_value(&mut self, field: &str, value: &str) -> PendingNavigation {
        let field = field.trim();
        let value = value.trim();
        if field.is_empty() || value.is_empty() {
            return PendingNavigation::ready(false);
        }

        let superseded = matches!(self.navigation.state(), NavState::Requested { .. });
        let (ticket, pending) = self.navigation.begin_lookup(field, value);
        if superseded {
            self.events
                .push_back(TableEvent::NavigationSettled { found: false });
        }
        self.loader.dispatch_lookup(
            ticket,
            LookupRequest {
                field: field.to_string(),
                value: value.to_string(),
                scope: self.scope.clone(),
            },
        );
        pending
    }

    /// New container geometry from the host
    pub fn resize(&mut self, geometry: HostGeometry) {
        self.host_geometry = Some(geometry);
        self.window.set_viewport_height(geometry.viewport_height);
        self.layout
            .set_window_width(geometry.window_width.max(0.0).floor() as u32);
        self.update_scrollbar_size();
        self.update_panel_width();
        self.window.invalidate();
        self.needs_render = true;
    }

    /// Re-render the current range now. With `force`, every slot is repainted.
    pub fn render_visible_rows(&mut self, force: bool) -> RenderStats {
        self.force_render |= force;
        self.needs_render = true;
        self.render_if_needed();
        self.last_render
    }

    pub fn update_table_width(&mut self) -> u32 {
        self.layout.update_table_width(&self.columns)
    }

    pub fn update_panel_width(&mut self) -> Option<u32> {
        self.layout.update_panel_width()
    }

    pub fn set_panel_open(&mut self, open: bool) -> Option<u32> {
        self.layout.set_panel_open(open);
        self.update_panel_width()
    }

    pub fn update_scrollbar_size(&mut self) {
        self.scrollbar
            .update_size(self.window.content_height(), self.window.viewport_height());
        self.scrollbar
            .sync_to(self.window.scroll_top(), ScrollOrigin::User);
    }

    /// Show or hide a column. The choice is saved for this table and session.
    pub fn toggle_column(&mut self, key: &str, visible: bool) -> bool {
        if !self.columns.set_visible(key, visible) {
            return false;
        }
        tracing::debug!("Column '{}' visible={}", key, visible);
        self.columns_changed();
        true
    }

    /// Restore default visibility for every column
    pub fn reset_columns(&mut self) {
        self.columns.reset();
        self.columns_changed();
    }

    /// Switch the session scope; resets the dataset
    pub fn set_session(&mut self, session_id: Option<i64>) {
        if self.scope.session_id == session_id {
            return;
        }
        self.scope.session_id = session_id;
        self.columns.reset();
        self.load_column_settings();
        self.update_table_width();
        self.update_panel_width();
        self.reset_dataset();
    }

    /// Set an equality filter; an empty value removes it. Resets the dataset.
    pub fn set_filter(&mut self, field: &str, value: &str) {
        let value = value.trim();
        let changed = if value.is_empty() {
            self.scope.filters.remove(field).is_some()
        } else {
            self.scope.filters.insert(field.to_string(), value.to_string())
                != Some(value.to_string())
        };
        if changed {
            self.reset_dataset();
        }
    }

    pub fn clear_filters(&mut self) {
        if !self.scope.filters.is_empty() {
            self.scope.filters.clear();
            self.reset_dataset();
        }
    }

    /// Sort by `field`, toggling direction on repeat. Unsortable columns are ignored.
    pub fn sort_by(&mut self, field: &str) -> Option<SortState> {
        if self.columns.get(field).is_some_and(|def| !def.sortable) {
            return None;
        }
        let state = self.scope.sort_by(field).clone();
        tracing::info!("Sorting by {} {}", state.field, state.direction.as_str());
        self.reset_dataset();
        Some(state)
    }

    /// Change the dataset size, re-clamping the scroll position
    pub fn set_total_rows(&mut self, total_rows: u64) {
        if total_rows == self.window.total_rows() {
            return;
        }
        tracing::info!(
            "Total rows {} -> {}",
            self.window.total_rows(),
            total_rows
        );
        self.window.set_total_rows(total_rows);
        self.update_scrollbar_size();
        self.needs_render = true;
    }

    /// Replace cached rows in place (live updates). Rows for pages that are
    /// not cached are dropped. Returns how many rows were applied.
    pub fn upsert_rows(&mut self, values: Vec<Value>) -> usize {
        let mut applied = 0;
        for value in values {
            let Some(row) = Row::from_value(value, 0) else {
                continue;
            };
            if row.id() == 0 {
                continue;
            }
            let id = row.id();
            if self.cache.upsert(row) {
                applied += 1;
                if self.render_range.as_ref().is_some_and(|r| r.contains(&id)) {
                    self.needs_render = true;
                }
            }
        }
        applied
    }

    /// Replace the dataset with local rows
    ///
    /// Rows without an id are positional. The dataset size is `total_rows`
    /// or the row count. Local pages are never evicted; ids past the local
    /// rows are fetched from the source as usual.
    pub fn set_data(&mut self, values: Vec<Value>, total_rows: Option<u64>) {
        let total_rows = total_rows.unwrap_or(values.len() as u64);
        let count = values.len();
        self.loader.reset();
        self.cache.clear();

        let limit = self.geometry.limit() as usize;
        let mut values = values.into_iter().peekable();
        let mut page = 0;
        while values.peek().is_some() {
            let chunk: Vec<Value> = values.by_ref().take(limit).collect();
            let rows = decode_page_rows(chunk, page, &self.geometry);
            self.cache.put_pinned(page, rows);
            page += 1;
        }

        tracing::info!("Loaded {} local rows ({} total)", count, total_rows);
        self.window.set_total_rows(total_rows);
        self.update_scrollbar_size();
        self.reset_dataset_view();
    }

    /// Apply one live record
    ///
    /// A resident row with the same `id_module` and `datetime_unix` is
    /// updated in place. Anything else is new and becomes row 1, growing the
    /// dataset by one.
    pub fn update_or_add_row(&mut self, value: Value) -> RowChange {
        let Value::Object(fields) = value else {
            return RowChange::Ignored;
        };

        let key = (
            fields.get("id_module").filter(|v| !v.is_null()).cloned(),
            fields.get("datetime_unix").filter(|v| !v.is_null()).cloned(),
        );
        if let (Some(module), Some(time)) = key {
            let existing = self
                .cache
                .find(|row| {
                    row.get("id_module") == Some(&module)
                        && row.get("datetime_unix") == Some(&time)
                })
                .map(|row| row.merged(fields.clone()));
            if let Some(row) = existing {
                let id = row.id();
                self.cache.upsert(row);
                if self.render_range.as_ref().is_some_and(|r| r.contains(&id)) {
                    self.needs_render = true;
                }
                return RowChange::Updated(id);
            }
        }

        let total_rows = self.window.total_rows() + 1;
        // Responses in flight were computed against the old positions
        self.loader.bump_generation();
        let dropped = self.cache.insert_head(Row::new(1, fields), total_rows);
        if !dropped.is_empty() {
            tracing::debug!("Refetching pages {:?} after head insert", dropped);
        }
        if let Some(id) = self.navigation.highlighted() {
            self.navigation.set_highlighted(Some(id + 1));
        }
        self.set_total_rows(total_rows);
        self.force_render = true;
        self.needs_render = true;
        RowChange::Inserted
    }

    /// Write the resident rows as CSV, visible columns only, in id order
    pub fn export_csv<W: Write>(&self, out: &mut W) -> std::io::Result<usize> {
        let rows = self.cache.rows_by_id();
        let written = write_csv(out, &self.columns, rows)?;
        tracing::info!("Exported {} rows", written);
        Ok(written)
    }

    /// Aggregates over the resident rows
    pub fn dataset_stats(&self) -> DatasetStats {
        DatasetStats::collect(self.window.total_rows(), self.cache.rows_by_id())
    }

    /// Re-request every page that failed with a retryable error and is
    /// still in range. Rejected pages stay failed until the dataset resets.
    pub fn retry_failed(&mut self) -> usize {
        let total_rows = self.window.total_rows();
        let mut issued = 0;
        for page in self.loader.take_retryable() {
            if self
                .loader
                .ensure(page, total_rows, &self.cache, &self.scope)
                == EnsureOutcome::Issued
            {
                issued += 1;
            }
        }
        if issued > 0 {
            self.needs_render = true;
        }
        issued
    }

    pub fn drain_events(&mut self) -> Vec<TableEvent> {
        self.events.drain(..).collect()
    }

    pub fn stats(&self) -> TableStats {
        TableStats {
            total_rows: self.window.total_rows(),
            cached_rows: self.cache.row_count(),
            cached_pages: self.cache.page_count(),
            pending_pages: self.loader.pending_count(),
            failed_pages: self.loader.failed_count(),
            generation: self.loader.generation(),
            requests_issued: self.loader.requests_issued(),
            render_range: self.render_range.clone(),
            render_passes: self.renderer.passes(),
            coalesced_scrolls: self.frames.coalesced(),
            pool_size: self.renderer.pool_size(),
            last_render: self.last_render,
        }
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn slots(&self) -> &[RowSlot] {
        self.renderer.slots()
    }

    pub fn slot_for(&self, id: RowId) -> Option<&RowSlot> {
        self.renderer.slot_for(id)
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn scope(&self) -> &QueryScope {
        &self.scope
    }

    pub fn scrollbar(&self) -> ScrollbarGeometry {
        self.scrollbar.geometry()
    }

    pub fn scroll_top(&self) -> f64 {
        self.window.scroll_top()
    }

    pub fn window_sample(&self) -> Option<WindowSample> {
        self.window.compute()
    }

    pub fn navigation_state(&self) -> &NavState {
        self.navigation.state()
    }

    pub fn highlighted(&self) -> Option<RowId> {
        self.navigation.highlighted()
    }

    pub fn table_width(&self) -> u32 {
        self.layout.table_width()
    }

    pub fn panel_width(&self) -> Option<u32> {
        self.layout.panel_width()
    }

    pub fn cached_row(&self, id: RowId) -> Option<&Row> {
        self.cache.get(id)
    }

    fn jump_to(&mut self, id: RowId) {
        self.loader.bump_generation();
        self.frames.clear();

        let target = NavigationController::target_scroll_top(id, self.window.row_height());
        let applied = self.window.set_scroll_top(target);
        self.scrollbar.sync_to(applied, ScrollOrigin::Programmatic);
        self.navigation.set_highlighted(Some(id));

        // The target page goes out before the prefetch around it
        let page = self.geometry.page_of(id);
        self.loader
            .ensure(page, self.window.total_rows(), &self.cache, &self.scope);

        self.window.invalidate();
        self.refresh_window();
        self.needs_render = true;
        self.render_if_needed();
        tracing::info!("Jumped to row {}", id);
    }

    fn handle_page_loaded(
        &mut self,
        page: u64,
        generation: Generation,
        result: Result<PageResponse, TableError>,
    ) {
        let in_range = self
            .render_range
            .as_ref()
            .is_some_and(|range| self.geometry.intersects(page, range));
        let wanted = in_range
            || self
                .preload_pages
                .as_ref()
                .is_some_and(|pages| pages.contains(&page));

        match self
            .loader
            .on_page_loaded(page, generation, result, &mut self.cache)
        {
            Ok(applied) => {
                tracing::debug!("Page {} applied ({} rows)", applied.page, applied.rows);
                if let Some(total_rows) = applied.total_rows {
                    self.set_total_rows(total_rows);
                }
                if in_range {
                    self.needs_render = true;
                }
            }
            Err(TableError::StaleResponse { .. }) => {
                if wanted {
                    self.loader
                        .ensure(page, self.window.total_rows(), &self.cache, &self.scope);
                }
            }
            Err(err) => {
                self.events.push_back(TableEvent::PageFailed {
                    page,
                    message: err.to_string(),
                });
                if in_range {
                    self.needs_render = true;
                }
            }
        }
    }

    fn handle_lookup_resolved(&mut self, ticket: u64, result: Result<Option<RowId>, TableError>) {
        let description = match self.navigation.state() {
            NavState::Requested { field, value, .. } => format!("{field}={value}"),
            _ => String::new(),
        };

        match self.navigation.resolve_lookup(ticket, result) {
            LookupOutcome::Superseded => {}
            LookupOutcome::Found(id) => {
                match NavigationController::validate_target(id as i64, self.window.total_rows())
                {
                    Ok(id) => {
                        self.jump_to(id);
                        self.navigation.settle(true);
                        self.events
                            .push_back(TableEvent::NavigationSettled { found: true });
                    }
                    Err(err) => {
                        tracing::warn!("Lookup {} returned unusable target: {}", description, err);
                        self.navigation.settle(false);
                        self.push_status(StatusLevel::Warning, err.to_string());
                        self.events
                            .push_back(TableEvent::NavigationSettled { found: false });
                    }
                }
            }
            LookupOutcome::NotFound => {
                self.push_status(StatusLevel::Info, format!("No row matches {description}"));
                self.events
                    .push_back(TableEvent::NavigationSettled { found: false });
            }
            LookupOutcome::Failed(err) => {
                tracing::warn!("Lookup {} failed: {}", description, err);
                self.push_status(StatusLevel::Error, format!("Search failed: {err}"));
                self.events
                    .push_back(TableEvent::NavigationSettled { found: false });
            }
        }
    }

    /// Sample the window and fetch around it when it moved
    fn refresh_window(&mut self) {
        match self.window.sample() {
            Some(signal) => {
                let moved =
                    signal.moved || self.render_range.as_ref() != Some(&signal.sample.render);
                self.prefetch(&signal, moved);
                if moved {
                    self.render_range = Some(signal.sample.render);
                    self.needs_render = true;
                }
            }
            None => {
                let current = self.window.compute().map(|sample| sample.render);
                if current != self.render_range {
                    self.render_range = current;
                    self.needs_render = true;
                }
            }
        }
    }

    /// Visible pages first, then the render buffer. On a preload signal the
    /// span pages nearest the render range follow, as many as the cleanup
    /// threshold can hold next to the render pages. Failed pages are only
    /// retried when the window actually moved.
    fn prefetch(&mut self, signal: &PrefetchSignal, moved: bool) {
        let total_rows = self.window.total_rows();
        let render = &signal.sample.render;

        let mut order: Vec<PageIndex> = Vec::new();
        let visible = self.geometry.pages_for(&signal.sample.visible());
        for page in visible.chain(self.geometry.pages_for(render)) {
            if !order.contains(&page) {
                order.push(page);
            }
        }

        if signal.preload {
            let pages = self.preload_range(render, &signal.span);
            let mut extra: Vec<PageIndex> = pages
                .clone()
                .filter(|page| !order.contains(page))
                .collect();
            extra.sort_by_key(|page| self.page_distance(*page, render));
            order.extend(extra);

            let span = self.geometry.first_id(*pages.start())
                ..=self.geometry.last_id(*pages.end()).min(total_rows);
            self.window.set_requested_span(span);
            self.preload_pages = Some(pages);
        }

        for page in order {
            if !moved && self.loader.failure(page).is_some() {
                continue;
            }
            self.loader
                .ensure(page, total_rows, &self.cache, &self.scope);
        }
    }

    /// Rows between `page` and the render range, zero when they overlap
    fn page_distance(&self, page: PageIndex, render: &RangeInclusive<RowId>) -> u64 {
        let first = self.geometry.first_id(page);
        let last = self.geometry.last_id(page);
        if last < *render.start() {
            render.start() - last
        } else if first > *render.end() {
            first - render.end()
        } else {
            0
        }
    }

    /// The contiguous pages to hold around `render`: all render pages, then
    /// the nearest span pages while the cleanup threshold has room
    fn preload_range(
        &self,
        render: &RangeInclusive<RowId>,
        span: &RangeInclusive<RowId>,
    ) -> RangeInclusive<PageIndex> {
        let render_pages = self.geometry.pages_for(render);
        let span_pages = self.geometry.pages_for(span);
        let (mut low, mut high) = (*render_pages.start(), *render_pages.end());
        let budget = (self.config.cleanup_threshold as u64 / self.geometry.limit())
            .max(high - low + 1);

        while high - low + 1 < budget {
            let below = (low > *span_pages.start()).then(|| self.page_distance(low - 1, render));
            let above = (high < *span_pages.end()).then(|| self.page_distance(high + 1, render));
            match (below, above) {
                (Some(down), Some(up)) if down <= up => low -= 1,
                (Some(_), None) => low -= 1,
                (_, Some(_)) => high += 1,
                (None, None) => break,
            }
        }
        low..=high
    }

    /// Pages eviction must not touch: the preloaded pages and the render pages
    fn kept_pages(&self, render: &RangeInclusive<RowId>) -> RangeInclusive<PageIndex> {
        let render_pages = self.geometry.pages_for(render);
        match &self.preload_pages {
            Some(pages) => {
                (*pages.start()).min(*render_pages.start())
                    ..=(*pages.end()).max(*render_pages.end())
            }
            None => render_pages,
        }
    }

    fn render_if_needed(&mut self) -> bool {
        if !self.needs_render {
            return false;
        }
        let rows = RowStates {
            cache: &self.cache,
            loader: &self.loader,
            geometry: self.geometry,
        };
        self.last_render = self.renderer.render(
            self.render_range.as_ref(),
            &rows,
            &self.columns,
            self.window.row_height(),
            self.navigation.highlighted(),
            self.force_render,
        );
        self.needs_render = false;
        self.force_render = false;
        true
    }

    fn reset_dataset(&mut self) {
        self.loader.reset();
        self.cache.clear();
        self.reset_dataset_view();
    }

    /// Back to the top with no highlight, pending input or live navigation
    fn reset_dataset_view(&mut self) {
        if self.navigation.supersede() {
            self.events
                .push_back(TableEvent::NavigationSettled { found: false });
        }
        self.navigation.set_highlighted(None);
        self.frames.clear();

        let applied = self.window.set_scroll_top(0.0);
        self.scrollbar.sync_to(applied, ScrollOrigin::Programmatic);
        self.window.invalidate();
        self.render_range = None;
        self.preload_pages = None;
        self.refresh_window();
        self.force_render = true;
        self.needs_render = true;
        self.render_if_needed();
    }

    fn settings_key(&self) -> String {
        self.scope.settings_key(&self.container_id)
    }

    fn load_column_settings(&mut self) {
        let key = self.settings_key();
        match self.settings.load(&key) {
            Ok(Some(saved)) => {
                tracing::debug!("Applying saved column settings for '{}'", key);
                self.columns.apply(&saved);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!("Failed to load column settings for '{}': {}", key, err);
                self.push_status(StatusLevel::Warning, format!("Column settings: {err}"));
            }
        }
    }

    fn columns_changed(&mut self) {
        let key = self.settings_key();
        if let Err(err) = self.settings.save(&key, self.columns.visibility()) {
            tracing::warn!("Failed to save column settings for '{}': {}", key, err);
            self.push_status(StatusLevel::Warning, format!("Column settings: {err}"));
        }
        self.update_table_width();
        self.update_panel_width();
        self.render_visible_rows(true);
    }

    fn push_status(&mut self, level: StatusLevel, text: String) {
        self.events.push_back(TableEvent::StatusMessage { level, text });
    }
}
