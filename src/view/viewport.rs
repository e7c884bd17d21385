//! The viewport window - which rows are visible and which should be rendered
//!
//! Everything is derived from the scroll offset in pixels; the window never
//! tracks row positions itself. Sampling happens once per frame tick from the
//! coalesced scroll position.

use crate::model::row::RowId;
use std::ops::RangeInclusive;

/// Visible and render ranges for one scroll position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSample {
    pub first_visible: RowId,
    pub last_visible: RowId,
    /// Visible range widened by the buffer, clamped to `[1, N]`
    pub render: RangeInclusive<RowId>,
}

impl WindowSample {
    pub fn visible(&self) -> RangeInclusive<RowId> {
        self.first_visible..=self.last_visible
    }
}

/// Emitted when the data around the window should be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchSignal {
    pub sample: WindowSample,
    /// Render range widened by the preload threshold, clamped to `[1, N]`
    pub span: RangeInclusive<RowId>,
    /// The render range differs from the previous sample
    pub moved: bool,
    /// The render range came within the preload threshold of the requested
    /// span's edge, so the span should be fetched again
    pub preload: bool,
}

#[derive(Debug, Clone)]
pub struct ViewportWindow {
    row_height: f64,
    buffer: u64,
    preload_threshold: u64,
    viewport_height: f64,
    total_rows: u64,
    scroll_top: f64,
    last_render: Option<RangeInclusive<RowId>>,
    requested_span: Option<RangeInclusive<RowId>>,
}

impl ViewportWindow {
    pub fn new(row_height: f64, buffer: u64, preload_threshold: u64, total_rows: u64) -> Self {
        Self {
            row_height,
            buffer,
            preload_threshold,
            viewport_height: 0.0,
            total_rows,
            scroll_top: 0.0,
            last_render: None,
            requested_span: None,
        }
    }

    pub fn row_height(&self) -> f64 {
        self.row_height
    }

    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    pub fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    pub fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    /// Virtual content height: `N * row_height`
    pub fn content_height(&self) -> f64 {
        self.total_rows as f64 * self.row_height
    }

    pub fn max_scroll_top(&self) -> f64 {
        (self.content_height() - self.viewport_height).max(0.0)
    }

    /// Rows that fit in the viewport (partially visible rows count)
    pub fn visible_row_count(&self) -> u64 {
        if self.viewport_height <= 0.0 {
            return 0;
        }
        (self.viewport_height / self.row_height).ceil() as u64
    }

    /// Set the scroll offset, clamped to `[0, max_scroll_top]`. Returns the applied value.
    pub fn set_scroll_top(&mut self, scroll_top: f64) -> f64 {
        let clamped = if scroll_top.is_finite() {
            scroll_top.clamp(0.0, self.max_scroll_top())
        } else {
            0.0
        };
        self.scroll_top = clamped;
        clamped
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        self.viewport_height = height.max(0.0);
        self.set_scroll_top(self.scroll_top);
    }

    pub fn set_total_rows(&mut self, total_rows: u64) {
        self.total_rows = total_rows;
        self.set_scroll_top(self.scroll_top);
        self.invalidate();
    }

    /// Forget the last render range and requested span so the next sample signals
    pub fn invalidate(&mut self) {
        self.last_render = None;
        self.requested_span = None;
    }

    /// Pure window computation for the current scroll position
    ///
    /// `None` when the dataset is empty or the host has not reported a height.
    pub fn compute(&self) -> Option<WindowSample> {
        if self.total_rows == 0 || self.viewport_height <= 0.0 {
            return None;
        }
        let n = self.total_rows;
        let first_visible = ((self.scroll_top / self.row_height).floor() as u64 + 1).min(n);
        let last_visible = (first_visible + self.visible_row_count() - 1).clamp(first_visible, n);
        let render_start = first_visible.saturating_sub(self.buffer).max(1);
        let render_end = last_visible.saturating_add(self.buffer).min(n);
        Some(WindowSample {
            first_visible,
            last_visible,
            render: render_start..=render_end,
        })
    }

    /// The span the last preload actually covered
    pub fn requested_span(&self) -> Option<&RangeInclusive<RowId>> {
        self.requested_span.as_ref()
    }

    /// Record the span the owner fetched for the last preload signal.
    /// Owners that fetch whole pages pass the page-aligned span here.
    pub fn set_requested_span(&mut self, span: RangeInclusive<RowId>) {
        self.requested_span = Some(span);
    }

    fn near_edge(&self, render: &RangeInclusive<RowId>) -> bool {
        let Some(span) = &self.requested_span else {
            return true;
        };
        if render.start() < span.start() || render.end() > span.end() {
            return true;
        }
        // An edge already at the dataset boundary cannot grow
        let near_top =
            *span.start() > 1 && render.start() - span.start() < self.preload_threshold;
        let near_bottom =
            *span.end() < self.total_rows && span.end() - render.end() < self.preload_threshold;
        near_top || near_bottom
    }

    /// Sample the window for this frame
    ///
    /// Signals when the render range changed or came within the preload
    /// threshold of the previously requested span. Identical repeated input
    /// does not re-signal.
    pub fn sample(&mut self) -> Option<PrefetchSignal> {
        let Some(sample) = self.compute() else {
            self.last_render = None;
            return None;
        };

        let moved = self.last_render.as_ref() != Some(&sample.render);
        let preload = self.near_edge(&sample.render);
        if !moved && !preload {
            return None;
        }

        let span_start = sample
            .render
            .start()
            .saturating_sub(self.preload_threshold)
            .max(1);
        let span_end = sample
            .render
            .end()
            .saturating_add(self.preload_threshold)
            .min(self.total_rows);
        let span = span_start..=span_end;

        tracing::trace!(
            "Window {}..={} visible {}..={}, prefetch span {:?} (preload {})",
            sample.render.start(),
            sample.render.end(),
            sample.first_visible,
            sample.last_visible,
            span,
            preload
        );

        self.last_render = Some(sample.render.clone());
        if preload {
            self.requested_span = Some(span.clone());
        }
        Some(PrefetchSignal {
            sample,
            span,
            moved,
            preload,
        })
    }
}
