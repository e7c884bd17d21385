//! Table and side panel widths.
//!
//! The table is as wide as its visible columns. When hosted in a side panel,
//! the panel follows the table width within `[min_panel, window * max_ratio]`.

use crate::model::columns::ColumnSet;

pub const DEFAULT_MIN_PANEL: u32 = 100;
pub const DEFAULT_MAX_PANEL_RATIO: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct TableLayout {
    column_gap: u32,
    min_panel: u32,
    max_panel_ratio: f64,
    window_width: u32,
    panel_open: bool,
    table_width: u32,
    panel_width: Option<u32>,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self::new(0, DEFAULT_MIN_PANEL, DEFAULT_MAX_PANEL_RATIO)
    }
}

impl TableLayout {
    pub fn new(column_gap: u32, min_panel: u32, max_panel_ratio: f64) -> Self {
        Self {
            column_gap,
            min_panel,
            max_panel_ratio,
            window_width: 0,
            panel_open: false,
            table_width: 0,
            panel_width: None,
        }
    }

    pub fn set_window_width(&mut self, width: u32) {
        self.window_width = width;
    }

    pub fn set_panel_open(&mut self, open: bool) {
        self.panel_open = open;
        if !open {
            self.panel_width = None;
        }
    }

    pub fn is_panel_open(&self) -> bool {
        self.panel_open
    }

    /// Width of the visible columns plus the gaps between them
    pub fn update_table_width(&mut self, columns: &ColumnSet) -> u32 {
        let visible = columns.visible().count() as u32;
        self.table_width = columns.visible_width() + self.column_gap * visible.saturating_sub(1);
        self.table_width
    }

    /// Fit the panel to the table. `None` while the panel is closed.
    pub fn update_panel_width(&mut self) -> Option<u32> {
        if !self.panel_open {
            return None;
        }
        let max = (self.window_width as f64 * self.max_panel_ratio).floor() as u32;
        let width = self.table_width.min(max).max(self.min_panel);
        tracing::debug!(
            "Panel width {} (table {}, bounds {}..={})",
            width,
            self.table_width,
            self.min_panel,
            max
        );
        self.panel_width = Some(width);
        self.panel_width
    }

    pub fn table_width(&self) -> u32 {
        self.table_width
    }

    pub fn panel_width(&self) -> Option<u32> {
        self.panel_width
    }
}
