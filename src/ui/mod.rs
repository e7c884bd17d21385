//! Terminal host for the table engine
//!
//! One terminal row is one row unit. The body area is the table viewport; the
//! rightmost body column is the synthetic scrollbar track.

use crate::app::{HostGeometry, PendingNavigation, StatusLevel, TableEvent, VirtualTable};
use crate::model::query::SortDirection;
use crate::view::frame_queue::ScrollInput;
use crate::view::row_renderer::SlotContent;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::Frame;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// What the bottom-line prompt is collecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Row id to jump to
    JumpToId,
    /// `field=value` to search for
    Search,
    /// `field=value` equality filter; `field=` clears it
    Filter,
    /// Field to sort by
    Sort,
}

impl PromptKind {
    fn label(&self) -> &'static str {
        match self {
            PromptKind::JumpToId => "Go to id: ",
            PromptKind::Search => "Find (field=value): ",
            PromptKind::Filter => "Filter (field=value): ",
            PromptKind::Sort => "Sort by: ",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Prompt {
    pub kind: PromptKind,
    pub input: String,
}

/// Regions of the screen, recomputed every draw
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreenLayout {
    pub header: Rect,
    pub body: Rect,
    pub scrollbar: Rect,
    pub status: Rect,
}

impl ScreenLayout {
    pub fn new(area: Rect) -> Self {
        let [header, main, status] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .areas(area);
        let [body, scrollbar] =
            Layout::horizontal([Constraint::Min(0), Constraint::Length(1)]).areas(main);
        Self {
            header,
            body,
            scrollbar,
            status,
        }
    }

    /// Table viewport geometry for the engine
    pub fn host_geometry(&self, window: Rect) -> HostGeometry {
        HostGeometry {
            viewport_height: self.body.height as f64,
            viewport_width: self.body.width as f64,
            window_width: window.width as f64,
        }
    }
}

/// Interactive state around one mounted table
#[derive(Debug, Default)]
pub struct TableScreen {
    layout: ScreenLayout,
    status: Option<(StatusLevel, String)>,
    prompt: Option<Prompt>,
    /// Cursor in the column picker, when open
    column_picker: Option<usize>,
    navigation: Option<PendingNavigation>,
    /// Where `e` writes CSV exports; empty means the working directory
    export_dir: PathBuf,
    quit: bool,
}

impl TableScreen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn set_layout(&mut self, layout: ScreenLayout) {
        self.layout = layout;
    }

    pub fn set_export_dir(&mut self, dir: impl Into<PathBuf>) {
        self.export_dir = dir.into();
    }

    pub fn set_status(&mut self, level: StatusLevel, text: impl Into<String>) {
        self.status = Some((level, text.into()));
    }

    /// Pull engine events and pending navigation results into the status line.
    /// Returns true if anything changed.
    pub fn poll(&mut self, table: &mut VirtualTable) -> bool {
        let mut changed = false;
        for event in table.drain_events() {
            changed = true;
            match event {
                TableEvent::StatusMessage { level, text } => self.set_status(level, text),
                TableEvent::PageFailed { page, message } => self.set_status(
                    StatusLevel::Error,
                    format!("Page {page} failed: {message} (R to retry)"),
                ),
                TableEvent::NavigationSettled { .. } => {}
            }
        }

        if let Some(pending) = &mut self.navigation {
            if let Some(found) = pending.try_result() {
                self.navigation = None;
                if found {
                    self.set_status(StatusLevel::Info, "Found");
                }
                changed = true;
            }
        }
        changed
    }

    pub fn handle_key(&mut self, table: &mut VirtualTable, key: KeyEvent) {
        if self.prompt.is_some() {
            self.handle_prompt_key(table, key);
            return;
        }
        if self.column_picker.is_some() {
            self.handle_picker_key(table, key);
            return;
        }

        match (key.code, key.modifiers) {
            (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                self.quit = true
            }
            (KeyCode::Up, _) | (KeyCode::Char('k'), _) => table.scroll(ScrollInput::LineUp),
            (KeyCode::Down, _) | (KeyCode::Char('j'), _) => table.scroll(ScrollInput::LineDown),
            (KeyCode::PageUp, _) => table.scroll(ScrollInput::PageUp),
            (KeyCode::PageDown, _) | (KeyCode::Char(' '), _) => {
                table.scroll(ScrollInput::PageDown)
            }
            (KeyCode::Home, _) => table.scroll(ScrollInput::Home),
            (KeyCode::End, _) | (KeyCode::Char('G'), _) => table.scroll(ScrollInput::End),
            (KeyCode::Char('g'), _) => self.open_prompt(PromptKind::JumpToId),
            (KeyCode::Char('/'), _) => self.open_prompt(PromptKind::Search),
            (KeyCode::Char('f'), _) => self.open_prompt(PromptKind::Filter),
            (KeyCode::Char('s'), _) => self.open_prompt(PromptKind::Sort),
            (KeyCode::Char('x'), _) => {
                table.clear_filters();
                self.set_status(StatusLevel::Info, "Filters cleared");
            }
            (KeyCode::Char('c'), _) => self.column_picker = Some(0),
            (KeyCode::Char('R'), _) => {
                let issued = table.retry_failed();
                self.set_status(StatusLevel::Info, format!("Retrying {issued} page(s)"));
            }
            (KeyCode::Char('e'), _) => self.export(table),
            (KeyCode::Char('i'), _) => {
                let stats = table.dataset_stats();
                let mut text = format!(
                    "{} of {} rows loaded | {} modules | {} sessions | GPS {}%",
                    stats.sampled_rows,
                    stats.total_rows,
                    stats.unique_modules,
                    stats.unique_sessions,
                    stats.gps_accuracy
                );
                if let Some((first, last)) = stats.time_range {
                    text.push_str(&format!(" | time {first}..{last}"));
                }
                self.set_status(StatusLevel::Info, text);
            }
            (KeyCode::Esc, _) => self.status = None,
            _ => {}
        }
    }

    pub fn handle_mouse(&mut self, table: &mut VirtualTable, mouse: MouseEvent) {
        let track = self.layout.scrollbar;
        let on_track = mouse.column >= track.x
            && mouse.column < track.x + track.width
            && mouse.row >= track.y
            && mouse.row < track.y + track.height;
        let pointer = mouse.row.saturating_sub(track.y) as f64;

        match mouse.kind {
            MouseEventKind::ScrollUp => table.scroll(ScrollInput::Wheel(-3.0)),
            MouseEventKind::ScrollDown => table.scroll(ScrollInput::Wheel(3.0)),
            MouseEventKind::Down(MouseButton::Left) if on_track => {
                if table.scrollbar_hits_thumb(pointer) {
                    table.begin_scrollbar_drag(pointer);
                } else {
                    table.scrollbar_click(pointer);
                }
            }
            MouseEventKind::Drag(MouseButton::Left) if table.is_scrollbar_dragging() => {
                table.drag_scrollbar(pointer)
            }
            MouseEventKind::Up(MouseButton::Left) if table.is_scrollbar_dragging() => {
                table.end_scrollbar_drag()
            }
            _ => {}
        }
    }

    /// Jump to a row id; a rejected id becomes a status warning
    pub fn jump_to(&mut self, table: &mut VirtualTable, id: i64) {
        if let Err(err) = table.scroll_to_id(id) {
            tracing::warn!("Jump to {} rejected: {}", id, err);
            self.set_status(StatusLevel::Warning, err.to_string());
        }
    }

    /// Write the loaded rows to `telemetry_data_<session|all>.csv`
    fn export(&mut self, table: &VirtualTable) {
        let session = table
            .scope()
            .session_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "all".to_string());
        let path = self.export_dir.join(format!("telemetry_data_{session}.csv"));
        match write_export(&path, table) {
            Ok(rows) => self.set_status(
                StatusLevel::Info,
                format!("Exported {rows} rows to {}", path.display()),
            ),
            Err(err) => {
                tracing::warn!("CSV export to {} failed: {}", path.display(), err);
                self.set_status(StatusLevel::Error, format!("Export failed: {err}"));
            }
        }
    }

    fn open_prompt(&mut self, kind: PromptKind) {
        self.prompt = Some(Prompt {
            kind,
            input: String::new(),
        });
    }

    fn handle_prompt_key(&mut self, table: &mut VirtualTable, key: KeyEvent) {
        let Some(prompt) = &mut self.prompt else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.prompt = None,
            KeyCode::Backspace => {
                prompt.input.pop();
            }
            KeyCode::Char(c) => prompt.input.push(c),
            KeyCode::Enter => {
                if let Some(prompt) = self.prompt.take() {
                    self.submit_prompt(table, prompt);
                }
            }
            _ => {}
        }
    }

    fn submit_prompt(&mut self, table: &mut VirtualTable, prompt: Prompt) {
        let input = prompt.input.trim();
        match prompt.kind {
            PromptKind::JumpToId => match input.parse::<i64>() {
                Ok(id) => self.jump_to(table, id),
                Err(_) => self.set_status(StatusLevel::Warning, format!("Not a row id: {input}")),
            },
            PromptKind::Search => match split_assignment(input) {
                Some((field, value)) => {
                    self.set_status(StatusLevel::Info, format!("Searching {field}={value}..."));
                    self.navigation = Some(table.navigate_to_value(field, value));
                }
                None => self.set_status(StatusLevel::Warning, "Expected field=value"),
            },
            PromptKind::Filter => match split_assignment(input) {
                Some((field, value)) => table.set_filter(field, value),
                None => self.set_status(StatusLevel::Warning, "Expected field=value"),
            },
            PromptKind::Sort => {
                if input.is_empty() {
                    return;
                }
                match table.sort_by(input) {
                    Some(state) => self.set_status(
                        StatusLevel::Info,
                        format!("Sorted by {} {}", state.field, state.direction.as_str()),
                    ),
                    None => {
                        self.set_status(StatusLevel::Warning, format!("'{input}' is not sortable"))
                    }
                }
            }
        }
    }

    fn handle_picker_key(&mut self, table: &mut VirtualTable, key: KeyEvent) {
        let Some(cursor) = self.column_picker else {
            return;
        };
        let count = table.columns().defs().len();
        match key.code {
            KeyCode::Esc | KeyCode::Char('c') | KeyCode::Char('q') => self.column_picker = None,
            KeyCode::Up | KeyCode::Char('k') => {
                self.column_picker = Some(cursor.saturating_sub(1));
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.column_picker = Some((cursor + 1).min(count.saturating_sub(1)));
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                if let Some(def) = table.columns().defs().get(cursor) {
                    let key = def.key.clone();
                    let visible = table.columns().is_visible(&key);
                    table.toggle_column(&key, !visible);
                }
            }
            KeyCode::Char('r') => table.reset_columns(),
            _ => {}
        }
    }

    pub fn draw(&self, frame: &mut Frame, table: &VirtualTable) {
        draw_header(frame, self.layout.header, table);
        draw_body(frame, self.layout.body, table);
        draw_scrollbar(frame, self.layout.scrollbar, table);
        self.draw_status(frame, self.layout.status, table);
        if let Some(cursor) = self.column_picker {
            draw_column_picker(frame, self.layout.body, table, cursor);
        }
    }

    fn draw_status(&self, frame: &mut Frame, area: Rect, table: &VirtualTable) {
        let line = if let Some(prompt) = &self.prompt {
            Line::from(vec![
                Span::styled(prompt.kind.label(), Style::default().fg(Color::Cyan)),
                Span::raw(prompt.input.clone()),
                Span::styled(" ", Style::default().add_modifier(Modifier::REVERSED)),
            ])
        } else {
            let stats = table.stats();
            let position = table
                .window_sample()
                .map(|s| format!("{}-{}", s.first_visible, s.last_visible))
                .unwrap_or_else(|| "-".to_string());
            let mut spans = vec![Span::styled(
                format!(
                    " {position} of {} | cached {} rows / {} pages | pending {} ",
                    stats.total_rows, stats.cached_rows, stats.cached_pages, stats.pending_pages
                ),
                Style::default().fg(Color::Black).bg(Color::Gray),
            )];
            if let Some((level, text)) = &self.status {
                let color = match level {
                    StatusLevel::Info => Color::Green,
                    StatusLevel::Warning => Color::Yellow,
                    StatusLevel::Error => Color::Red,
                };
                spans.push(Span::styled(format!(" {text}"), Style::default().fg(color)));
            }
            Line::from(spans)
        };
        frame.render_widget(Paragraph::new(line), area);
    }
}

fn write_export(path: &Path, table: &VirtualTable) -> std::io::Result<usize> {
    let mut out = BufWriter::new(File::create(path)?);
    let rows = table.export_csv(&mut out)?;
    out.flush()?;
    Ok(rows)
}

fn split_assignment(input: &str) -> Option<(&str, &str)> {
    let (field, value) = input.split_once('=')?;
    let field = field.trim();
    if field.is_empty() {
        return None;
    }
    Some((field, value.trim()))
}

/// Pad or cut `text` to `width` cells plus one separating space
fn fit(text: &str, width: usize) -> String {
    let mut out: String = text.chars().take(width).collect();
    let len = out.chars().count();
    out.push_str(&" ".repeat(width - len + 1));
    out
}

fn draw_header(frame: &mut Frame, area: Rect, table: &VirtualTable) {
    let sort = table.scope().sort.as_ref();
    let mut text = String::new();
    for def in table.columns().visible() {
        let marker = match sort {
            Some(state) if state.field == def.key => match state.direction {
                SortDirection::Asc => " ^",
                SortDirection::Desc => " v",
            },
            _ => "",
        };
        text.push_str(&fit(&format!("{}{}", def.title, marker), def.width as usize));
    }
    let style = Style::default()
        .fg(Color::White)
        .bg(Color::Blue)
        .add_modifier(Modifier::BOLD);
    frame.render_widget(Paragraph::new(text).style(style), area);
}

fn draw_body(frame: &mut Frame, area: Rect, table: &VirtualTable) {
    let row_height = table.config().row_height;
    // A cell row cannot be drawn half-scrolled; snap to the partially
    // visible first row
    let scroll_top = (table.scroll_top() / row_height).floor() * row_height;
    let bottom = scroll_top + area.height as f64 * row_height;
    let widths: Vec<usize> = table
        .columns()
        .visible()
        .map(|def| def.width as usize)
        .collect();

    for slot in table.slots() {
        if slot.top < scroll_top || slot.top >= bottom {
            continue;
        }
        let y = area.y + ((slot.top - scroll_top) / row_height) as u16;
        let line = match &slot.content {
            SlotContent::Cells(cells) => cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| fit(cell, *width))
                .collect::<String>(),
            SlotContent::Loading => format!("{:>8} loading...", slot.id),
            SlotContent::Failed(message) => format!("{:>8} error: {}", slot.id, message),
            SlotContent::Empty => String::new(),
        };
        let mut style = match &slot.content {
            SlotContent::Loading => Style::default().fg(Color::DarkGray),
            SlotContent::Failed(_) => Style::default().fg(Color::Red),
            _ => Style::default(),
        };
        if slot.highlighted {
            style = style.bg(Color::Yellow).fg(Color::Black);
        }
        let row_area = Rect::new(area.x, y, area.width, 1);
        frame.render_widget(Paragraph::new(line).style(style), row_area);
    }
}

fn draw_scrollbar(frame: &mut Frame, area: Rect, table: &VirtualTable) {
    let geometry = table.scrollbar();
    if !geometry.visible || area.height == 0 {
        return;
    }
    let thumb_start = geometry.thumb_top.round() as u16;
    let thumb_end = (geometry.thumb_top + geometry.thumb_len).round().max(1.0) as u16;
    let lines: Vec<Line> = (0..area.height)
        .map(|row| {
            if row >= thumb_start && row < thumb_end.max(thumb_start + 1) {
                Line::styled("█", Style::default().fg(Color::Gray))
            } else {
                Line::styled("│", Style::default().fg(Color::DarkGray))
            }
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}

fn draw_column_picker(frame: &mut Frame, body: Rect, table: &VirtualTable, cursor: usize) {
    let defs = table.columns().defs();
    let width = 32.min(body.width);
    let height = (defs.len() as u16 + 2).min(body.height);
    let area = Rect::new(
        body.x + body.width.saturating_sub(width) / 2,
        body.y + body.height.saturating_sub(height) / 2,
        width,
        height,
    );

    let items: Vec<ListItem> = defs
        .iter()
        .map(|def| {
            let mark = if table.columns().is_visible(&def.key) {
                "[x]"
            } else {
                "[ ]"
            };
            ListItem::new(format!("{mark} {}", def.title))
        })
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Columns (space toggles, r resets) "),
        )
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default().with_selected(Some(cursor));

    frame.render_widget(Clear, area);
    frame.render_stateful_widget(list, area, &mut state);
}
