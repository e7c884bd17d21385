//! Synthetic scrollbar bound to the virtual content height.
//!
//! The thumb is derived from `content = N * row_height`, never from the
//! rendered slots. Programmatic position changes arm an echo guard: the host's
//! own scroll notification for that change is swallowed once instead of being
//! fed back as user input.

/// Minimum thumb length in host units for pixel hosts
pub const MIN_THUMB_PX: f64 = 20.0;

/// Who moved the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOrigin {
    User,
    Programmatic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollbarGeometry {
    pub visible: bool,
    pub track_len: f64,
    pub thumb_top: f64,
    pub thumb_len: f64,
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    pointer_start: f64,
    scroll_start: f64,
}

#[derive(Debug, Clone)]
pub struct ScrollbarSync {
    min_thumb: f64,
    content_len: f64,
    track_len: f64,
    thumb_len: f64,
    thumb_top: f64,
    scroll_top: f64,
    pending_echo: Option<f64>,
    drag: Option<DragState>,
}

impl Default for ScrollbarSync {
    fn default() -> Self {
        Self::new(MIN_THUMB_PX)
    }
}

impl ScrollbarSync {
    pub fn new(min_thumb: f64) -> Self {
        Self {
            min_thumb,
            content_len: 0.0,
            track_len: 0.0,
            thumb_len: 0.0,
            thumb_top: 0.0,
            scroll_top: 0.0,
            pending_echo: None,
            drag: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.content_len > self.track_len && self.track_len > 0.0
    }

    fn max_scroll(&self) -> f64 {
        (self.content_len - self.track_len).max(0.0)
    }

    fn travel(&self) -> f64 {
        (self.track_len - self.thumb_len).max(0.0)
    }

    /// Recompute thumb size from content and viewport lengths
    pub fn update_size(&mut self, content_len: f64, viewport_len: f64) {
        self.content_len = content_len.max(0.0);
        self.track_len = viewport_len.max(0.0);
        self.thumb_len = if self.is_visible() {
            (self.track_len * self.track_len / self.content_len)
                .max(self.min_thumb)
                .min(self.track_len)
        } else {
            0.0
        };
        self.place_thumb();
    }

    fn place_thumb(&mut self) {
        let max_scroll = self.max_scroll();
        self.thumb_top = if max_scroll > 0.0 {
            (self.scroll_top / max_scroll).clamp(0.0, 1.0) * self.travel()
        } else {
            0.0
        };
    }

    /// Move the thumb to reflect `scroll_top`
    pub fn sync_to(&mut self, scroll_top: f64, origin: ScrollOrigin) {
        self.scroll_top = scroll_top;
        self.place_thumb();
        if origin == ScrollOrigin::Programmatic {
            self.pending_echo = Some(scroll_top);
        }
    }

    /// Feed a native scroll notification.
    ///
    /// Returns `None` when it is the echo of our own programmatic set,
    /// otherwise the offset to apply as user input.
    pub fn on_scroll_event(&mut self, offset: f64) -> Option<f64> {
        if let Some(expected) = self.pending_echo.take() {
            if (expected - offset).abs() < 0.5 {
                tracing::trace!("Swallowed scroll echo at {}", offset);
                return None;
            }
        }
        Some(offset)
    }

    pub fn has_pending_echo(&self) -> bool {
        self.pending_echo.is_some()
    }

    /// Forget the armed echo; the host will not send one
    pub fn clear_echo(&mut self) {
        self.pending_echo = None;
    }

    pub fn begin_drag(&mut self, pointer: f64) {
        self.drag = Some(DragState {
            pointer_start: pointer,
            scroll_start: self.scroll_top,
        });
    }

    /// Scroll offset for the current pointer position during a drag
    pub fn drag_to(&mut self, pointer: f64) -> Option<f64> {
        let drag = self.drag?;
        let ratio = (pointer - drag.pointer_start) / self.travel().max(1.0);
        Some((drag.scroll_start + ratio * self.max_scroll()).clamp(0.0, self.max_scroll()))
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Scroll offset that centers the thumb on a track click
    pub fn track_click(&self, pointer: f64) -> f64 {
        let ratio = (pointer - self.thumb_len / 2.0) / self.travel().max(1.0);
        (ratio * self.max_scroll()).clamp(0.0, self.max_scroll())
    }

    /// Whether a track position lands on the thumb
    pub fn hits_thumb(&self, pointer: f64) -> bool {
        self.is_visible() && pointer >= self.thumb_top && pointer < self.thumb_top + self.thumb_len
    }

    pub fn geometry(&self) -> ScrollbarGeometry {
        ScrollbarGeometry {
            visible: self.is_visible(),
            track_len: self.track_len,
            thumb_top: self.thumb_top,
            thumb_len: self.thumb_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar() -> ScrollbarSync {
        let mut bar = ScrollbarSync::default();
        bar.update_size(10_000.0 * 45.0, 450.0);
        bar
    }

    #[test]
    fn test_min_thumb() {
        let geometry = bar().geometry();
        assert!(geometry.visible);
        assert_eq!(geometry.thumb_len, MIN_THUMB_PX);
        assert_eq!(geometry.thumb_top, 0.0);
    }

    #[test]
    fn test_proportional_thumb() {
        let mut bar = ScrollbarSync::default();
        bar.update_size(900.0, 450.0);
        assert_eq!(bar.geometry().thumb_len, 225.0);
    }

    #[test]
    fn test_hidden_when_content_fits() {
        let mut bar = ScrollbarSync::default();
        bar.update_size(300.0, 450.0);
        let geometry = bar.geometry();
        assert!(!geometry.visible);
        assert_eq!(geometry.thumb_len, 0.0);
    }

    #[test]
    fn test_thumb_tracks_scroll() {
        let mut bar = bar();
        let max_scroll = 10_000.0 * 45.0 - 450.0;
        bar.sync_to(max_scroll, ScrollOrigin::User);
        assert_eq!(bar.geometry().thumb_top, 450.0 - MIN_THUMB_PX);
        bar.sync_to(max_scroll / 2.0, ScrollOrigin::User);
        assert_eq!(bar.geometry().thumb_top, (450.0 - MIN_THUMB_PX) / 2.0);
    }

    #[test]
    fn test_echo_guard_swallows_once() {
        let mut bar = bar();
        bar.sync_to(2000.0, ScrollOrigin::Programmatic);
        assert!(bar.has_pending_echo());
        assert_eq!(bar.on_scroll_event(2000.0), None);
        assert_eq!(bar.on_scroll_event(2000.0), Some(2000.0));
    }

    #[test]
    fn test_echo_guard_passes_other_offsets() {
        let mut bar = bar();
        bar.sync_to(2000.0, ScrollOrigin::Programmatic);
        assert_eq!(bar.on_scroll_event(2100.0), Some(2100.0));
        assert!(!bar.has_pending_echo());
    }

    #[test]
    fn test_cleared_echo_lets_same_offset_through() {
        let mut bar = bar();
        bar.sync_to(2000.0, ScrollOrigin::Programmatic);
        bar.clear_echo();
        assert!(!bar.has_pending_echo());
        assert_eq!(bar.on_scroll_event(2000.0), Some(2000.0));
    }

    #[test]
    fn test_user_sync_does_not_arm_guard() {
        let mut bar = bar();
        bar.sync_to(100.0, ScrollOrigin::User);
        assert_eq!(bar.on_scroll_event(100.0), Some(100.0));
    }

    #[test]
    fn test_drag() {
        let mut bar = bar();
        assert_eq!(bar.drag_to(50.0), None);
        bar.begin_drag(10.0);
        assert!(bar.is_dragging());
        let travel = 450.0 - MIN_THUMB_PX;
        let max_scroll = 10_000.0 * 45.0 - 450.0;
        let target = bar.drag_to(10.0 + travel / 2.0).unwrap();
        assert!((target - max_scroll / 2.0).abs() < 1e-6);
        assert_eq!(bar.drag_to(-1000.0), Some(0.0));
        assert_eq!(bar.drag_to(10_000.0), Some(max_scroll));
        bar.end_drag();
        assert!(!bar.is_dragging());
    }

    #[test]
    fn test_track_click_and_hit() {
        let bar = bar();
        assert!(bar.hits_thumb(5.0));
        assert!(!bar.hits_thumb(200.0));
        assert_eq!(bar.track_click(0.0), 0.0);
        assert_eq!(bar.track_click(450.0), 10_000.0 * 45.0 - 450.0);
    }
}
