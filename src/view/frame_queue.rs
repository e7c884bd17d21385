//! Per-frame coalescing of scroll input.
//!
//! Raw input events only record intent. The frame loop takes at most one
//! resolved step per tick, so a burst of wheel events costs one window
//! recompute.

/// Scroll commands a host can issue
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollInput {
    /// Relative pixel offset
    By(f64),
    /// Absolute pixel offset
    To(f64),
    LineUp,
    LineDown,
    PageUp,
    PageDown,
    Home,
    End,
    /// Wheel delta in host units; scaled by `WHEEL_FACTOR`
    Wheel(f64),
}

/// Fraction of the viewport moved by page up/down
pub const PAGE_FACTOR: f64 = 0.8;

/// Pixels per wheel delta unit
pub const WHEEL_FACTOR: f64 = 0.5;

/// A scroll input reduced to "absolute target, then relative delta"
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollStep {
    pub absolute: Option<f64>,
    pub delta: f64,
}

impl ScrollStep {
    /// Resolve against the current offset; the caller clamps
    pub fn apply(&self, scroll_top: f64) -> f64 {
        self.absolute.unwrap_or(scroll_top) + self.delta
    }
}

impl ScrollInput {
    pub fn resolve(&self, row_height: f64, viewport_height: f64, max_scroll_top: f64) -> ScrollStep {
        let relative = |delta: f64| ScrollStep {
            absolute: None,
            delta,
        };
        match *self {
            ScrollInput::By(delta) => relative(delta),
            ScrollInput::To(offset) => ScrollStep {
                absolute: Some(offset),
                delta: 0.0,
            },
            ScrollInput::LineUp => relative(-row_height),
            ScrollInput::LineDown => relative(row_height),
            ScrollInput::PageUp => relative(-viewport_height * PAGE_FACTOR),
            ScrollInput::PageDown => relative(viewport_height * PAGE_FACTOR),
            ScrollInput::Home => ScrollStep {
                absolute: Some(0.0),
                delta: 0.0,
            },
            ScrollInput::End => ScrollStep {
                absolute: Some(max_scroll_top),
                delta: 0.0,
            },
            ScrollInput::Wheel(delta) => relative(delta * WHEEL_FACTOR),
        }
    }
}

/// Single-consumer queue holding at most one pending step
#[derive(Debug, Default)]
pub struct FrameQueue {
    pending: Option<ScrollStep>,
    coalesced: u64,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a step into the pending one. An absolute step discards earlier
    /// relative movement; relative steps accumulate.
    pub fn push(&mut self, step: ScrollStep) {
        let merged = match (self.pending, step.absolute) {
            (_, Some(_)) | (None, None) => step,
            (Some(pending), None) => ScrollStep {
                absolute: pending.absolute,
                delta: pending.delta + step.delta,
            },
        };
        if self.pending.is_some() {
            self.coalesced += 1;
        }
        self.pending = Some(merged);
    }

    /// Take the pending step for this frame
    pub fn take(&mut self) -> Option<ScrollStep> {
        self.pending.take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop pending input (used when a navigation jump overrides it)
    pub fn clear(&mut self) {
        self.pending = None;
    }

    /// How many pushes were folded into an already pending step
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_commands() {
        let rh = 45.0;
        let vh = 450.0;
        assert_eq!(ScrollInput::LineDown.resolve(rh, vh, 9000.0).apply(100.0), 145.0);
        assert_eq!(ScrollInput::LineUp.resolve(rh, vh, 9000.0).apply(100.0), 55.0);
        assert_eq!(ScrollInput::PageDown.resolve(rh, vh, 9000.0).apply(0.0), 360.0);
        assert_eq!(ScrollInput::PageUp.resolve(rh, vh, 9000.0).apply(1000.0), 640.0);
        assert_eq!(ScrollInput::Home.resolve(rh, vh, 9000.0).apply(1000.0), 0.0);
        assert_eq!(ScrollInput::Wheel(100.0).resolve(rh, vh, 9000.0).apply(0.0), 50.0);
        assert_eq!(ScrollInput::To(900.0).resolve(rh, vh, 9000.0).apply(5.0), 900.0);
        assert_eq!(ScrollInput::By(-5.0).resolve(rh, vh, 9000.0).apply(5.0), 0.0);
        assert_eq!(ScrollInput::End.resolve(rh, vh, 9000.0).apply(0.0), 9000.0);
    }

    #[test]
    fn test_relative_steps_accumulate() {
        let mut queue = FrameQueue::new();
        for _ in 0..10 {
            queue.push(ScrollInput::Wheel(100.0).resolve(45.0, 450.0, 9000.0));
        }
        let step = queue.take().unwrap();
        assert_eq!(step.apply(0.0), 500.0);
        assert_eq!(queue.coalesced(), 9);
        assert!(queue.take().is_none());
    }

    #[test]
    fn test_absolute_resets_then_relative_adds() {
        let mut queue = FrameQueue::new();
        queue.push(ScrollInput::By(300.0).resolve(45.0, 450.0, 9000.0));
        queue.push(ScrollInput::To(1000.0).resolve(45.0, 450.0, 9000.0));
        queue.push(ScrollInput::LineDown.resolve(45.0, 450.0, 9000.0));
        let step = queue.take().unwrap();
        assert_eq!(step.apply(12345.0), 1045.0);
    }

    #[test]
    fn test_clear() {
        let mut queue = FrameQueue::new();
        queue.push(ScrollInput::LineDown.resolve(45.0, 450.0, 9000.0));
        assert!(queue.is_pending());
        queue.clear();
        assert!(queue.take().is_none());
    }
}
