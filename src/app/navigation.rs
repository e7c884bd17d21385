//! Random-access navigation: jump to id and search by field value.
//!
//! State machine: `Idle -> Requested -> (resolved -> Jumping -> Idle | not found -> Idle
//! | failed -> Idle)`. Only one lookup is live at a time; starting another
//! navigation settles the previous one with `false`.

use crate::error::TableError;
use crate::model::row::RowId;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavState {
    Idle,
    Requested {
        ticket: u64,
        field: String,
        value: String,
    },
    Jumping {
        id: RowId,
    },
}

/// Completion of a `navigate_to_value` call; resolves to whether the row was found
#[derive(Debug)]
pub struct PendingNavigation {
    receiver: oneshot::Receiver<bool>,
}

impl PendingNavigation {
    fn channel() -> (oneshot::Sender<bool>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }

    /// An already settled navigation
    pub fn ready(found: bool) -> Self {
        let (sender, pending) = Self::channel();
        let _ = sender.send(found);
        pending
    }

    /// Non-blocking check: `None` while the lookup is still running
    pub fn try_result(&mut self) -> Option<bool> {
        match self.receiver.try_recv() {
            Ok(found) => Some(found),
            Err(oneshot::error::TryRecvError::Empty) => None,
            // The table went away before settling
            Err(oneshot::error::TryRecvError::Closed) => Some(false),
        }
    }
}

impl Future for PendingNavigation {
    type Output = bool;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.unwrap_or(false))
    }
}

/// What to do with a finished lookup
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// A newer navigation replaced this one; nothing to do
    Superseded,
    Found(RowId),
    NotFound,
    Failed(TableError),
}

#[derive(Debug)]
pub struct NavigationController {
    state: NavState,
    next_ticket: u64,
    waiter: Option<oneshot::Sender<bool>>,
    highlighted: Option<RowId>,
}

impl Default for NavigationController {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationController {
    pub fn new() -> Self {
        Self {
            state: NavState::Idle,
            next_ticket: 0,
            waiter: None,
            highlighted: None,
        }
    }

    pub fn state(&self) -> &NavState {
        &self.state
    }

    pub fn highlighted(&self) -> Option<RowId> {
        self.highlighted
    }

    pub fn set_highlighted(&mut self, id: Option<RowId>) {
        self.highlighted = id;
    }

    /// Check a jump target against the dataset
    pub fn validate_target(id: i64, total_rows: u64) -> Result<RowId, TableError> {
        if id >= 1 && (id as u64) <= total_rows {
            Ok(id as RowId)
        } else {
            Err(TableError::InvalidNavigationTarget { id, total_rows })
        }
    }

    /// Scroll offset that puts `id` at the top of the viewport
    pub fn target_scroll_top(id: RowId, row_height: f64) -> f64 {
        (id.saturating_sub(1)) as f64 * row_height
    }

    /// Settle any live lookup with `false` and go idle
    ///
    /// Returns true if a lookup was superseded.
    pub fn supersede(&mut self) -> bool {
        let superseded = match self.waiter.take() {
            Some(waiter) => {
                let _ = waiter.send(false);
                true
            }
            None => false,
        };
        if superseded {
            tracing::debug!("Superseded pending lookup {:?}", self.state);
        }
        self.state = NavState::Idle;
        superseded
    }

    /// Start a lookup, superseding the previous one
    pub fn begin_lookup(&mut self, field: &str, value: &str) -> (u64, PendingNavigation) {
        self.supersede();
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let (sender, pending) = PendingNavigation::channel();
        self.waiter = Some(sender);
        self.state = NavState::Requested {
            ticket,
            field: field.to_string(),
            value: value.to_string(),
        };
        (ticket, pending)
    }

    /// Classify a lookup result. Anything but `Found` settles the waiter here;
    /// for `Found` the caller jumps and then calls `settle`.
    pub fn resolve_lookup(
        &mut self,
        ticket: u64,
        result: Result<Option<RowId>, TableError>,
    ) -> LookupOutcome {
        match &self.state {
            NavState::Requested { ticket: live, .. } if *live == ticket => {}
            _ => {
                tracing::debug!("Ignoring result of superseded lookup #{}", ticket);
                return LookupOutcome::Superseded;
            }
        }

        match result {
            Ok(Some(id)) => {
                self.state = NavState::Jumping { id };
                LookupOutcome::Found(id)
            }
            Ok(None) => {
                self.settle(false);
                LookupOutcome::NotFound
            }
            Err(err) => {
                self.settle(false);
                LookupOutcome::Failed(err)
            }
        }
    }

    /// Resolve the live waiter (if any) and return to idle
    pub fn settle(&mut self, found: bool) {
        if let Some(waiter) = self.waiter.take() {
            let _ = waiter.send(found);
        }
        self.state = NavState::Idle;
    }
}
