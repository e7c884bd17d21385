//! Async Bridge: results from fetch tasks back into the frame loop
//!
//! - Page fetches and value lookups run on the executor (tokio blocking pool)
//! - The table itself stays synchronous and single-owner
//! - std::sync::mpsc channels bridge the two; `tick()` drains them

use super::page_loader::Generation;
use super::page_source::PageResponse;
use crate::error::TableError;
use crate::model::row::{PageIndex, RowId};
use std::sync::mpsc;

/// Messages sent from fetch tasks to the frame loop
#[derive(Debug)]
pub enum TableMessage {
    /// A page fetch finished, tagged with the generation it was issued under
    PageLoaded {
        page: PageIndex,
        generation: Generation,
        result: Result<PageResponse, TableError>,
    },

    /// A search-by-value lookup finished
    LookupResolved {
        ticket: u64,
        result: Result<Option<RowId>, TableError>,
    },
}

/// Bridge between fetch tasks and the synchronous frame loop
///
/// Cloneable; all clones share the same receiver.
#[derive(Clone)]
pub struct AsyncBridge {
    sender: mpsc::Sender<TableMessage>,
    receiver: std::sync::Arc<std::sync::Mutex<mpsc::Receiver<TableMessage>>>,
}

impl std::fmt::Debug for AsyncBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncBridge").finish_non_exhaustive()
    }
}

impl AsyncBridge {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver: std::sync::Arc::new(std::sync::Mutex::new(receiver)),
        }
    }

    /// Get a cloneable sender for fetch tasks
    pub fn sender(&self) -> mpsc::Sender<TableMessage> {
        self.sender.clone()
    }

    /// Drain all pending messages without blocking
    ///
    /// Called once per frame tick.
    pub fn try_recv_all(&self) -> Vec<TableMessage> {
        let mut messages = Vec::new();

        if let Ok(receiver) = self.receiver.lock() {
            while let Ok(msg) = receiver.try_recv() {
                messages.push(msg);
            }
        }

        messages
    }
}

impl Default for AsyncBridge {
    fn default() -> Self {
        Self::new()
    }
}
