//! Host readiness.
//!
//! The table cannot compute a window until the host reports its container
//! geometry. `HostReady` carries that report over a watch channel so mounting
//! can await it instead of polling.

use crate::error::TableError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Container geometry in host units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostGeometry {
    pub viewport_height: f64,
    pub viewport_width: f64,
    /// Width of the whole window, used to bound the side panel
    pub window_width: f64,
}

impl HostGeometry {
    pub fn new(viewport_width: f64, viewport_height: f64) -> Self {
        Self {
            viewport_height,
            viewport_width,
            window_width: viewport_width,
        }
    }

    fn is_usable(&self) -> bool {
        self.viewport_height > 0.0 && self.viewport_height.is_finite()
    }
}

#[derive(Debug, Clone)]
pub struct HostReady {
    sender: Arc<watch::Sender<Option<HostGeometry>>>,
}

impl Default for HostReady {
    fn default() -> Self {
        Self::new()
    }
}

impl HostReady {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Already-ready handle, for hosts that know their geometry up front
    pub fn with_geometry(geometry: HostGeometry) -> Self {
        let ready = Self::new();
        ready.report(geometry);
        ready
    }

    /// Report (or update) container geometry. Zero-height reports do not count as ready.
    pub fn report(&self, geometry: HostGeometry) {
        tracing::debug!("Host geometry reported: {:?}", geometry);
        self.sender.send_replace(Some(geometry));
    }

    /// Latest usable geometry, if any
    pub fn current(&self) -> Option<HostGeometry> {
        (*self.sender.borrow()).filter(HostGeometry::is_usable)
    }

    /// Wait until the host reports usable geometry
    pub async fn wait(&self, timeout: Duration) -> Result<HostGeometry, TableError> {
        let mut receiver = self.sender.subscribe();
        let waited = tokio::time::timeout(
            timeout,
            receiver.wait_for(|geometry| geometry.is_some_and(|g| g.is_usable())),
        )
        .await;

        match waited {
            Ok(Ok(geometry)) => (*geometry).ok_or(TableError::HostUnavailable),
            Ok(Err(_)) | Err(_) => Err(TableError::HostUnavailable),
        }
    }
}
