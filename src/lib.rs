//! Windowed, remotely-paginated table engine.
//!
//! The engine presents a dataset far larger than is practical to materialize:
//! it fetches only the pages covering the visible region plus a buffer,
//! recycles a pool of row slots as the window slides, and keeps a synthetic
//! scrollbar in sync with the virtual content height.
//!
//! Layout:
//! - `model` - rows, pages, the bounded row cache, columns and query scope
//! - `services` - page source (HTTP), page loader, async bridge, executors, settings
//! - `view` - viewport window, frame queue, row renderer, scrollbar, layout
//! - `app` - the `VirtualTable` facade, navigation and host contract
//! - `ui` - ratatui rendering for the terminal host (runtime feature)

pub mod app;
pub mod config;
pub mod error;
pub mod model;
pub mod services;
pub mod view;

#[cfg(feature = "runtime")]
pub mod config_io;
#[cfg(feature = "runtime")]
pub mod ui;

pub use app::VirtualTable;
pub use config::TableConfig;
pub use error::TableError;
