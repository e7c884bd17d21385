pub mod async_bridge;
pub mod demo_source;
pub mod executor;
pub mod http_source;
pub mod page_loader;
pub mod page_source;
pub mod settings;

#[cfg(feature = "runtime")]
pub mod tracing_setup;
