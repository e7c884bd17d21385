pub mod frame_queue;
pub mod layout;
pub mod row_renderer;
pub mod scrollbar;
pub mod viewport;
