pub mod cleanup;
pub mod frame;
pub mod immediate;
pub mod render_context;
