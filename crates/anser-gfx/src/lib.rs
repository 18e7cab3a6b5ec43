pub mod commands;
pub mod error;
pub mod foundation;
pub mod gfx_context;
pub mod resources;
pub mod shader;
pub mod swapchain;
