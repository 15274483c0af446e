pub mod framebuffer;
pub mod log;
