//! GPU plumbing shared by the renderer crates
//!
//! Headless device setup, append-then-upload storage buffers, a rotating
//! readback ring for async counter reads, and small texture/pipeline
//! helpers. Pass ordering is whatever the caller encodes into command
//! submission; there is no dependency tracking here.

mod context;
mod dynamic_buffer;
mod pipeline;
mod readback;
mod texture;

pub use context::GpuContext;
pub use dynamic_buffer::DynamicBuffer;
pub use pipeline::create_compute_pipeline;
pub use readback::ReadbackRing;
pub use texture::{create_storage_texture_2d, create_storage_texture_3d};

pub use wgpu;
