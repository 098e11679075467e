//! GPU backends, synchronization and the render loop

pub mod gpu;
pub mod headless;
pub mod context;
pub mod sync;
pub mod draw_order;
pub mod system;

pub use context::{FrameDraw, WgpuBackend};
pub use gpu::{GpuBackend, GpuTexture, LightingParams, ObjectDrawParams, SharedBackend, TextureId};
pub use headless::{GpuCommand, HeadlessBackend};
pub use system::{FrameStats, RenderState, RenderSystem};
