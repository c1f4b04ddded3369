// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Backend-neutral half of the frame pipeline: the frame orchestrator, the
//! per-slot resource bookkeeping and the scene/light data the passes consume.
//! The Vulkan side lives in `lantern-render-vk` and plugs in through the
//! traits in [`surface`].

pub mod descriptor;
pub mod error;
pub mod frame;
pub mod light;
pub mod renderer;
pub mod ring;
pub mod scene;
pub mod surface;
pub mod ubo;

pub use descriptor::{DescriptorPoolBackend, FrameDescriptorPool, FrameSet};
pub use error::{RenderError, RenderResult};
pub use frame::FrameContext;
pub use renderer::{FrameState, IdleGuard, Renderer};
pub use ring::{SlotRing, MAX_FRAMES_IN_FLIGHT};
pub use scene::{AssetTable, Drawable, DrawableId, MeshHandle, PointLight, Scene, TextureHandle};
pub use surface::{Acquired, GpuDevice, PresentStatus, PresentationSurface, SurfaceWindow};
pub use ubo::{GlobalUbo, ObjectPush, ObjectUniform, PointLightPush, PointLightUniform, MAX_LIGHTS};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimised window reports a zero dimension.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}
