// SPDX-License-Identifier: CEPL-1.0
//! Seams between the frame orchestrator and its collaborators: the window
//! it presents into, the swapchain and the device that records commands.

use std::fmt::Debug;
use std::sync::Arc;

use crate::{RenderResult, RenderSize};

/// Result of asking the swapchain for the next image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquired {
    /// Image ready for rendering. A suboptimal acquire lands here too.
    Image(u32),
    /// The surface no longer matches the swapchain; rebuild and skip the frame.
    OutOfDate,
}

/// Outcome of a submit + present that did not fail outright.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentStatus {
    Presented,
    /// Shown, but the swapchain should be rebuilt.
    Suboptimal,
    /// Not shown; the swapchain must be rebuilt.
    OutOfDate,
}

impl PresentStatus {
    pub fn is_retryable(self) -> bool {
        !matches!(self, PresentStatus::Presented)
    }
}

/// What the renderer needs from the platform window.
pub trait SurfaceWindow {
    /// Current drawable size in pixels. Zero while minimised.
    fn extent(&self) -> RenderSize;
    fn was_resized(&self) -> bool;
    fn reset_resized_flag(&mut self);
    /// Blocks until at least one platform event has been processed.
    fn wait_events(&mut self);
}

/// One swapchain instance: fixed image count, fixed format.
pub trait PresentationSurface {
    type CommandBuffer: Copy;
    type Format: Copy + PartialEq + Debug;

    fn image_format(&self) -> Self::Format;
    fn extent(&self) -> RenderSize;
    fn image_count(&self) -> usize;

    /// Waits for `slot`'s previous submission, then acquires an image
    /// signalling `slot`'s image-available semaphore.
    fn acquire_next_image(&mut self, slot: usize) -> RenderResult<Acquired>;

    /// Submits `cmd` for `image_index` using `slot`'s sync objects and
    /// queues the image for presentation.
    fn submit_and_present(
        &mut self,
        cmd: Self::CommandBuffer,
        image_index: u32,
        slot: usize,
    ) -> RenderResult<PresentStatus>;

    fn aspect_ratio(&self) -> f32 {
        self.extent().aspect_ratio()
    }
}

/// Device-side operations the orchestrator drives each frame.
pub trait GpuDevice: Sized {
    type CommandBuffer: Copy + PartialEq + Debug;
    type Surface: PresentationSurface<CommandBuffer = Self::CommandBuffer>;

    /// Builds a swapchain for `extent`. `previous`, when given, is handed to
    /// the platform so it can recycle resources; the caller drops it after.
    fn create_surface(
        device: &Arc<Self>,
        extent: RenderSize,
        previous: Option<&Self::Surface>,
    ) -> RenderResult<Self::Surface>;

    fn wait_idle(&self) -> RenderResult<()>;

    fn allocate_command_buffers(&self, count: usize) -> RenderResult<Vec<Self::CommandBuffer>>;
    fn free_command_buffers(&self, buffers: &[Self::CommandBuffer]);

    fn begin_command_buffer(&self, cmd: Self::CommandBuffer) -> RenderResult<()>;
    fn end_command_buffer(&self, cmd: Self::CommandBuffer) -> RenderResult<()>;

    fn begin_render_pass(
        &self,
        cmd: Self::CommandBuffer,
        surface: &Self::Surface,
        image_index: u32,
        clear_color: [f32; 4],
    );
    fn set_viewport_and_scissor(&self, cmd: Self::CommandBuffer, extent: RenderSize);
    fn end_render_pass(&self, cmd: Self::CommandBuffer);
}
