// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::surface::{Acquired, GpuDevice, PresentStatus, PresentationSurface, SurfaceWindow};
use crate::{RenderError, RenderResult, RenderSize, SlotRing, MAX_FRAMES_IN_FLIGHT};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    FrameBegun,
    InRenderPass,
    PassesRecorded,
}

/// Drives one frame at a time through acquire, record and present, and
/// rebuilds the swapchain when the platform says it went stale.
pub struct Renderer<D: GpuDevice> {
    device: Arc<D>,
    surface: D::Surface,
    command_buffers: SlotRing<D::CommandBuffer>,
    image_index: u32,
    slot: usize,
    state: FrameState,
    clear_color: [f32; 4],
    recreations: u64,
}

impl<D: GpuDevice> Renderer<D> {
    pub fn new(device: Arc<D>, window: &mut impl SurfaceWindow) -> RenderResult<Self> {
        let extent = wait_for_extent(window);
        let surface = D::create_surface(&device, extent, None)?;

        let allocated = device.allocate_command_buffers(MAX_FRAMES_IN_FLIGHT)?;
        if allocated.len() != MAX_FRAMES_IN_FLIGHT {
            device.free_command_buffers(&allocated);
            return Err(anyhow::anyhow!(
                "expected {MAX_FRAMES_IN_FLIGHT} command buffers, got {}",
                allocated.len()
            )
            .into());
        }
        let command_buffers = SlotRing::new(|slot| allocated[slot]);

        info!(
            "renderer ready ({}x{}, {} images, {} frames in flight)",
            extent.width,
            extent.height,
            surface.image_count(),
            MAX_FRAMES_IN_FLIGHT
        );

        Ok(Self {
            device,
            surface,
            command_buffers,
            image_index: 0,
            slot: 0,
            state: FrameState::Idle,
            clear_color: [0.01, 0.01, 0.01, 1.0],
            recreations: 0,
        })
    }

    /// Acquires the next image and opens the current slot's command buffer.
    ///
    /// `Ok(None)` means the swapchain was stale and has been rebuilt; skip
    /// rendering this tick.
    pub fn begin_frame(
        &mut self,
        window: &mut impl SurfaceWindow,
    ) -> RenderResult<Option<D::CommandBuffer>> {
        self.expect_state("begin_frame", &[FrameState::Idle])?;

        match self.surface.acquire_next_image(self.slot)? {
            Acquired::OutOfDate => {
                debug!(slot = self.slot, "acquire out of date, rebuilding swapchain");
                self.recreate_swapchain(window)?;
                return Ok(None);
            }
            Acquired::Image(index) => self.image_index = index,
        }

        let cmd = self.command_buffers[self.slot];
        self.device.begin_command_buffer(cmd)?;
        self.state = FrameState::FrameBegun;
        Ok(Some(cmd))
    }

    pub fn begin_render_pass(&mut self, cmd: D::CommandBuffer) -> RenderResult<()> {
        self.expect_state(
            "begin_render_pass",
            &[FrameState::FrameBegun, FrameState::PassesRecorded],
        )?;
        self.expect_current(cmd)?;

        self.device
            .begin_render_pass(cmd, &self.surface, self.image_index, self.clear_color);
        // extent can change between frames
        self.device.set_viewport_and_scissor(cmd, self.surface.extent());
        self.state = FrameState::InRenderPass;
        Ok(())
    }

    pub fn end_render_pass(&mut self, cmd: D::CommandBuffer) -> RenderResult<()> {
        self.expect_state("end_render_pass", &[FrameState::InRenderPass])?;
        self.expect_current(cmd)?;

        self.device.end_render_pass(cmd);
        self.state = FrameState::PassesRecorded;
        Ok(())
    }

    /// Closes the command buffer, submits and presents.
    ///
    /// The slot always advances once submission was attempted, including on
    /// a retryable present, so the acquire-side fence wait stays paired with
    /// the submit that signalled it.
    pub fn end_frame(&mut self, window: &mut impl SurfaceWindow) -> RenderResult<PresentStatus> {
        self.expect_state(
            "end_frame",
            &[FrameState::FrameBegun, FrameState::PassesRecorded],
        )?;

        let cmd = self.command_buffers[self.slot];
        self.device.end_command_buffer(cmd)?;

        let submitted = self
            .surface
            .submit_and_present(cmd, self.image_index, self.slot);
        self.state = FrameState::Idle;
        self.slot = (self.slot + 1) % MAX_FRAMES_IN_FLIGHT;
        let status = submitted?;

        let resized = window.was_resized();
        if status.is_retryable() || resized {
            debug!(?status, resized, "rebuilding swapchain after present");
            window.reset_resized_flag();
            self.recreate_swapchain(window)?;
        }
        Ok(status)
    }

    /// Two-phase rebuild: build the new chain from the old one, check it is
    /// compatible, then release the old one.
    pub fn recreate_swapchain(&mut self, window: &mut impl SurfaceWindow) -> RenderResult<()> {
        let extent = wait_for_extent(window);
        self.device.wait_idle()?;

        let next = D::create_surface(&self.device, extent, Some(&self.surface))?;
        let previous_format = self.surface.image_format();
        let current_format = next.image_format();
        if previous_format != current_format {
            return Err(RenderError::FormatDrift {
                previous: format!("{previous_format:?}"),
                current: format!("{current_format:?}"),
            });
        }

        let old = std::mem::replace(&mut self.surface, next);
        drop(old);
        self.recreations += 1;

        info!(
            "swapchain recreated ({}x{}, {} images)",
            extent.width,
            extent.height,
            self.surface.image_count()
        );
        Ok(())
    }

    fn expect_state(&self, operation: &'static str, allowed: &[FrameState]) -> RenderResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(RenderError::FrameState {
                operation,
                state: self.state,
            })
        }
    }

    fn expect_current(&self, cmd: D::CommandBuffer) -> RenderResult<()> {
        if cmd == self.command_buffers[self.slot] {
            Ok(())
        } else {
            Err(RenderError::ForeignCommandBuffer)
        }
    }

    /// Current frame-in-flight slot.
    pub fn frame_index(&self) -> usize {
        self.slot
    }

    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn is_frame_in_progress(&self) -> bool {
        self.state != FrameState::Idle
    }

    pub fn current_command_buffer(&self) -> RenderResult<D::CommandBuffer> {
        if !self.is_frame_in_progress() {
            return Err(RenderError::FrameState {
                operation: "current_command_buffer",
                state: self.state,
            });
        }
        Ok(self.command_buffers[self.slot])
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.surface.aspect_ratio()
    }

    pub fn extent(&self) -> RenderSize {
        self.surface.extent()
    }

    pub fn surface(&self) -> &D::Surface {
        &self.surface
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    pub fn recreation_count(&self) -> u64 {
        self.recreations
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }
}

impl<D: GpuDevice> Drop for Renderer<D> {
    fn drop(&mut self) {
        // nothing may still reference the command buffers
        let _ = self.device.wait_idle();
        self.device.free_command_buffers(self.command_buffers.as_slice());
    }
}

/// Waits for the device to go idle when dropped.
///
/// Locals drop in reverse order, so one of these declared after the last GPU
/// object waits before any of them is destroyed, on early `?` returns too.
pub struct IdleGuard<D: GpuDevice> {
    device: Arc<D>,
}

impl<D: GpuDevice> IdleGuard<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self { device }
    }
}

impl<D: GpuDevice> Drop for IdleGuard<D> {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            warn!("wait_idle before teardown failed: {e}");
        }
    }
}

fn wait_for_extent(window: &mut impl SurfaceWindow) -> RenderSize {
    let mut extent = window.extent();
    while extent.is_empty() {
        window.wait_events();
        extent = window.extent();
    }
    extent
}
