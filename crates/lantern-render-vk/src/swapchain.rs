// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use ash::vk;
use lantern_render::{
    Acquired, PresentStatus, PresentationSurface, RenderResult, RenderSize, SlotRing,
};
use tracing::{debug, info};

use crate::device::{DeviceContext, VsyncMode};

/// Swapchain image format and color space. Must survive recreation
/// unchanged or pipelines built against the old render pass go stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceFormat {
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
}

impl From<vk::SurfaceFormatKHR> for SurfaceFormat {
    fn from(f: vk::SurfaceFormatKHR) -> Self {
        Self {
            format: f.format,
            color_space: f.color_space,
        }
    }
}

#[derive(Clone, Copy, Default)]
struct SlotSync {
    image_available: vk::Semaphore,
    in_flight: vk::Fence,
}

#[derive(Clone, Copy, Default)]
struct DepthTarget {
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

/// One swapchain generation: images, depth targets, render pass,
/// framebuffers and the per-slot sync objects.
pub struct VkSwapchain {
    ctx: Arc<DeviceContext>,
    swapchain: vk::SwapchainKHR,
    format: SurfaceFormat,
    depth_format: vk::Format,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,

    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    depth: Vec<DepthTarget>,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,

    sync: SlotRing<SlotSync>,
    // Signalled at present time; one per image so a semaphore is never
    // re-signalled while the presentation engine may still hold it.
    render_finished: Vec<vk::Semaphore>,
    images_in_flight: Vec<vk::Fence>,
}

// STRICT TEARDOWN ORDER (caller has already waited for the device to idle):
// - Framebuffers BEFORE render pass and the views they reference
// - Depth views, images, memory
// - Swapchain image views, then the swapchain itself
// - Sync objects last
impl Drop for VkSwapchain {
    fn drop(&mut self) {
        let d = self.ctx.device();
        unsafe {
            for &fb in &self.framebuffers {
                d.destroy_framebuffer(fb, None);
            }
            d.destroy_render_pass(self.render_pass, None);
            for t in &self.depth {
                d.destroy_image_view(t.view, None);
                d.destroy_image(t.image, None);
                d.free_memory(t.memory, None);
            }
            for &v in &self.views {
                d.destroy_image_view(v, None);
            }
            self.ctx
                .swapchain_loader()
                .destroy_swapchain(self.swapchain, None);
            for &s in &self.render_finished {
                d.destroy_semaphore(s, None);
            }
            for s in self.sync.iter() {
                d.destroy_semaphore(s.image_available, None);
                d.destroy_fence(s.in_flight, None);
            }
        }
    }
}

pub(crate) fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    vsync: bool,
    mode: VsyncMode,
) -> vk::PresentModeKHR {
    let order: &[vk::PresentModeKHR] = match (vsync, mode) {
        (false, _) => &[
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
        ],
        (true, VsyncMode::Mailbox) => &[vk::PresentModeKHR::MAILBOX],
        (true, VsyncMode::Fifo) => &[],
    };
    // FIFO is always available
    order
        .iter()
        .copied()
        .find(|m| modes.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub(crate) fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// sRGB BGRA first, then sRGB RGBA, else whatever the surface lists first.
pub(crate) fn pick_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    const PREFERRED: [vk::Format; 2] = [vk::Format::B8G8R8A8_SRGB, vk::Format::R8G8B8A8_SRGB];
    PREFERRED
        .iter()
        .find_map(|&want| {
            formats.iter().copied().find(|f| {
                f.format == want && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
        })
        .or_else(|| formats.first().copied())
}

pub(crate) fn image_count_from_caps(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = caps.min_image_count + 1;
    if caps.max_image_count > 0 && count > caps.max_image_count {
        count = caps.max_image_count;
    }
    count
}

impl VkSwapchain {
    /// Builds a swapchain for `want`. When `previous` is given its handle is
    /// passed as `old_swapchain`; the caller drops it once this returns.
    pub fn new(ctx: Arc<DeviceContext>, want: RenderSize, previous: Option<&VkSwapchain>) -> Result<Self> {
        // Start with null handles so a failure partway through still tears
        // down whatever was created.
        let mut chain = Self {
            ctx,
            swapchain: vk::SwapchainKHR::null(),
            format: SurfaceFormat {
                format: vk::Format::UNDEFINED,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            depth_format: vk::Format::UNDEFINED,
            extent: vk::Extent2D::default(),
            present_mode: vk::PresentModeKHR::FIFO,
            images: Vec::new(),
            views: Vec::new(),
            depth: Vec::new(),
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
            sync: SlotRing::new(|_| SlotSync::default()),
            render_finished: Vec::new(),
            images_in_flight: Vec::new(),
        };
        let old = previous.map_or(vk::SwapchainKHR::null(), |p| p.swapchain);
        unsafe {
            chain.create_swapchain(want, old)?;
            chain.create_image_views()?;
            chain.create_depth_resources()?;
            chain.create_render_pass()?;
            chain.create_framebuffers()?;
            chain.create_sync_objects()?;
        }

        info!(
            "swapchain: {}x{} {:?}/{:?} {:?}, {} images",
            chain.extent.width,
            chain.extent.height,
            chain.format.format,
            chain.format.color_space,
            chain.present_mode,
            chain.images.len()
        );
        Ok(chain)
    }

    unsafe fn create_swapchain(&mut self, want: RenderSize, old: vk::SwapchainKHR) -> Result<()> {
        let support = self.ctx.surface_support()?;
        let surface_format = pick_surface_format(&support.formats)
            .ok_or_else(|| anyhow!("surface reports no formats"))?;
        let pref = self.ctx.present_preference();
        let present_mode = choose_present_mode(&support.present_modes, pref.vsync, pref.mode);
        let extent = extent_from_caps(&support.capabilities, want);
        let min_image_count = image_count_from_caps(&support.capabilities);
        let caps = &support.capabilities;
        let pre_transform = if caps
            .supported_transforms
            .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
        {
            vk::SurfaceTransformFlagsKHR::IDENTITY
        } else {
            caps.current_transform
        };

        let families = self.ctx.queue_families();
        let family_indices = [families.graphics, families.present];
        let (sharing_mode, qf_count, qf_ptr) = if families.is_shared() {
            (vk::SharingMode::EXCLUSIVE, 0, std::ptr::null())
        } else {
            (
                vk::SharingMode::CONCURRENT,
                family_indices.len() as u32,
                family_indices.as_ptr(),
            )
        };

        let sc_ci = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: self.ctx.surface(),
            min_image_count,
            image_format: surface_format.format,
            image_color_space: surface_format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing_mode,
            queue_family_index_count: qf_count,
            p_queue_family_indices: qf_ptr,
            pre_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            old_swapchain: old,
            ..Default::default()
        };

        let loader = self.ctx.swapchain_loader();
        self.swapchain =
            unsafe { loader.create_swapchain(&sc_ci, None) }.context("create_swapchain")?;
        self.images =
            unsafe { loader.get_swapchain_images(self.swapchain) }.context("get_swapchain_images")?;
        self.format = surface_format.into();
        self.extent = extent;
        self.present_mode = present_mode;
        Ok(())
    }

    unsafe fn create_image_views(&mut self) -> Result<()> {
        for &image in &self.images {
            let view =
                self.ctx
                    .create_image_view(image, self.format.format, vk::ImageAspectFlags::COLOR)?;
            self.views.push(view);
        }
        Ok(())
    }

    unsafe fn create_depth_resources(&mut self) -> Result<()> {
        self.depth_format = self.ctx.depth_format()?;
        for _ in 0..self.images.len() {
            let ici = vk::ImageCreateInfo {
                s_type: vk::StructureType::IMAGE_CREATE_INFO,
                image_type: vk::ImageType::TYPE_2D,
                format: self.depth_format,
                extent: vk::Extent3D {
                    width: self.extent.width,
                    height: self.extent.height,
                    depth: 1,
                },
                mip_levels: 1,
                array_layers: 1,
                samples: vk::SampleCountFlags::TYPE_1,
                tiling: vk::ImageTiling::OPTIMAL,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                ..Default::default()
            };
            let (image, memory) = self
                .ctx
                .create_image_with_info(&ici, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;
            // Push before creating the view so Drop sees the image either way.
            self.depth.push(DepthTarget {
                image,
                memory,
                view: vk::ImageView::null(),
            });
            let view =
                self.ctx
                    .create_image_view(image, self.depth_format, vk::ImageAspectFlags::DEPTH)?;
            if let Some(t) = self.depth.last_mut() {
                t.view = view;
            }
        }
        Ok(())
    }

    unsafe fn create_render_pass(&mut self) -> Result<()> {
        let attachments = [
            vk::AttachmentDescription {
                format: self.format.format,
                samples: vk::SampleCountFlags::TYPE_1,
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::STORE,
                stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
                ..Default::default()
            },
            vk::AttachmentDescription {
                format: self.depth_format,
                samples: vk::SampleCountFlags::TYPE_1,
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::DONT_CARE,
                stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                ..Default::default()
            },
        ];
        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        let subpass = vk::SubpassDescription {
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            color_attachment_count: 1,
            p_color_attachments: &color_ref,
            p_depth_stencil_attachment: &depth_ref,
            ..Default::default()
        };
        let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
        let dependency = vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: stages,
            src_access_mask: vk::AccessFlags::empty(),
            dst_stage_mask: stages,
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dependency_flags: vk::DependencyFlags::empty(),
        };
        let rp_ci = vk::RenderPassCreateInfo {
            s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
            attachment_count: attachments.len() as u32,
            p_attachments: attachments.as_ptr(),
            subpass_count: 1,
            p_subpasses: &subpass,
            dependency_count: 1,
            p_dependencies: &dependency,
            ..Default::default()
        };
        self.render_pass = unsafe { self.ctx.device().create_render_pass(&rp_ci, None) }
            .context("create_render_pass")?;
        Ok(())
    }

    unsafe fn create_framebuffers(&mut self) -> Result<()> {
        for (view, depth) in self.views.iter().zip(&self.depth) {
            let attachments = [*view, depth.view];
            let fb_ci = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass: self.render_pass,
                attachment_count: attachments.len() as u32,
                p_attachments: attachments.as_ptr(),
                width: self.extent.width,
                height: self.extent.height,
                layers: 1,
                ..Default::default()
            };
            let fb = unsafe { self.ctx.device().create_framebuffer(&fb_ci, None) }
                .context("create_framebuffer")?;
            self.framebuffers.push(fb);
        }
        Ok(())
    }

    unsafe fn create_sync_objects(&mut self) -> Result<()> {
        let d = self.ctx.device();
        let sem_ci = vk::SemaphoreCreateInfo {
            s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
            ..Default::default()
        };
        // Signalled so the first wait on each slot returns immediately.
        let fence_ci = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: vk::FenceCreateFlags::SIGNALED,
            ..Default::default()
        };
        for s in self.sync.iter_mut() {
            s.image_available =
                unsafe { d.create_semaphore(&sem_ci, None) }.context("create_semaphore")?;
            s.in_flight = unsafe { d.create_fence(&fence_ci, None) }.context("create_fence")?;
        }
        for _ in 0..self.images.len() {
            let s = unsafe { d.create_semaphore(&sem_ci, None) }.context("create_semaphore")?;
            self.render_finished.push(s);
        }
        self.images_in_flight = vec![vk::Fence::null(); self.images.len()];
        Ok(())
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize]
    }

    pub fn vk_extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }
}

impl PresentationSurface for VkSwapchain {
    type CommandBuffer = vk::CommandBuffer;
    type Format = SurfaceFormat;

    fn image_format(&self) -> SurfaceFormat {
        self.format
    }

    fn extent(&self) -> RenderSize {
        RenderSize::new(self.extent.width, self.extent.height)
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn acquire_next_image(&mut self, slot: usize) -> RenderResult<Acquired> {
        let sync = self.sync[slot];
        let d = self.ctx.device();
        unsafe { d.wait_for_fences(&[sync.in_flight], true, u64::MAX) }
            .context("wait_for_fences (slot)")?;

        let acquired = unsafe {
            self.ctx.swapchain_loader().acquire_next_image(
                self.swapchain,
                u64::MAX,
                sync.image_available,
                vk::Fence::null(),
            )
        };
        match acquired {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    debug!(index, "acquire reported suboptimal swapchain");
                }
                Ok(Acquired::Image(index))
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquired::OutOfDate),
            Err(e) => Err(anyhow!("acquire_next_image: {e:?}").into()),
        }
    }

    fn submit_and_present(
        &mut self,
        cmd: vk::CommandBuffer,
        image_index: u32,
        slot: usize,
    ) -> RenderResult<PresentStatus> {
        let image = image_index as usize;
        let sync = self.sync[slot];
        let d = self.ctx.device();

        // Another slot may still be rendering into this image.
        let owner = self.images_in_flight[image];
        if owner != vk::Fence::null() {
            unsafe { d.wait_for_fences(&[owner], true, u64::MAX) }
                .context("wait_for_fences (image)")?;
        }
        self.images_in_flight[image] = sync.in_flight;

        unsafe { d.reset_fences(&[sync.in_flight]) }.context("reset_fences")?;

        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let render_finished = self.render_finished[image];
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &sync.image_available,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            signal_semaphore_count: 1,
            p_signal_semaphores: &render_finished,
            ..Default::default()
        };
        unsafe {
            d.queue_submit(
                self.ctx.graphics_queue(),
                std::slice::from_ref(&submit),
                sync.in_flight,
            )
        }
        .context("queue_submit")?;

        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &render_finished,
            swapchain_count: 1,
            p_swapchains: &self.swapchain,
            p_image_indices: &image_index,
            ..Default::default()
        };
        let presented = unsafe {
            self.ctx
                .swapchain_loader()
                .queue_present(self.ctx.present_queue(), &present)
        };
        match presented {
            Ok(false) => Ok(PresentStatus::Presented),
            Ok(true) => Ok(PresentStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentStatus::OutOfDate),
            Err(e) => Err(anyhow!("queue_present: {e:?}").into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let fifo_only = [vk::PresentModeKHR::FIFO];
        assert_eq!(
            choose_present_mode(&fifo_only, true, VsyncMode::Mailbox),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            choose_present_mode(&fifo_only, false, VsyncMode::Fifo),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn present_mode_honours_preference() {
        let all = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(
            choose_present_mode(&all, true, VsyncMode::Mailbox),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&all, true, VsyncMode::Fifo),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            choose_present_mode(&all, false, VsyncMode::Fifo),
            vk::PresentModeKHR::IMMEDIATE
        );
    }

    #[test]
    fn extent_uses_current_unless_undefined() {
        let mut caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 1024,
                height: 1024,
            },
            ..Default::default()
        };
        let want = RenderSize::new(2000, 300);
        assert_eq!(extent_from_caps(&caps, want).width, 640);

        caps.current_extent.width = u32::MAX;
        let e = extent_from_caps(&caps, want);
        assert_eq!((e.width, e.height), (1024, 300));
    }

    #[test]
    fn surface_format_prefers_srgb() {
        let formats = [
            fmt(vk::Format::B8G8R8A8_UNORM),
            fmt(vk::Format::R8G8B8A8_SRGB),
            fmt(vk::Format::B8G8R8A8_SRGB),
        ];
        assert_eq!(
            pick_surface_format(&formats).map(|f| f.format),
            Some(vk::Format::B8G8R8A8_SRGB)
        );
        assert_eq!(
            pick_surface_format(&formats[..1]).map(|f| f.format),
            Some(vk::Format::B8G8R8A8_UNORM)
        );
        assert!(pick_surface_format(&[]).is_none());
    }

    #[test]
    fn image_count_respects_max() {
        let mut caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(image_count_from_caps(&caps), 3);
        caps.max_image_count = 2;
        assert_eq!(image_count_from_caps(&caps), 2);
    }
}
