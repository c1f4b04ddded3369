// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ash::vk;
use tracing::debug;

use crate::buffer::Buffer;
use crate::device::DeviceContext;

/// Sampled 2D RGBA texture, kept in SHADER_READ_ONLY_OPTIMAL.
pub struct Texture {
    ctx: Arc<DeviceContext>,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    sampler: vk::Sampler,
    width: u32,
    height: u32,
}

impl Drop for Texture {
    fn drop(&mut self) {
        let d = self.ctx.device();
        unsafe {
            d.destroy_sampler(self.sampler, None);
            d.destroy_image_view(self.view, None);
            d.destroy_image(self.image, None);
            d.free_memory(self.memory, None);
        }
    }
}

impl Texture {
    /// Uploads tightly packed sRGB RGBA8 pixels.
    pub fn from_rgba8(ctx: Arc<DeviceContext>, width: u32, height: u32, pixels: &[u8]) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            bail!("texture {width}x{height} needs {expected} bytes, got {}", pixels.len());
        }
        let format = vk::Format::R8G8B8A8_SRGB;

        let mut staging = Buffer::new(
            ctx.clone(),
            pixels.len() as vk::DeviceSize,
            1,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            1,
        )?;
        staging.map()?;
        staging.write_to_buffer(pixels, 0)?;

        let ici = vk::ImageCreateInfo {
            s_type: vk::StructureType::IMAGE_CREATE_INFO,
            image_type: vk::ImageType::TYPE_2D,
            format,
            extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
            mip_levels: 1,
            array_layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
            tiling: vk::ImageTiling::OPTIMAL,
            usage: vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            ..Default::default()
        };
        let (image, memory) = ctx.create_image_with_info(&ici, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;
        // From here on Drop owns cleanup.
        let mut texture = Self {
            ctx,
            image,
            memory,
            view: vk::ImageView::null(),
            sampler: vk::Sampler::null(),
            width,
            height,
        };

        let ctx = &texture.ctx;
        ctx.transition_image_layout(
            image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;
        ctx.copy_buffer_to_image(staging.buffer(), image, width, height, 1)?;
        ctx.transition_image_layout(
            image,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        let view = ctx.create_image_view(image, format, vk::ImageAspectFlags::COLOR)?;
        let sampler = create_sampler(ctx)?;
        texture.view = view;
        texture.sampler = sampler;
        debug!(width, height, "texture uploaded");
        Ok(texture)
    }

    /// 1x1 texture of a single color.
    pub fn solid(ctx: Arc<DeviceContext>, rgba: [u8; 4]) -> Result<Self> {
        Self::from_rgba8(ctx, 1, 1, &rgba)
    }

    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler,
            image_view: self.view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn create_sampler(ctx: &DeviceContext) -> Result<vk::Sampler> {
    let anisotropy = ctx.enabled_features().sampler_anisotropy == vk::TRUE;
    let ci = vk::SamplerCreateInfo {
        s_type: vk::StructureType::SAMPLER_CREATE_INFO,
        mag_filter: vk::Filter::LINEAR,
        min_filter: vk::Filter::LINEAR,
        mipmap_mode: vk::SamplerMipmapMode::LINEAR,
        address_mode_u: vk::SamplerAddressMode::REPEAT,
        address_mode_v: vk::SamplerAddressMode::REPEAT,
        address_mode_w: vk::SamplerAddressMode::REPEAT,
        anisotropy_enable: anisotropy as vk::Bool32,
        max_anisotropy: if anisotropy {
            ctx.properties().limits.max_sampler_anisotropy
        } else {
            1.0
        },
        border_color: vk::BorderColor::INT_OPAQUE_BLACK,
        compare_op: vk::CompareOp::ALWAYS,
        ..Default::default()
    };
    Ok(unsafe { ctx.device().create_sampler(&ci, None) }.context("create_sampler")?)
}
