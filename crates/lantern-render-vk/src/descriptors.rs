// SPDX-License-Identifier: CEPL-1.0
//! Descriptor set layouts, the per-slot pool backend and a small writer
//! that batches buffer/image writes into one `update_descriptor_sets`.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use ash::vk;
use lantern_render::{DescriptorPoolBackend, RenderError, RenderResult};

use crate::device::DeviceContext;

pub struct DescriptorSetLayout {
    ctx: Arc<DeviceContext>,
    layout: vk::DescriptorSetLayout,
    bindings: BTreeMap<u32, vk::DescriptorSetLayoutBinding<'static>>,
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx
                .device()
                .destroy_descriptor_set_layout(self.layout, None)
        };
    }
}

impl DescriptorSetLayout {
    pub fn builder() -> DescriptorSetLayoutBuilder {
        DescriptorSetLayoutBuilder::default()
    }

    pub fn raw(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    fn descriptor_type(&self, binding: u32) -> Result<vk::DescriptorType> {
        self.bindings
            .get(&binding)
            .map(|b| b.descriptor_type)
            .ok_or_else(|| anyhow!("layout has no binding {binding}"))
    }
}

#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: BTreeMap<u32, vk::DescriptorSetLayoutBinding<'static>>,
}

impl DescriptorSetLayoutBuilder {
    pub fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
    ) -> Self {
        debug_assert!(!self.bindings.contains_key(&binding), "binding {binding} already in use");
        self.bindings.insert(
            binding,
            vk::DescriptorSetLayoutBinding {
                binding,
                descriptor_type,
                descriptor_count: 1,
                stage_flags,
                ..Default::default()
            },
        );
        self
    }

    pub fn build(self, ctx: Arc<DeviceContext>) -> Result<DescriptorSetLayout> {
        let bindings: Vec<_> = self.bindings.values().copied().collect();
        let ci = vk::DescriptorSetLayoutCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
            binding_count: bindings.len() as u32,
            p_bindings: bindings.as_ptr(),
            ..Default::default()
        };
        let layout = unsafe { ctx.device().create_descriptor_set_layout(&ci, None) }
            .context("create_descriptor_set_layout")?;
        Ok(DescriptorSetLayout {
            ctx,
            layout,
            bindings: self.bindings,
        })
    }
}

/// Pool sizes for one frame slot.
#[derive(Clone, Copy, Debug)]
pub struct PoolSizes {
    pub max_sets: u32,
    pub uniform_buffers: u32,
    pub combined_image_samplers: u32,
}

impl Default for PoolSizes {
    fn default() -> Self {
        Self {
            max_sets: 1000,
            uniform_buffers: 1000,
            combined_image_samplers: 1000,
        }
    }
}

/// The Vulkan pool behind a slot's `FrameDescriptorPool`. Reset wholesale,
/// never freed set by set.
pub struct VkDescriptorPool {
    ctx: Arc<DeviceContext>,
    pool: vk::DescriptorPool,
    slot: usize,
    max_sets: u32,
}

impl Drop for VkDescriptorPool {
    fn drop(&mut self) {
        unsafe { self.ctx.device().destroy_descriptor_pool(self.pool, None) };
    }
}

impl VkDescriptorPool {
    pub fn new(ctx: Arc<DeviceContext>, slot: usize, sizes: PoolSizes) -> Result<Self> {
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: sizes.uniform_buffers,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: sizes.combined_image_samplers,
            },
        ];
        let ci = vk::DescriptorPoolCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            max_sets: sizes.max_sets,
            pool_size_count: pool_sizes.len() as u32,
            p_pool_sizes: pool_sizes.as_ptr(),
            ..Default::default()
        };
        let pool = unsafe { ctx.device().create_descriptor_pool(&ci, None) }
            .context("create_descriptor_pool")?;
        Ok(Self {
            ctx,
            pool,
            slot,
            max_sets: sizes.max_sets,
        })
    }
}

impl DescriptorPoolBackend for VkDescriptorPool {
    type Layout = vk::DescriptorSetLayout;
    type Set = vk::DescriptorSet;

    fn allocate(&mut self, layout: vk::DescriptorSetLayout) -> RenderResult<vk::DescriptorSet> {
        let layouts = [layout];
        let ai = vk::DescriptorSetAllocateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            descriptor_pool: self.pool,
            descriptor_set_count: 1,
            p_set_layouts: layouts.as_ptr(),
            ..Default::default()
        };
        match unsafe { self.ctx.device().allocate_descriptor_sets(&ai) } {
            Ok(sets) => sets
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("driver returned no descriptor set").into()),
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL) => {
                Err(RenderError::DescriptorPoolExhausted {
                    slot: self.slot,
                    capacity: self.max_sets as usize,
                })
            }
            Err(e) => Err(anyhow!("allocate_descriptor_sets: {e:?}").into()),
        }
    }

    fn reset(&mut self) -> RenderResult<()> {
        unsafe {
            self.ctx
                .device()
                .reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty())
        }
        .context("reset_descriptor_pool")?;
        Ok(())
    }
}

enum PendingWrite {
    Buffer(u32, vk::DescriptorBufferInfo),
    Image(u32, vk::DescriptorImageInfo),
}

/// Collects writes against one layout and flushes them to a set.
pub struct DescriptorWriter<'a> {
    layout: &'a DescriptorSetLayout,
    writes: Vec<PendingWrite>,
}

impl<'a> DescriptorWriter<'a> {
    pub fn new(layout: &'a DescriptorSetLayout) -> Self {
        Self {
            layout,
            writes: Vec::new(),
        }
    }

    pub fn write_buffer(mut self, binding: u32, info: vk::DescriptorBufferInfo) -> Self {
        self.writes.push(PendingWrite::Buffer(binding, info));
        self
    }

    pub fn write_image(mut self, binding: u32, info: vk::DescriptorImageInfo) -> Self {
        self.writes.push(PendingWrite::Image(binding, info));
        self
    }

    pub fn write(&self, set: vk::DescriptorSet) -> Result<()> {
        // Infos live in self.writes, which is not touched until the update returns.
        let mut vk_writes = Vec::with_capacity(self.writes.len());
        for w in &self.writes {
            let (binding, p_buffer_info, p_image_info) = match w {
                PendingWrite::Buffer(b, info) => (*b, info as *const _, std::ptr::null()),
                PendingWrite::Image(b, info) => (*b, std::ptr::null(), info as *const _),
            };
            vk_writes.push(vk::WriteDescriptorSet {
                s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
                dst_set: set,
                dst_binding: binding,
                dst_array_element: 0,
                descriptor_count: 1,
                descriptor_type: self.layout.descriptor_type(binding)?,
                p_buffer_info,
                p_image_info,
                ..Default::default()
            });
        }
        unsafe {
            self.layout
                .ctx
                .device()
                .update_descriptor_sets(&vk_writes, &[])
        };
        Ok(())
    }
}
