// SPDX-License-Identifier: CEPL-1.0
//! Everything a frame-in-flight slot writes to: its global uniform, its slice
//! of per-object uniforms and its descriptor pool.

use std::mem::size_of;
use std::sync::Arc;

use anyhow::Result;
use ash::vk;
use lantern_render::{FrameDescriptorPool, FrameSet, GlobalUbo, ObjectUniform, SlotRing};
use tracing::debug;

use crate::buffer::Buffer;
use crate::descriptors::{DescriptorSetLayout, DescriptorWriter, PoolSizes, VkDescriptorPool};
use crate::device::DeviceContext;

/// Drawables with an id at or past this are skipped by the object pass.
pub const MAX_OBJECTS: usize = 256;

pub type SlotPool = FrameDescriptorPool<VkDescriptorPool>;

pub struct FrameResources {
    global_ubo: Buffer,
    object_ubo: Buffer,
    pool: SlotPool,
}

impl FrameResources {
    fn new(ctx: &Arc<DeviceContext>, slot: usize) -> Result<Self> {
        let min_align = ctx.properties().limits.min_uniform_buffer_offset_alignment;
        let mut global_ubo = Buffer::new(
            ctx.clone(),
            size_of::<GlobalUbo>() as vk::DeviceSize,
            1,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            min_align,
        )?;
        global_ubo.map()?;
        let mut object_ubo = Buffer::new(
            ctx.clone(),
            size_of::<ObjectUniform>() as vk::DeviceSize,
            MAX_OBJECTS as u32,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            min_align,
        )?;
        object_ubo.map()?;

        let sizes = PoolSizes::default();
        let backend = VkDescriptorPool::new(ctx.clone(), slot, sizes)?;
        Ok(Self {
            global_ubo,
            object_ubo,
            pool: FrameDescriptorPool::new(backend, slot, sizes.max_sets as usize),
        })
    }

    /// Starts the slot's frame: resets the pool (invalidating last use's
    /// sets), uploads `ubo` and returns a fresh global set bound to it.
    pub fn begin(&mut self, ubo: &GlobalUbo, global_layout: &DescriptorSetLayout) -> Result<FrameSet<vk::DescriptorSet>> {
        self.pool.reset()?;
        self.global_ubo.write_to_index(ubo, 0)?;
        self.global_ubo.flush_index(0)?;

        let set = self.pool.allocate(global_layout.raw())?;
        DescriptorWriter::new(global_layout)
            .write_buffer(0, self.global_ubo.descriptor_info_for_index(0))
            .write(self.pool.resolve(&set)?)?;
        Ok(set)
    }

    pub fn pool(&self) -> &SlotPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut SlotPool {
        &mut self.pool
    }

    pub fn object_ubo(&self) -> &Buffer {
        &self.object_ubo
    }

    pub fn object_ubo_mut(&mut self) -> &mut Buffer {
        &mut self.object_ubo
    }
}

/// One [`FrameResources`] per slot plus the global set layout they share.
pub struct FrameResourceSet {
    // slots hold sets of this layout, so they go first
    slots: SlotRing<FrameResources>,
    global_layout: DescriptorSetLayout,
}

impl FrameResourceSet {
    pub fn new(ctx: &Arc<DeviceContext>) -> Result<Self> {
        let global_layout = DescriptorSetLayout::builder()
            .add_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::ALL_GRAPHICS,
            )
            .build(ctx.clone())?;
        let slots = SlotRing::try_new(|slot| FrameResources::new(ctx, slot))?;
        debug!(slots = slots.len(), max_objects = MAX_OBJECTS, "frame resources ready");
        Ok(Self {
            slots,
            global_layout,
        })
    }

    pub fn global_layout(&self) -> &DescriptorSetLayout {
        &self.global_layout
    }

    /// The slot's resources alongside the shared layout, for
    /// [`FrameResources::begin`].
    pub fn slot_mut(&mut self, slot: usize) -> (&mut FrameResources, &DescriptorSetLayout) {
        (&mut self.slots[slot], &self.global_layout)
    }

    pub fn slot(&self, slot: usize) -> &FrameResources {
        &self.slots[slot]
    }
}
