// SPDX-License-Identifier: CEPL-1.0
use std::ffi::c_void;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ash::vk;

use crate::device::DeviceContext;

/// Rounds `instance_size` up to the next multiple of `min_offset_alignment`
/// (a power of two, or zero for no constraint).
pub fn alignment(instance_size: vk::DeviceSize, min_offset_alignment: vk::DeviceSize) -> vk::DeviceSize {
    if min_offset_alignment > 0 {
        (instance_size + min_offset_alignment - 1) & !(min_offset_alignment - 1)
    } else {
        instance_size
    }
}

/// Widens `[offset, offset + size)` to `atom` boundaries for a flush of
/// non-coherent memory. A range that would run past `buffer_size` becomes
/// `WHOLE_SIZE` from the rounded-down offset.
pub fn flush_range(
    offset: vk::DeviceSize,
    size: vk::DeviceSize,
    atom: vk::DeviceSize,
    buffer_size: vk::DeviceSize,
) -> (vk::DeviceSize, vk::DeviceSize) {
    let atom = atom.max(1);
    let start = offset / atom * atom;
    if size == vk::WHOLE_SIZE {
        return (start, vk::WHOLE_SIZE);
    }
    let end = (offset + size).div_ceil(atom) * atom;
    if end > buffer_size {
        (start, vk::WHOLE_SIZE)
    } else {
        (start, end - start)
    }
}

/// A buffer holding `instance_count` equally sized, aligned instances.
pub struct Buffer {
    ctx: Arc<DeviceContext>,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    mapped: *mut c_void,

    buffer_size: vk::DeviceSize,
    instance_count: u32,
    instance_size: vk::DeviceSize,
    alignment_size: vk::DeviceSize,
    memory_flags: vk::MemoryPropertyFlags,
    atom_size: vk::DeviceSize,
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.unmap();
        unsafe {
            self.ctx.device().destroy_buffer(self.buffer, None);
            self.ctx.device().free_memory(self.memory, None);
        }
    }
}

impl Buffer {
    pub fn new(
        ctx: Arc<DeviceContext>,
        instance_size: vk::DeviceSize,
        instance_count: u32,
        usage: vk::BufferUsageFlags,
        memory_props: vk::MemoryPropertyFlags,
        min_offset_alignment: vk::DeviceSize,
    ) -> Result<Self> {
        let alignment_size = alignment(instance_size, min_offset_alignment);
        let buffer_size = alignment_size * instance_count as vk::DeviceSize;
        let (buffer, memory, memory_flags) = ctx.allocate_buffer(buffer_size, usage, memory_props)?;
        let atom_size = ctx.properties().limits.non_coherent_atom_size;
        Ok(Self {
            ctx,
            buffer,
            memory,
            mapped: std::ptr::null_mut(),
            buffer_size,
            instance_count,
            instance_size,
            alignment_size,
            memory_flags,
            atom_size,
        })
    }

    /// Maps the whole buffer. Idempotent.
    pub fn map(&mut self) -> Result<()> {
        if !self.mapped.is_null() {
            return Ok(());
        }
        self.mapped = unsafe {
            self.ctx.device().map_memory(
                self.memory,
                0,
                vk::WHOLE_SIZE,
                vk::MemoryMapFlags::empty(),
            )
        }
        .context("map_memory")?;
        Ok(())
    }

    pub fn unmap(&mut self) {
        if !self.mapped.is_null() {
            unsafe { self.ctx.device().unmap_memory(self.memory) };
            self.mapped = std::ptr::null_mut();
        }
    }

    /// Copies `bytes` into the mapped range at `offset`.
    pub fn write_to_buffer(&mut self, bytes: &[u8], offset: vk::DeviceSize) -> Result<()> {
        if self.mapped.is_null() {
            bail!("write to unmapped buffer");
        }
        let end = offset + bytes.len() as vk::DeviceSize;
        if end > self.buffer_size {
            bail!("write of {} bytes at {offset} overruns buffer of {}", bytes.len(), self.buffer_size);
        }
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.mapped.cast::<u8>().add(offset as usize),
                bytes.len(),
            );
        }
        Ok(())
    }

    pub fn write_to_index<T: bytemuck::Pod>(&mut self, value: &T, index: usize) -> Result<()> {
        self.check_index(index)?;
        self.write_to_buffer(bytemuck::bytes_of(value), index as vk::DeviceSize * self.alignment_size)
    }

    /// No-op for host-coherent memory. The range is widened to
    /// `nonCoherentAtomSize`.
    pub fn flush(&self, size: vk::DeviceSize, offset: vk::DeviceSize) -> Result<()> {
        if self.memory_flags.contains(vk::MemoryPropertyFlags::HOST_COHERENT) {
            return Ok(());
        }
        let (offset, size) = flush_range(offset, size, self.atom_size, self.buffer_size);
        let range = vk::MappedMemoryRange {
            s_type: vk::StructureType::MAPPED_MEMORY_RANGE,
            memory: self.memory,
            offset,
            size,
            ..Default::default()
        };
        unsafe {
            self.ctx
                .device()
                .flush_mapped_memory_ranges(std::slice::from_ref(&range))
        }
        .context("flush_mapped_memory_ranges")?;
        Ok(())
    }

    pub fn flush_index(&self, index: usize) -> Result<()> {
        self.check_index(index)?;
        self.flush(self.alignment_size, index as vk::DeviceSize * self.alignment_size)
    }

    pub fn descriptor_info(&self, size: vk::DeviceSize, offset: vk::DeviceSize) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer,
            offset,
            range: size,
        }
    }

    pub fn descriptor_info_for_index(&self, index: usize) -> vk::DescriptorBufferInfo {
        self.descriptor_info(self.instance_size, index as vk::DeviceSize * self.alignment_size)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.instance_count as usize {
            bail!("instance {index} out of range ({} instances)", self.instance_count);
        }
        Ok(())
    }

    pub fn buffer(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.buffer_size
    }

    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }

    pub fn instance_size(&self) -> vk::DeviceSize {
        self.instance_size
    }

    pub fn alignment_size(&self) -> vk::DeviceSize {
        self.alignment_size
    }
}

/// Uploads `data` into a fresh device-local buffer through a staging copy.
pub fn upload_via_staging<T: bytemuck::Pod>(
    ctx: &Arc<DeviceContext>,
    data: &[T],
    usage: vk::BufferUsageFlags,
) -> Result<Buffer> {
    let instance_size = std::mem::size_of::<T>() as vk::DeviceSize;
    let count = data.len() as u32;

    let mut staging = Buffer::new(
        ctx.clone(),
        instance_size,
        count,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        1,
    )?;
    staging.map()?;
    staging.write_to_buffer(bytemuck::cast_slice(data), 0)?;

    let target = Buffer::new(
        ctx.clone(),
        instance_size,
        count,
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        1,
    )?;
    ctx.copy_buffer(staging.buffer(), target.buffer(), staging.size())?;
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::{alignment, flush_range};
    use ash::vk;

    #[test]
    fn alignment_rounds_up_to_power_of_two() {
        assert_eq!(alignment(544, 256), 768);
        assert_eq!(alignment(128, 64), 128);
        assert_eq!(alignment(44, 1), 44);
        assert_eq!(alignment(44, 0), 44);
    }

    #[test]
    fn flush_range_snaps_to_atom_size() {
        // 768-byte instances, 256-byte atoms: already aligned
        assert_eq!(flush_range(768, 768, 256, 4 * 768), (768, 768));
        // 544-byte instance at 544 with 128-byte atoms
        assert_eq!(flush_range(544, 544, 128, 4 * 544), (512, 640));
        assert_eq!(flush_range(10, 4, 0, 64), (10, 4));
    }

    #[test]
    fn flush_range_past_the_end_flushes_to_whole_size() {
        // last 544-byte instance of a 1088-byte buffer, 256-byte atoms
        assert_eq!(flush_range(544, 544, 256, 1088), (512, vk::WHOLE_SIZE));
        assert_eq!(flush_range(300, vk::WHOLE_SIZE, 256, 1088), (256, vk::WHOLE_SIZE));
    }
}
