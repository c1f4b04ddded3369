// SPDX-License-Identifier: CEPL-1.0
use std::mem::{offset_of, size_of};
use std::sync::Arc;

use anyhow::{bail, Result};
use ash::vk;
use bytemuck::{Pod, Zeroable};

use crate::buffer::{upload_via_staging, Buffer};
use crate::device::DeviceContext;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Vertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    }

    // locations 0..=3 match object.vert
    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        let attr = |location, format, offset: usize| vk::VertexInputAttributeDescription {
            location,
            binding: 0,
            format,
            offset: offset as u32,
        };
        vec![
            attr(0, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, position)),
            attr(1, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, color)),
            attr(2, vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, normal)),
            attr(3, vk::Format::R32G32_SFLOAT, offset_of!(Vertex, uv)),
        ]
    }
}

/// Device-local vertex buffer with an optional index buffer.
pub struct Mesh {
    ctx: Arc<DeviceContext>,
    vertices: Buffer,
    vertex_count: u32,
    indices: Option<Buffer>,
    index_count: u32,
}

impl Mesh {
    pub fn new(ctx: Arc<DeviceContext>, vertices: &[Vertex], indices: &[u32]) -> Result<Self> {
        if vertices.len() < 3 {
            bail!("mesh needs at least 3 vertices, got {}", vertices.len());
        }
        let vertex_buffer = upload_via_staging(&ctx, vertices, vk::BufferUsageFlags::VERTEX_BUFFER)?;
        let index_buffer = if indices.is_empty() {
            None
        } else {
            Some(upload_via_staging(&ctx, indices, vk::BufferUsageFlags::INDEX_BUFFER)?)
        };
        Ok(Self {
            ctx,
            vertices: vertex_buffer,
            vertex_count: vertices.len() as u32,
            indices: index_buffer,
            index_count: indices.len() as u32,
        })
    }

    pub fn bind(&self, cmd: vk::CommandBuffer) {
        let d = self.ctx.device();
        unsafe {
            d.cmd_bind_vertex_buffers(cmd, 0, &[self.vertices.buffer()], &[0]);
            if let Some(ib) = &self.indices {
                d.cmd_bind_index_buffer(cmd, ib.buffer(), 0, vk::IndexType::UINT32);
            }
        }
    }

    pub fn draw(&self, cmd: vk::CommandBuffer) {
        let d = self.ctx.device();
        unsafe {
            if self.indices.is_some() {
                d.cmd_draw_indexed(cmd, self.index_count, 1, 0, 0, 0);
            } else {
                d.cmd_draw(cmd, self.vertex_count, 1, 0, 0);
            }
        }
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_are_tightly_packed() {
        let attrs = Vertex::attribute_descriptions();
        let offsets: Vec<u32> = attrs.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 36]);
        assert_eq!(Vertex::binding_descriptions()[0].stride, 44);
    }
}
