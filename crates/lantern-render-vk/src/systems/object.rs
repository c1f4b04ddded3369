// SPDX-License-Identifier: CEPL-1.0
use std::mem::size_of;
use std::sync::Arc;

use anyhow::Result;
use ash::vk;
use lantern_render::{ObjectPush, ObjectUniform, Scene};
use tracing::warn;

use crate::descriptors::{DescriptorSetLayout, DescriptorWriter};
use crate::device::DeviceContext;
use crate::frame_resources::{FrameResources, MAX_OBJECTS};
use crate::mesh::Vertex;
use crate::pipeline::{Pipeline, PipelineConfig, PipelineLayout};
use crate::shaders;
use crate::texture::Texture;
use crate::{VkAssets, VkFrameContext};

const PUSH_STAGES: vk::ShaderStageFlags =
    vk::ShaderStageFlags::from_raw(vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw());

/// Lit, optionally textured meshes. Set 0 is the frame's global set, set 1
/// a per-object set of {object uniform slice, texture}.
pub struct ObjectPass {
    ctx: Arc<DeviceContext>,
    pipeline: Pipeline,
    layout: PipelineLayout,
    object_layout: DescriptorSetLayout,
    fallback: Texture,
    overflow_warned: bool,
}

impl ObjectPass {
    pub fn new(
        ctx: &Arc<DeviceContext>,
        render_pass: vk::RenderPass,
        global_layout: &DescriptorSetLayout,
    ) -> Result<Self> {
        let object_layout = DescriptorSetLayout::builder()
            .add_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            )
            .add_binding(
                1,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
            )
            .build(ctx.clone())?;

        let push = vk::PushConstantRange {
            stage_flags: PUSH_STAGES,
            offset: 0,
            size: size_of::<ObjectPush>() as u32,
        };
        let layout = PipelineLayout::new(
            ctx.clone(),
            &[global_layout.raw(), object_layout.raw()],
            push,
        )?;

        let config = PipelineConfig {
            binding_descriptions: Vertex::binding_descriptions(),
            attribute_descriptions: Vertex::attribute_descriptions(),
            render_pass,
            layout: layout.raw(),
            ..Default::default()
        };
        let pipeline = Pipeline::new(ctx.clone(), shaders::OBJECT_VERT, shaders::OBJECT_FRAG, &config)?;
        let fallback = Texture::solid(ctx.clone(), [255, 255, 255, 255])?;

        Ok(Self {
            ctx: ctx.clone(),
            pipeline,
            layout,
            object_layout,
            fallback,
            overflow_warned: false,
        })
    }

    /// Records one draw per drawable that has a mesh. Returns the draw count.
    pub fn render(
        &mut self,
        frame: &VkFrameContext<'_>,
        scene: &Scene,
        assets: &VkAssets,
        resources: &mut FrameResources,
    ) -> Result<usize> {
        let cmd = frame.command_buffer;
        let d = self.ctx.device();
        let global = resources.pool().resolve(&frame.global_descriptor_set)?;

        self.pipeline.bind(cmd);
        unsafe {
            d.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.layout.raw(),
                0,
                &[global],
                &[],
            )
        };

        let mut last_push: Option<ObjectPush> = None;
        let mut drawn = 0;
        for drawable in scene.iter() {
            let Some(handle) = drawable.mesh else {
                continue;
            };
            let Some(mesh) = assets.mesh(handle) else {
                warn!(id = ?drawable.id(), "drawable references an unknown mesh, skipped");
                continue;
            };
            let index = drawable.id().index();
            if index >= MAX_OBJECTS {
                if !self.overflow_warned {
                    warn!(id = index, capacity = MAX_OBJECTS, "object uniform buffer full, drawable skipped");
                    self.overflow_warned = true;
                }
                continue;
            }

            let uniform = ObjectUniform {
                model: drawable.transform.mat4(),
                normal: drawable.transform.normal_matrix(),
            };
            let objects = resources.object_ubo_mut();
            objects.write_to_index(&uniform, index)?;
            objects.flush_index(index)?;
            let buffer_info = objects.descriptor_info_for_index(index);

            let texture = drawable.texture.and_then(|h| assets.texture(h));
            let image_info = match texture {
                Some(t) => t.descriptor_info(),
                None => self.fallback.descriptor_info(),
            };

            let set = resources.pool_mut().allocate(self.object_layout.raw())?;
            let set = resources.pool().resolve(&set)?;
            DescriptorWriter::new(&self.object_layout)
                .write_buffer(0, buffer_info)
                .write_image(1, image_info)
                .write(set)?;
            unsafe {
                d.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    self.layout.raw(),
                    1,
                    &[set],
                    &[],
                )
            };

            let push = ObjectPush::new(drawable.color, texture.is_some());
            if last_push != Some(push) {
                unsafe {
                    d.cmd_push_constants(cmd, self.layout.raw(), PUSH_STAGES, 0, bytemuck::bytes_of(&push))
                };
                last_push = Some(push);
            }

            mesh.bind(cmd);
            mesh.draw(cmd);
            drawn += 1;
        }
        Ok(drawn)
    }
}
