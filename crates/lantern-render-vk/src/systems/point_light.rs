// SPDX-License-Identifier: CEPL-1.0
use std::mem::size_of;
use std::sync::Arc;

use anyhow::Result;
use ash::vk;
use lantern_render::light::{far_to_near, update_point_lights};
use lantern_render::{GlobalUbo, PointLightPush, Scene};

use crate::descriptors::DescriptorSetLayout;
use crate::device::DeviceContext;
use crate::frame_resources::FrameResources;
use crate::pipeline::{Pipeline, PipelineConfig, PipelineLayout};
use crate::shaders;
use crate::VkFrameContext;

const PUSH_STAGES: vk::ShaderStageFlags =
    vk::ShaderStageFlags::from_raw(vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw());

/// Camera-facing quads for each point light, blended back to front.
pub struct PointLightPass {
    ctx: Arc<DeviceContext>,
    pipeline: Pipeline,
    layout: PipelineLayout,
    angular_speed: f32,
}

impl PointLightPass {
    pub fn new(
        ctx: &Arc<DeviceContext>,
        render_pass: vk::RenderPass,
        global_layout: &DescriptorSetLayout,
        angular_speed: f32,
    ) -> Result<Self> {
        let push = vk::PushConstantRange {
            stage_flags: PUSH_STAGES,
            offset: 0,
            size: size_of::<PointLightPush>() as u32,
        };
        let layout = PipelineLayout::new(ctx.clone(), &[global_layout.raw()], push)?;

        // quad corners come from gl_VertexIndex
        let mut config = PipelineConfig {
            render_pass,
            layout: layout.raw(),
            ..Default::default()
        };
        config.enable_alpha_blending();
        let pipeline = Pipeline::new(
            ctx.clone(),
            shaders::POINT_LIGHT_VERT,
            shaders::POINT_LIGHT_FRAG,
            &config,
        )?;

        Ok(Self {
            ctx: ctx.clone(),
            pipeline,
            layout,
            angular_speed,
        })
    }

    /// Advances the light orbit by `frame_time` and fills the light array of
    /// `ubo`. Returns how many lights made it into the array.
    pub fn update(&self, frame_time: f32, scene: &mut Scene, ubo: &mut GlobalUbo) -> usize {
        update_point_lights(scene, ubo, frame_time * self.angular_speed)
    }

    pub fn render(&self, frame: &VkFrameContext<'_>, scene: &Scene, resources: &FrameResources) -> Result<usize> {
        let cmd = frame.command_buffer;
        let d = self.ctx.device();
        let global = resources.pool().resolve(&frame.global_descriptor_set)?;
        let order = far_to_near(scene, frame.camera.position());
        if order.is_empty() {
            return Ok(0);
        }

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

        let mut drawn = 0;
        for id in order {
            let Some(light) = scene.get(id) else {
                continue;
            };
            let intensity = light.point_light.map_or(0.0, |p| p.intensity);
            let push = PointLightPush {
                position: light.transform.translation.extend(1.0),
                color: light.color.extend(intensity),
                radius: light.transform.scale.x,
                _pad: [0.0; 3],
            };
            unsafe {
                d.cmd_push_constants(cmd, self.layout.raw(), PUSH_STAGES, 0, bytemuck::bytes_of(&push));
                d.cmd_draw(cmd, 6, 1, 0, 0);
            }
            drawn += 1;
        }
        Ok(drawn)
    }

    pub fn angular_speed(&self) -> f32 {
        self.angular_speed
    }
}
