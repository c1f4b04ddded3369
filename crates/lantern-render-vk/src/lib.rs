// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Vulkan backend: device context, swapchain, per-slot frame resources and
//! the object and point-light passes.

pub mod buffer;
pub mod descriptors;
pub mod device;
pub mod frame_resources;
pub mod mesh;
pub mod pipeline;
mod shaders;
pub mod swapchain;
pub mod systems;
pub mod texture;

pub use ash::vk;
pub use buffer::Buffer;
pub use descriptors::{DescriptorSetLayout, DescriptorWriter, VkDescriptorPool};
pub use device::{DeviceContext, DeviceOptions, PresentPreference, VsyncMode};
pub use frame_resources::{FrameResourceSet, FrameResources, MAX_OBJECTS};
pub use mesh::{Mesh, Vertex};
pub use swapchain::{SurfaceFormat, VkSwapchain};
pub use systems::{ObjectPass, PointLightPass};
pub use texture::Texture;

use lantern_render::{AssetTable, FrameContext, FrameSet, Renderer};

pub type VkRenderer = Renderer<DeviceContext>;
pub type VkAssets = AssetTable<Mesh, Texture>;
pub type VkFrameContext<'a> = FrameContext<'a, vk::CommandBuffer, FrameSet<vk::DescriptorSet>>;
