// SPDX-License-Identifier: CEPL-1.0
//! GPU-visible layouts. All of these mirror std140 blocks or push-constant
//! ranges in the shaders, so field order and padding are fixed.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};
use lantern_math::Camera;

/// Capacity of the light array in the global uniform block.
pub const MAX_LIGHTS: usize = 10;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PointLightUniform {
    pub position: Vec4,
    /// rgb color, w = intensity
    pub color: Vec4,
}

/// Per-frame scene constants (set 0, binding 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GlobalUbo {
    pub projection: Mat4,
    pub view: Mat4,
    pub inverse_view: Mat4,
    /// rgb color, w = intensity
    pub ambient: Vec4,
    point_lights: [PointLightUniform; MAX_LIGHTS],
    num_lights: i32,
    _pad: [i32; 3],
}

impl Default for GlobalUbo {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            inverse_view: Mat4::IDENTITY,
            ambient: Vec4::new(1.0, 1.0, 1.0, 0.02),
            point_lights: [PointLightUniform::default(); MAX_LIGHTS],
            num_lights: 0,
            _pad: [0; 3],
        }
    }
}

impl GlobalUbo {
    pub fn new(camera: &Camera, ambient: Vec4) -> Self {
        Self {
            projection: camera.projection(),
            view: camera.view(),
            inverse_view: camera.inverse_view(),
            ambient,
            ..Self::default()
        }
    }

    /// Appends a light. Returns `false`, leaving the array untouched, once
    /// the array is full.
    pub fn push_light(&mut self, position: Vec3, color: Vec3, intensity: f32) -> bool {
        let n = self.num_lights();
        if n >= MAX_LIGHTS {
            return false;
        }
        self.point_lights[n] = PointLightUniform {
            position: position.extend(1.0),
            color: color.extend(intensity),
        };
        self.num_lights += 1;
        true
    }

    pub fn clear_lights(&mut self) {
        self.point_lights = [PointLightUniform::default(); MAX_LIGHTS];
        self.num_lights = 0;
    }

    pub fn num_lights(&self) -> usize {
        self.num_lights as usize
    }

    pub fn lights(&self) -> &[PointLightUniform] {
        &self.point_lights[..self.num_lights()]
    }
}

/// Per-object slice of the object uniform buffer (set 1, binding 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: Mat4,
    pub normal: Mat4,
}

/// Push constants of the object pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ObjectPush {
    pub tint: Vec4,
    pub textured: u32,
    pub _pad: [u32; 3],
}

impl ObjectPush {
    pub fn new(tint: Vec3, textured: bool) -> Self {
        Self {
            tint: tint.extend(1.0),
            textured: textured as u32,
            _pad: [0; 3],
        }
    }
}

/// Push constants of the point-light billboard pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PointLightPush {
    pub position: Vec4,
    pub color: Vec4,
    pub radius: f32,
    pub _pad: [f32; 3],
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn layouts_match_shader_blocks() {
        assert_eq!(size_of::<PointLightUniform>(), 32);
        assert_eq!(size_of::<GlobalUbo>(), 3 * 64 + 16 + MAX_LIGHTS * 32 + 16);
        assert_eq!(size_of::<ObjectUniform>(), 128);
        assert_eq!(size_of::<ObjectPush>(), 32);
        assert_eq!(size_of::<PointLightPush>(), 48);
    }

    #[test]
    fn light_array_stops_at_capacity() {
        let mut ubo = GlobalUbo::default();
        for i in 0..MAX_LIGHTS {
            assert!(ubo.push_light(Vec3::splat(i as f32), Vec3::ONE, 1.0));
        }
        assert!(!ubo.push_light(Vec3::ZERO, Vec3::ONE, 1.0));
        assert_eq!(ubo.num_lights(), MAX_LIGHTS);
        assert_eq!(ubo.lights()[9].position, Vec4::new(9.0, 9.0, 9.0, 1.0));

        ubo.clear_lights();
        assert!(ubo.lights().is_empty());
    }

    #[test]
    fn intensity_is_packed_into_color_w() {
        let mut ubo = GlobalUbo::default();
        ubo.push_light(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.5, 0.25, 1.0), 7.0);
        assert_eq!(ubo.lights()[0].color, Vec4::new(0.5, 0.25, 1.0, 7.0));
    }

    #[test]
    fn camera_matrices_are_copied() {
        let mut camera = Camera::default();
        camera.set_view_yxz(Vec3::new(0.0, -1.0, -4.0), Vec3::ZERO);
        let ubo = GlobalUbo::new(&camera, Vec4::ONE);
        assert_eq!(ubo.view, camera.view());
        assert_eq!(ubo.inverse_view, camera.inverse_view());
        assert_eq!(ubo.num_lights(), 0);
    }
}
