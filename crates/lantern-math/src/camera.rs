// SPDX-License-Identifier: CEPL-1.0
use glam::{Mat4, Vec3, Vec4};

/// Vulkan-style camera: left-handed, depth in [0, 1], world "up" is -Y.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    projection: Mat4,
    view: Mat4,
    inverse_view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            inverse_view: Mat4::IDENTITY,
        }
    }
}

pub const DEFAULT_UP: Vec3 = Vec3::new(0.0, -1.0, 0.0);

impl Camera {
    pub fn set_orthographic(&mut self, left: f32, right: f32, top: f32, bottom: f32, near: f32, far: f32) {
        self.projection = Mat4::orthographic_lh(left, right, bottom, top, near, far);
    }

    pub fn set_perspective(&mut self, fovy: f32, aspect: f32, near: f32, far: f32) {
        debug_assert!(aspect > 0.0);
        self.projection = Mat4::perspective_lh(fovy, aspect, near, far);
    }

    pub fn set_view_direction(&mut self, position: Vec3, direction: Vec3, up: Vec3) {
        let w = direction.normalize();
        let u = w.cross(up).normalize();
        let v = w.cross(u);
        self.set_basis(position, u, v, w);
    }

    pub fn set_view_target(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.set_view_direction(position, target - position, up);
    }

    /// View from a position and YXZ Euler rotation, matching `Transform`.
    pub fn set_view_yxz(&mut self, position: Vec3, rotation: Vec3) {
        let (s3, c3) = rotation.z.sin_cos();
        let (s2, c2) = rotation.x.sin_cos();
        let (s1, c1) = rotation.y.sin_cos();
        let u = Vec3::new(c1 * c3 + s1 * s2 * s3, c2 * s3, c1 * s2 * s3 - c3 * s1);
        let v = Vec3::new(c3 * s1 * s2 - c1 * s3, c2 * c3, c1 * c3 * s2 + s1 * s3);
        let w = Vec3::new(c2 * s1, -s2, c1 * c2);
        self.set_basis(position, u, v, w);
    }

    fn set_basis(&mut self, position: Vec3, u: Vec3, v: Vec3, w: Vec3) {
        self.view = Mat4::from_cols(
            Vec4::new(u.x, v.x, w.x, 0.0),
            Vec4::new(u.y, v.y, w.y, 0.0),
            Vec4::new(u.z, v.z, w.z, 0.0),
            Vec4::new(-u.dot(position), -v.dot(position), -w.dot(position), 1.0),
        );
        self.inverse_view = Mat4::from_cols(
            u.extend(0.0),
            v.extend(0.0),
            w.extend(0.0),
            position.extend(1.0),
        );
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn inverse_view(&self) -> Mat4 {
        self.inverse_view
    }

    pub fn position(&self) -> Vec3 {
        self.inverse_view.w_axis.truncate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_view_inverts_view() {
        let mut cam = Camera::default();
        cam.set_view_yxz(Vec3::new(1.0, -2.0, -5.0), Vec3::new(0.3, 1.1, 0.0));
        let product = cam.view() * cam.inverse_view();
        assert!(product.abs_diff_eq(Mat4::IDENTITY, 1e-5));
        assert!(cam.position().abs_diff_eq(Vec3::new(1.0, -2.0, -5.0), 1e-6));
    }

    #[test]
    fn target_ends_up_on_the_view_axis() {
        let mut cam = Camera::default();
        cam.set_view_target(Vec3::new(0.0, 0.0, -3.0), Vec3::ZERO, DEFAULT_UP);
        let p = cam.view().transform_point3(Vec3::ZERO);
        assert!(p.abs_diff_eq(Vec3::new(0.0, 0.0, 3.0), 1e-5));
    }

    #[test]
    fn perspective_maps_near_plane_to_zero_depth() {
        let mut cam = Camera::default();
        cam.set_perspective(50f32.to_radians(), 4.0 / 3.0, 0.1, 100.0);
        let clip = cam.projection() * Vec4::new(0.0, 0.0, 0.1, 1.0);
        assert!((clip.z / clip.w).abs() < 1e-5);
    }
}
