// SPDX-License-Identifier: CEPL-1.0
use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};

/// Translation, scale and Tait-Bryan rotation (radians, applied Y then X then Z).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub scale: Vec3,
    pub rotation: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Vec3::ZERO,
        }
    }
}

impl Transform {
    pub fn at(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    fn orientation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.rotation.y, self.rotation.x, self.rotation.z)
    }

    /// `T * Ry * Rx * Rz * S`
    pub fn mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.orientation(), self.translation)
    }

    /// Inverse-transpose of the upper 3x3, i.e. `R * S^-1`.
    pub fn normal_matrix(&self) -> Mat4 {
        let r = Mat3::from_quat(self.orientation());
        Mat4::from_mat3(r * Mat3::from_diagonal(self.scale.recip()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn identity_transform_is_identity_matrix() {
        assert_eq!(Transform::default().mat4(), Mat4::IDENTITY);
        assert_eq!(Transform::default().normal_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn yaw_then_translate() {
        let t = Transform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Vec3::new(0.0, FRAC_PI_2, 0.0),
            ..Transform::default()
        };
        // +Z rotated a quarter turn about Y lands on +X.
        let p = t.mat4().transform_point3(Vec3::Z);
        assert!(p.abs_diff_eq(Vec3::new(2.0, 2.0, 3.0), 1e-5));
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let t = Transform {
            scale: Vec3::new(2.0, 4.0, 1.0),
            ..Transform::default()
        };
        let expected = t.mat4().inverse().transpose();
        assert!(t
            .normal_matrix()
            .abs_diff_eq(Mat4::from_mat3(Mat3::from_mat4(expected)), 1e-5));
    }
}
