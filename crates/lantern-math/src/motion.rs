// SPDX-License-Identifier: CEPL-1.0
use bitflags::bitflags;
use glam::Vec3;
use std::f32::consts::TAU;

use crate::Transform;

bitflags! {
    /// Held movement keys, as reported by the platform layer.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct MoveIntent: u16 {
        const MOVE_LEFT     = 1 << 0;
        const MOVE_RIGHT    = 1 << 1;
        const MOVE_FORWARD  = 1 << 2;
        const MOVE_BACKWARD = 1 << 3;
        const MOVE_UP       = 1 << 4;
        const MOVE_DOWN     = 1 << 5;
        const LOOK_LEFT     = 1 << 6;
        const LOOK_RIGHT    = 1 << 7;
        const LOOK_UP       = 1 << 8;
        const LOOK_DOWN     = 1 << 9;
    }
}

const PITCH_LIMIT: f32 = 1.5;

/// Keyboard free-fly controller: yaw/pitch look, planar move plus up/down.
#[derive(Clone, Copy, Debug)]
pub struct FreeFly {
    pub move_speed: f32,
    pub look_speed: f32,
}

impl Default for FreeFly {
    fn default() -> Self {
        Self {
            move_speed: 3.0,
            look_speed: 1.5,
        }
    }
}

impl FreeFly {
    pub fn apply(&self, intent: MoveIntent, dt: f32, transform: &mut Transform) {
        let mut rotate = Vec3::ZERO;
        if intent.contains(MoveIntent::LOOK_RIGHT) {
            rotate.y += 1.0;
        }
        if intent.contains(MoveIntent::LOOK_LEFT) {
            rotate.y -= 1.0;
        }
        if intent.contains(MoveIntent::LOOK_UP) {
            rotate.x += 1.0;
        }
        if intent.contains(MoveIntent::LOOK_DOWN) {
            rotate.x -= 1.0;
        }
        if rotate.length_squared() > f32::EPSILON {
            transform.rotation += self.look_speed * dt * rotate.normalize();
        }

        transform.rotation.x = transform.rotation.x.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        transform.rotation.y = transform.rotation.y.rem_euclid(TAU);

        let yaw = transform.rotation.y;
        let forward = Vec3::new(yaw.sin(), 0.0, yaw.cos());
        let right = Vec3::new(forward.z, 0.0, -forward.x);
        let up = Vec3::new(0.0, -1.0, 0.0);

        let mut dir = Vec3::ZERO;
        if intent.contains(MoveIntent::MOVE_FORWARD) {
            dir += forward;
        }
        if intent.contains(MoveIntent::MOVE_BACKWARD) {
            dir -= forward;
        }
        if intent.contains(MoveIntent::MOVE_RIGHT) {
            dir += right;
        }
        if intent.contains(MoveIntent::MOVE_LEFT) {
            dir -= right;
        }
        if intent.contains(MoveIntent::MOVE_UP) {
            dir += up;
        }
        if intent.contains(MoveIntent::MOVE_DOWN) {
            dir -= up;
        }
        if dir.length_squared() > f32::EPSILON {
            transform.translation += self.move_speed * dt * dir.normalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_at_zero_yaw_moves_along_z() {
        let ctl = FreeFly {
            move_speed: 2.0,
            look_speed: 1.0,
        };
        let mut t = Transform::default();
        ctl.apply(MoveIntent::MOVE_FORWARD, 0.5, &mut t);
        assert!(t.translation.abs_diff_eq(Vec3::new(0.0, 0.0, 1.0), 1e-6));
    }

    #[test]
    fn diagonal_move_is_normalised() {
        let ctl = FreeFly::default();
        let mut t = Transform::default();
        ctl.apply(MoveIntent::MOVE_FORWARD | MoveIntent::MOVE_RIGHT, 1.0, &mut t);
        assert!((t.translation.length() - ctl.move_speed).abs() < 1e-5);
    }

    #[test]
    fn pitch_is_clamped_and_yaw_wraps() {
        let ctl = FreeFly {
            move_speed: 0.0,
            look_speed: 10.0,
        };
        let mut t = Transform::default();
        ctl.apply(MoveIntent::LOOK_UP, 1.0, &mut t);
        assert_eq!(t.rotation.x, PITCH_LIMIT);

        t.rotation = Vec3::ZERO;
        ctl.apply(MoveIntent::LOOK_LEFT, 0.1, &mut t);
        assert!(t.rotation.y > 0.0 && t.rotation.y < TAU);
    }

    #[test]
    fn no_keys_no_motion() {
        let mut t = Transform::at(Vec3::new(1.0, 2.0, 3.0));
        FreeFly::default().apply(MoveIntent::empty(), 1.0, &mut t);
        assert_eq!(t.translation, Vec3::new(1.0, 2.0, 3.0));
    }
}
