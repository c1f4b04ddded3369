// SPDX-License-Identifier: CEPL-1.0
//! Point-light animation and draw ordering. Backend-free so the ordering and
//! truncation rules can be checked without a GPU.

use glam::{Mat4, Vec3};
use tracing::debug;

use crate::{DrawableId, GlobalUbo, Scene, MAX_LIGHTS};

/// Rotates every light about -Y by `angle` radians and writes the result
/// into the light array of `ubo`.
///
/// The rotation is applied to the stored translation, so it accumulates
/// frame over frame. Lights past the array capacity still move but are not
/// uploaded. Returns the number of lights written.
pub fn update_point_lights(scene: &mut Scene, ubo: &mut GlobalUbo, angle: f32) -> usize {
    let rotation = Mat4::from_axis_angle(Vec3::NEG_Y, angle);
    ubo.clear_lights();

    let mut dropped = 0usize;
    for drawable in scene.iter_mut() {
        let Some(light) = drawable.point_light else {
            continue;
        };
        drawable.transform.translation = rotation.transform_point3(drawable.transform.translation);
        if !ubo.push_light(drawable.transform.translation, drawable.color, light.intensity) {
            dropped += 1;
        }
    }

    if dropped > 0 {
        debug!(dropped, capacity = MAX_LIGHTS, "point lights over capacity not uploaded");
    }
    ubo.num_lights()
}

/// Light ids sorted by squared distance to `eye`, farthest first, so
/// blended billboards composite back to front. Equal distances keep id
/// order.
pub fn far_to_near(scene: &Scene, eye: Vec3) -> Vec<DrawableId> {
    let mut lights: Vec<(f32, DrawableId)> = scene
        .lights()
        .map(|d| ((eye - d.transform.translation).length_squared(), d.id()))
        .collect();
    lights.sort_by(|a, b| b.0.total_cmp(&a.0));
    lights.into_iter().map(|(_, id)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn light_at(scene: &mut Scene, position: Vec3) -> DrawableId {
        let light = scene.spawn_point_light(1.0, 0.1, Vec3::ONE);
        light.transform.translation = position;
        light.id()
    }

    #[test]
    fn draws_farthest_light_first() {
        let mut scene = Scene::new();
        let d3 = light_at(&mut scene, Vec3::new(3.0, 0.0, 0.0));
        let d1 = light_at(&mut scene, Vec3::new(0.0, 1.0, 0.0));
        let d2 = light_at(&mut scene, Vec3::new(0.0, 0.0, -2.0));
        scene.spawn(); // not a light

        assert_eq!(far_to_near(&scene, Vec3::ZERO), vec![d3, d2, d1]);
    }

    #[test]
    fn equal_distances_are_all_drawn() {
        let mut scene = Scene::new();
        let a = light_at(&mut scene, Vec3::X);
        let b = light_at(&mut scene, Vec3::NEG_X);
        assert_eq!(far_to_near(&scene, Vec3::ZERO), vec![a, b]);
    }

    #[test]
    fn twelve_lights_fill_ten_entries() {
        let mut scene = Scene::new();
        for i in 0..12 {
            light_at(&mut scene, Vec3::new(i as f32, 0.0, 1.0));
        }
        let mut ubo = GlobalUbo::default();
        let written = update_point_lights(&mut scene, &mut ubo, 0.0);
        assert_eq!(written, MAX_LIGHTS);
        assert_eq!(ubo.num_lights(), MAX_LIGHTS);
    }

    #[test]
    fn rotation_accumulates_on_stored_position() {
        let mut scene = Scene::new();
        let id = light_at(&mut scene, Vec3::new(0.0, -1.0, 1.0));
        let mut ubo = GlobalUbo::default();

        update_point_lights(&mut scene, &mut ubo, FRAC_PI_2);
        update_point_lights(&mut scene, &mut ubo, FRAC_PI_2);

        // half a turn about the Y axis in total
        let p = scene.get(id).unwrap().transform.translation;
        assert!(p.abs_diff_eq(Vec3::new(0.0, -1.0, -1.0), 1e-5));
        assert_eq!(ubo.lights()[0].position, p.extend(1.0));
    }
}
