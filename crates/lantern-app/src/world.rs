// SPDX-License-Identifier: CEPL-1.0
//! Procedural scene: two cubes on a checkered floor with a ring of lights.
//! Geometry is built in code; nothing is read from disk.

use std::f32::consts::TAU;
use std::sync::Arc;

use anyhow::Result;
use glam::{Mat3, Vec2, Vec3};
use lantern_math::Transform;
use lantern_render::Scene;
use lantern_render_vk::{DeviceContext, Mesh, Texture, VkAssets, Vertex};
use tracing::info;

use crate::config::SceneCfg;

const LIGHT_COLORS: [Vec3; 6] = [
    Vec3::new(1.0, 0.1, 0.1),
    Vec3::new(0.1, 0.1, 1.0),
    Vec3::new(0.1, 1.0, 0.1),
    Vec3::new(1.0, 1.0, 0.1),
    Vec3::new(0.1, 1.0, 1.0),
    Vec3::new(1.0, 1.0, 1.0),
];

const CHECKER_LIGHT: [u8; 4] = [200, 200, 200, 255];
const CHECKER_DARK: [u8; 4] = [60, 60, 70, 255];

// y grows downward, so "up" is -Y
const FLOOR_Y: f32 = 0.5;
const LIGHT_Y: f32 = -0.8;

fn vertex(position: Vec3, color: Vec3, normal: Vec3, uv: Vec2) -> Vertex {
    Vertex {
        position: position.to_array(),
        color: color.to_array(),
        normal: normal.to_array(),
        uv: uv.to_array(),
    }
}

/// Unit cube centred on the origin, 4 vertices per face so normals stay flat.
pub fn cube() -> (Vec<Vertex>, Vec<u32>) {
    // (outward normal, u axis, v axis, face color)
    let faces = [
        (Vec3::NEG_X, Vec3::Z, Vec3::Y, Vec3::new(0.9, 0.9, 0.9)),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y, Vec3::new(0.8, 0.8, 0.1)),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z, Vec3::new(0.9, 0.6, 0.1)),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z, Vec3::new(0.8, 0.1, 0.1)),
        (Vec3::Z, Vec3::X, Vec3::NEG_Y, Vec3::new(0.1, 0.1, 0.8)),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::NEG_Y, Vec3::new(0.1, 0.8, 0.1)),
    ];
    let corners = [
        Vec2::new(-0.5, -0.5),
        Vec2::new(0.5, -0.5),
        Vec2::new(0.5, 0.5),
        Vec2::new(-0.5, 0.5),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v, color) in faces {
        let base = vertices.len() as u32;
        for c in corners {
            let position = normal * 0.5 + u * c.x + v * c.y;
            vertices.push(vertex(position, color, normal, c + Vec2::splat(0.5)));
        }
        indices.extend([0, 1, 2, 0, 2, 3].map(|i| base + i));
    }
    (vertices, indices)
}

/// Square in the XZ plane facing -Y, `tiles` texture repeats per side.
pub fn floor(half_extent: f32, tiles: f32) -> (Vec<Vertex>, Vec<u32>) {
    let color = Vec3::ONE;
    let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
    let vertices = corners
        .map(|(x, z)| {
            let uv = Vec2::new(x + 1.0, z + 1.0) * 0.5 * tiles;
            vertex(Vec3::new(x, 0.0, z) * half_extent, color, Vec3::NEG_Y, uv)
        })
        .to_vec();
    (vertices, vec![0, 1, 2, 0, 2, 3])
}

/// RGBA8 checkerboard, `size`x`size` pixels split into `cells` squares per side.
pub fn checker_pixels(size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> Vec<u8> {
    let cell = (size / cells.max(1)).max(1);
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let even = (x / cell + y / cell) % 2 == 0;
            pixels.extend_from_slice(if even { &a } else { &b });
        }
    }
    pixels
}

/// `count` points evenly spaced on a horizontal circle at height `y`.
pub fn light_ring(count: u32, radius: f32, y: f32) -> Vec<Vec3> {
    (0..count)
        .map(|i| {
            let rotation = Mat3::from_axis_angle(Vec3::NEG_Y, i as f32 * TAU / count as f32);
            rotation * Vec3::new(-radius, y, 0.0)
        })
        .collect()
}

pub fn build(ctx: &Arc<DeviceContext>, cfg: &SceneCfg) -> Result<(Scene, VkAssets)> {
    let mut assets = VkAssets::new();

    let (v, i) = cube();
    let cube = assets.insert_mesh(Mesh::new(ctx.clone(), &v, &i)?);
    let (v, i) = floor(3.0, 6.0);
    let floor = assets.insert_mesh(Mesh::new(ctx.clone(), &v, &i)?);
    let pixels = checker_pixels(64, 8, CHECKER_LIGHT, CHECKER_DARK);
    let checker = assets.insert_texture(Texture::from_rgba8(ctx.clone(), 64, 64, &pixels)?);

    let mut scene = Scene::new();

    let textured = scene.spawn();
    textured.mesh = Some(cube);
    textured.texture = Some(checker);
    textured.transform = Transform {
        translation: Vec3::new(-0.6, 0.0, 0.0),
        scale: Vec3::splat(0.5),
        rotation: Vec3::new(0.0, 0.6, 0.0),
    };

    let tinted = scene.spawn();
    tinted.mesh = Some(cube);
    tinted.color = Vec3::new(1.0, 0.8, 0.6);
    tinted.transform = Transform {
        translation: Vec3::new(0.6, 0.0, 0.0),
        scale: Vec3::new(0.4, 0.6, 0.4),
        rotation: Vec3::new(0.0, -0.4, 0.0),
    };

    let ground = scene.spawn();
    ground.mesh = Some(floor);
    ground.texture = Some(checker);
    ground.transform = Transform::at(Vec3::new(0.0, FLOOR_Y, 0.0));

    for (n, position) in light_ring(cfg.light_count, cfg.orbit_radius, LIGHT_Y)
        .into_iter()
        .enumerate()
    {
        let color = LIGHT_COLORS[n % LIGHT_COLORS.len()];
        let light = scene.spawn_point_light(cfg.light_intensity, cfg.light_radius, color);
        light.transform.translation = position;
    }

    info!(
        drawables = scene.len(),
        lights = cfg.light_count,
        meshes = assets.mesh_count(),
        textures = assets.texture_count(),
        "scene ready"
    );
    Ok((scene, assets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_faces_are_flat_and_indexed() {
        let (vertices, indices) = cube();
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
        for v in &vertices {
            let p = Vec3::from_array(v.position);
            let n = Vec3::from_array(v.normal);
            assert!((p.dot(n) - 0.5).abs() < 1e-6);
            assert!(p.abs().max_element() <= 0.5 + 1e-6);
        }
    }

    #[test]
    fn floor_faces_up() {
        let (vertices, indices) = floor(3.0, 6.0);
        assert_eq!(indices, vec![0, 1, 2, 0, 2, 3]);
        assert!(vertices.iter().all(|v| v.normal == [0.0, -1.0, 0.0]));
        assert_eq!(vertices[2].position, [3.0, 0.0, 3.0]);
        assert_eq!(vertices[2].uv, [6.0, 6.0]);
    }

    #[test]
    fn checker_alternates_per_cell() {
        let a = [255, 0, 0, 255];
        let b = [0, 0, 255, 255];
        let px = checker_pixels(4, 2, a, b);
        assert_eq!(px.len(), 4 * 4 * 4);
        let at = |x: usize, y: usize| &px[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
        assert_eq!(at(0, 0), a);
        assert_eq!(at(1, 1), a);
        assert_eq!(at(2, 0), b);
        assert_eq!(at(2, 2), a);
    }

    #[test]
    fn light_ring_is_evenly_spaced() {
        let ring = light_ring(4, 2.0, -1.0);
        assert_eq!(ring.len(), 4);
        for p in &ring {
            assert!((Vec2::new(p.x, p.z).length() - 2.0).abs() < 1e-5);
            assert_eq!(p.y, -1.0);
        }
        // quarter turn apart: only the shared height contributes
        assert!((ring[0].dot(ring[1]) - 1.0).abs() < 1e-4);
        assert!(light_ring(0, 1.0, 0.0).is_empty());
    }
}
