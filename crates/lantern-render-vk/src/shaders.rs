// SPDX-License-Identifier: CEPL-1.0
// SPIR-V compiled by build.rs

pub const OBJECT_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/object.vert.spv"));
pub const OBJECT_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/object.frag.spv"));
pub const POINT_LIGHT_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/point_light.vert.spv"));
pub const POINT_LIGHT_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/point_light.frag.spv"));
