// SPDX-License-Identifier: CEPL-1.0
use lantern_math::Camera;

/// Everything a pass needs to record one frame.
///
/// The command buffer and descriptor set belong to the current slot and are
/// recycled when that slot comes around again, so this must not outlive the
/// frame it was built for.
#[derive(Clone, Copy, Debug)]
pub struct FrameContext<'a, C, S> {
    pub frame_index: usize,
    pub frame_time: f32,
    pub command_buffer: C,
    pub camera: &'a Camera,
    pub global_descriptor_set: S,
}
