// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Transform, camera and free-fly motion math shared by the renderer and the app.

mod camera;
mod motion;
mod transform;

pub use camera::Camera;
pub use glam;
pub use motion::{FreeFly, MoveIntent};
pub use transform::Transform;
