// SPDX-License-Identifier: CEPL-1.0
mod object;
mod point_light;

pub use object::ObjectPass;
pub use point_light::PointLightPass;
