// SPDX-License-Identifier: CEPL-1.0
use thiserror::Error;

use crate::renderer::FrameState;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    /// The rebuilt swapchain came back with a different image format. Every
    /// pipeline was built against the old one, so this is not recoverable.
    #[error("swapchain image format changed across recreation ({previous} -> {current})")]
    FormatDrift { previous: String, current: String },

    #[error("{operation} called while the frame is {state:?}")]
    FrameState {
        operation: &'static str,
        state: FrameState,
    },

    #[error("command buffer does not belong to the current frame slot")]
    ForeignCommandBuffer,

    #[error(
        "descriptor set from slot {set_slot} generation {set_generation} used against slot {slot} generation {generation}"
    )]
    StaleDescriptorSet {
        set_slot: usize,
        set_generation: u64,
        slot: usize,
        generation: u64,
    },

    #[error("descriptor pool for slot {slot} exhausted ({capacity} sets)")]
    DescriptorPoolExhausted { slot: usize, capacity: usize },

    #[error(transparent)]
    Gpu(#[from] anyhow::Error),
}
