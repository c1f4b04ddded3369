// SPDX-License-Identifier: CEPL-1.0
//! Per-slot descriptor allocation with generation tracking.
//!
//! Every set handed out is stamped with the slot and pool generation that
//! produced it. Resetting the pool bumps the generation, so a set kept across
//! a reset is caught at [`FrameDescriptorPool::resolve`] instead of being
//! bound after the driver has recycled it.

use crate::{RenderError, RenderResult};

/// The raw pool behind a [`FrameDescriptorPool`].
pub trait DescriptorPoolBackend {
    type Layout: Copy;
    type Set: Copy;

    fn allocate(&mut self, layout: Self::Layout) -> RenderResult<Self::Set>;
    /// Returns every set allocated since the last reset to the pool.
    fn reset(&mut self) -> RenderResult<()>;
}

/// A descriptor set valid only until its pool is next reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSet<S> {
    raw: S,
    slot: usize,
    generation: u64,
}

impl<S: Copy> FrameSet<S> {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

pub struct FrameDescriptorPool<P: DescriptorPoolBackend> {
    backend: P,
    slot: usize,
    generation: u64,
    issued: usize,
    max_sets: usize,
}

impl<P: DescriptorPoolBackend> FrameDescriptorPool<P> {
    pub fn new(backend: P, slot: usize, max_sets: usize) -> Self {
        Self {
            backend,
            slot,
            generation: 0,
            issued: 0,
            max_sets,
        }
    }

    pub fn allocate(&mut self, layout: P::Layout) -> RenderResult<FrameSet<P::Set>> {
        if self.issued >= self.max_sets {
            return Err(RenderError::DescriptorPoolExhausted {
                slot: self.slot,
                capacity: self.max_sets,
            });
        }
        let raw = self.backend.allocate(layout)?;
        self.issued += 1;
        Ok(FrameSet {
            raw,
            slot: self.slot,
            generation: self.generation,
        })
    }

    /// Invalidates every set issued so far.
    pub fn reset(&mut self) -> RenderResult<()> {
        self.backend.reset()?;
        self.generation += 1;
        self.issued = 0;
        Ok(())
    }

    /// Unwraps a set for binding, rejecting one from another slot or from
    /// before the last reset.
    pub fn resolve(&self, set: &FrameSet<P::Set>) -> RenderResult<P::Set> {
        if set.slot != self.slot || set.generation != self.generation {
            return Err(RenderError::StaleDescriptorSet {
                set_slot: set.slot,
                set_generation: set.generation,
                slot: self.slot,
                generation: self.generation,
            });
        }
        Ok(set.raw)
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn issued(&self) -> usize {
        self.issued
    }

    pub fn capacity(&self) -> usize {
        self.max_sets
    }

    pub fn backend(&self) -> &P {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SlotRing, MAX_FRAMES_IN_FLIGHT};

    #[derive(Default)]
    struct CountingPool {
        next: u32,
        resets: u32,
    }

    impl DescriptorPoolBackend for CountingPool {
        type Layout = ();
        type Set = u32;

        fn allocate(&mut self, _layout: ()) -> RenderResult<u32> {
            self.next += 1;
            Ok(self.next)
        }

        fn reset(&mut self) -> RenderResult<()> {
            self.resets += 1;
            self.next = 0;
            Ok(())
        }
    }

    #[test]
    fn fresh_set_resolves() {
        let mut pool = FrameDescriptorPool::new(CountingPool::default(), 0, 4);
        let set = pool.allocate(()).unwrap();
        assert_eq!(pool.resolve(&set).unwrap(), 1);
        assert_eq!(pool.issued(), 1);
    }

    #[test]
    fn set_from_before_reset_is_stale() {
        let mut pool = FrameDescriptorPool::new(CountingPool::default(), 1, 4);
        let old = pool.allocate(()).unwrap();
        pool.reset().unwrap();

        let err = pool.resolve(&old).unwrap_err();
        assert!(matches!(
            err,
            RenderError::StaleDescriptorSet {
                set_generation: 0,
                generation: 1,
                ..
            }
        ));
        assert_eq!(pool.backend().resets, 1);

        // the backend hands out the same raw handle again, only the new stamp resolves
        let fresh = pool.allocate(()).unwrap();
        assert_eq!(pool.resolve(&fresh).unwrap(), 1);
    }

    #[test]
    fn set_from_another_slot_is_rejected() {
        let mut pools = SlotRing::new(|slot| FrameDescriptorPool::new(CountingPool::default(), slot, 4));
        let set = pools[0].allocate(()).unwrap();
        assert!(pools[1].resolve(&set).is_err());
        assert_eq!(pools.len(), MAX_FRAMES_IN_FLIGHT);
    }

    #[test]
    fn exhaustion_is_reported_and_cleared_by_reset() {
        let mut pool = FrameDescriptorPool::new(CountingPool::default(), 0, 2);
        pool.allocate(()).unwrap();
        pool.allocate(()).unwrap();
        assert!(matches!(
            pool.allocate(()),
            Err(RenderError::DescriptorPoolExhausted { slot: 0, capacity: 2 })
        ));
        pool.reset().unwrap();
        assert!(pool.allocate(()).is_ok());
    }
}
