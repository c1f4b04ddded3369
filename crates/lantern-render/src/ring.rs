// SPDX-License-Identifier: CEPL-1.0
use std::ops::{Index, IndexMut};

/// How far the CPU may run ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// One value per frame-in-flight slot.
#[derive(Debug, Clone)]
pub struct SlotRing<T> {
    slots: Vec<T>,
}

impl<T> SlotRing<T> {
    pub fn new(mut f: impl FnMut(usize) -> T) -> Self {
        Self {
            slots: (0..MAX_FRAMES_IN_FLIGHT).map(&mut f).collect(),
        }
    }

    pub fn try_new<E>(mut f: impl FnMut(usize) -> Result<T, E>) -> Result<Self, E> {
        let mut slots = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for slot in 0..MAX_FRAMES_IN_FLIGHT {
            slots.push(f(slot)?);
        }
        Ok(Self { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.slots.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.slots
    }
}

impl<T> Index<usize> for SlotRing<T> {
    type Output = T;

    fn index(&self, slot: usize) -> &T {
        &self.slots[slot]
    }
}

impl<T> IndexMut<usize> for SlotRing<T> {
    fn index_mut(&mut self, slot: usize) -> &mut T {
        &mut self.slots[slot]
    }
}

impl<T> IntoIterator for SlotRing<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_entry_per_slot() {
        let ring = SlotRing::new(|slot| slot * 10);
        assert_eq!(ring.len(), MAX_FRAMES_IN_FLIGHT);
        assert_eq!(ring[1], 10);
    }

    #[test]
    fn try_new_stops_at_first_error() {
        let mut built = Vec::new();
        let ring: Result<SlotRing<usize>, &str> = SlotRing::try_new(|slot| {
            if slot == 1 {
                return Err("boom");
            }
            built.push(slot);
            Ok(slot)
        });
        assert_eq!(ring.unwrap_err(), "boom");
        assert_eq!(built, vec![0]);
    }
}
