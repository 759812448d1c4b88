//! Slab pools for component instances.
//!
//! Every registered component type owns one [`Pool`]. Attaching a component
//! acquires a slot from the type's pool; detaching releases it back. Slots are
//! never deallocated individually, so attach/detach cycles at frame rate do
//! not touch the allocator once the pool has grown to the peak working set.
//!
//! # Architecture
//!
//! A pool is a slab of instances plus a free list:
//!
//! - `slots`: the instances themselves. A free slot always holds the type's
//!   default values, so `acquire` hands back a ready-to-use record without
//!   writing it.
//! - `free`: slot indices available for the next acquire.
//! - `live`: a bitmask of slots currently attached to an entity, used to
//!   reject a second release of the same handle before it corrupts the free
//!   list.
//!
//! Growth happens in batches (never one slot at a time in the hot path) and
//! capacity never shrinks for the lifetime of the world.
//!
//! # Handles
//!
//! [`Handle`] is an index into one specific pool. Handles are only meaningful
//! to the pool that issued them; the world keeps them paired with their
//! component [`Id`](super::Id) and never mixes pools.

use std::any::Any;

use fixedbitset::FixedBitSet;

use crate::ecs::{component::Component, error::Error};

/// Number of slots a pool adds when it runs out, unless configured otherwise.
pub const DEFAULT_BATCH: usize = 32;

/// A slot identifier issued by [`Pool::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u32);

impl Handle {
    /// Get the index of the slot this handle refers to.
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for Handle {
    #[inline]
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// A reusable slab pool of component instances for a single type.
pub struct Pool<C: Component> {
    /// Instance slots. Free slots hold `C::default()`.
    slots: Vec<C>,

    /// Indices of free slots, most recently released last.
    free: Vec<u32>,

    /// Bit per slot, set while the slot is acquired.
    live: FixedBitSet,

    /// How many slots to add when the free list runs dry.
    batch: usize,
}

impl<C: Component> Pool<C> {
    /// Create an empty pool with the default growth batch.
    pub fn new() -> Self {
        Self::with_batch(DEFAULT_BATCH)
    }

    /// Create an empty pool that grows by `batch` slots at a time.
    pub fn with_batch(batch: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: FixedBitSet::new(),
            batch: batch.max(1),
        }
    }

    /// Create a pool with `capacity` slots pre-allocated and ready to acquire.
    pub fn with_capacity(capacity: usize, batch: usize) -> Self {
        let mut pool = Self::with_batch(batch);
        pool.reserve(capacity);
        pool
    }

    /// Acquire a slot holding the type's default values.
    ///
    /// Reuses a released slot when one is available; otherwise grows the slab
    /// by the configured batch first.
    pub fn acquire(&mut self) -> Handle {
        if self.free.is_empty() {
            self.reserve(self.batch);
        }
        // The reserve above guarantees a free slot.
        let index = self.free.pop().expect("pool free list empty after grow");
        self.live.insert(index as usize);
        Handle(index)
    }

    /// Release a slot back to the pool, resetting it to default values.
    ///
    /// A handle may be released exactly once per acquire. A second release is
    /// rejected with [`Error::DoubleRelease`] and leaves the pool untouched.
    pub fn release(&mut self, handle: Handle) -> Result<(), Error> {
        let index = handle.index();
        if index >= self.slots.len() || !self.live.contains(index) {
            return Err(Error::DoubleRelease(handle.0));
        }
        self.slots[index] = C::default();
        self.live.set(index, false);
        self.free.push(handle.0);
        Ok(())
    }

    /// Get the instance in an acquired slot.
    #[inline]
    pub fn get(&self, handle: Handle) -> Option<&C> {
        self.live
            .contains(handle.index())
            .then(|| &self.slots[handle.index()])
    }

    /// Get the instance in an acquired slot mutably.
    #[inline]
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut C> {
        self.live
            .contains(handle.index())
            .then(|| &mut self.slots[handle.index()])
    }

    /// Total slots allocated. Never decreases.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots currently acquired.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.live.count_ones(..)
    }

    /// Slots available without growing.
    #[inline]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Add `additional` default-initialized slots to the slab.
    fn reserve(&mut self, additional: usize) {
        let start = self.slots.len();
        let end = start + additional;
        self.slots.resize_with(end, C::default);
        self.live.grow(end);
        self.free.extend((start..end).rev().map(|i| i as u32));
    }
}

impl<C: Component> Default for Pool<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased pool operations, used by the world to manage pools of every
/// registered type uniformly. Typed access goes through `as_any` downcasts,
/// the same way the event broker erases its streams.
pub(crate) trait AnyPool {
    /// Release a slot, resetting it to defaults.
    fn release(&mut self, handle: Handle) -> Result<(), Error>;

    /// Acquire a slot holding a value-copy of another acquired slot.
    fn acquire_copy(&mut self, source: Handle) -> Handle;

    /// Overwrite one acquired slot with a value-copy of another.
    fn copy_value(&mut self, source: Handle, target: Handle);

    /// Total slots allocated.
    fn capacity(&self) -> usize;

    /// Slots currently acquired.
    fn live_count(&self) -> usize;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Component> AnyPool for Pool<C> {
    fn release(&mut self, handle: Handle) -> Result<(), Error> {
        Pool::release(self, handle)
    }

    fn acquire_copy(&mut self, source: Handle) -> Handle {
        let handle = self.acquire();
        self.copy_value(source, handle);
        handle
    }

    fn copy_value(&mut self, source: Handle, target: Handle) {
        let value = self.slots[source.index()].clone();
        self.slots[target.index()] = value;
    }

    fn capacity(&self) -> usize {
        Pool::capacity(self)
    }

    fn live_count(&self) -> usize {
        Pool::live_count(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        value: u32,
    }

    impl Default for Counter {
        fn default() -> Self {
            Self { value: 7 }
        }
    }

    impl Component for Counter {}

    #[test]
    fn acquire_returns_defaults() {
        // Given
        let mut pool = Pool::<Counter>::new();

        // When
        let handle = pool.acquire();

        // Then
        assert_eq!(pool.get(handle), Some(&Counter { value: 7 }));
    }

    #[test]
    fn acquire_grows_by_batch() {
        // Given
        let mut pool = Pool::<Counter>::with_batch(8);
        assert_eq!(pool.capacity(), 0);

        // When
        let _ = pool.acquire();

        // Then - One acquire costs a whole batch, not a single slot
        assert_eq!(pool.capacity(), 8);
        assert_eq!(pool.free_count(), 7);
        assert_eq!(pool.live_count(), 1);
    }

    #[test]
    fn release_resets_to_defaults() {
        // Given
        let mut pool = Pool::<Counter>::new();
        let handle = pool.acquire();
        pool.get_mut(handle).unwrap().value = 99;

        // When
        pool.release(handle).unwrap();
        let reused = pool.acquire();

        // Then - The recycled slot shows defaults, not the old value
        assert_eq!(reused, handle);
        assert_eq!(pool.get(reused), Some(&Counter { value: 7 }));
    }

    #[test]
    fn double_release_is_rejected() {
        // Given
        let mut pool = Pool::<Counter>::new();
        let handle = pool.acquire();
        pool.release(handle).unwrap();

        // When
        let result = pool.release(handle);

        // Then
        assert_eq!(result, Err(Error::DoubleRelease(0)));

        // And the pool still works: the slot comes back exactly once
        let again = pool.acquire();
        assert_eq!(again, handle);
        assert_eq!(pool.live_count(), 1);
    }

    #[test]
    fn released_slot_reads_as_absent() {
        // Given
        let mut pool = Pool::<Counter>::new();
        let handle = pool.acquire();

        // When
        pool.release(handle).unwrap();

        // Then
        assert!(pool.get(handle).is_none());
        assert!(pool.get_mut(handle).is_none());
    }

    #[test]
    fn growth_bounded_by_peak_live_count() {
        // Given
        let mut pool = Pool::<Counter>::with_batch(4);

        // When - Many acquire/release cycles with at most 3 live at once
        for _ in 0..100 {
            let a = pool.acquire();
            let b = pool.acquire();
            let c = pool.acquire();
            pool.release(a).unwrap();
            pool.release(b).unwrap();
            pool.release(c).unwrap();
        }

        // Then - Capacity reflects the peak, not the cycle count
        assert_eq!(pool.capacity(), 4);
    }

    #[test]
    fn with_capacity_preallocates() {
        // Given
        let mut pool = Pool::<Counter>::with_capacity(16, 4);

        // Then
        assert_eq!(pool.capacity(), 16);
        assert_eq!(pool.free_count(), 16);

        // When - Acquiring within capacity does not grow
        for _ in 0..16 {
            let _ = pool.acquire();
        }
        assert_eq!(pool.capacity(), 16);
    }

    #[test]
    fn copy_value_between_slots() {
        // Given
        let mut pool = Pool::<Counter>::new();
        let source = pool.acquire();
        pool.get_mut(source).unwrap().value = 42;

        // When
        let copy = AnyPool::acquire_copy(&mut pool, source);

        // Then - Value copy, independent slots
        assert_eq!(pool.get(copy), Some(&Counter { value: 42 }));
        pool.get_mut(copy).unwrap().value = 1;
        assert_eq!(pool.get(source), Some(&Counter { value: 42 }));
    }
}
