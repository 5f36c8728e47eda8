//! An [`ElemPool`] for fixed-size records addressed by dense integer handles.

use core::fmt::Debug;

use super::bit_vec::BitVec;

/// A dense integer handle into an [`ElemPool`].
///
/// The all-ones value is reserved as the [`INVALID`](PoolHandle::INVALID) sentinel,
/// so a pool can hold at most `INVALID` usable elements.
pub trait PoolHandle: Copy + Eq + Debug {
    /// The sentinel handle meaning "no element".
    const INVALID: Self;

    /// Creates a handle from an element index.
    fn from_index(index: usize) -> Self;

    /// Returns the element index of the handle.
    fn index(self) -> usize;

    /// Returns `true` if the handle is not [`INVALID`](PoolHandle::INVALID).
    #[inline]
    fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

/// Rounds `value` up to the next multiple of `granularity`.
#[inline]
pub(crate) fn round_up(value: usize, granularity: usize) -> usize {
    debug_assert!(granularity > 0);
    value.div_ceil(granularity) * granularity
}

/// A growable pool of records with O(1) allocation and release.
///
/// Released elements are threaded onto an intrusive free list stored in a parallel array,
/// and the most recently released element is reused first. Growth never moves handles:
/// the storage is extended and the new elements are chained onto the free list.
///
/// The pool maintains `free_count() + used_count() == capacity()` at all times.
/// With `debug_assertions` enabled, the free count is cross-checked against a walk
/// of the free list after every allocation and release.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ElemPool<H, T> {
    elems: Vec<T>,
    /// The next free element for each free element, or `INVALID` for allocated elements
    /// and the tail of the free list.
    next_free_ids: Vec<H>,
    next_free: H,
    free_count: usize,
    /// The set of allocated elements.
    allocated: BitVec,
    granularity: usize,
    limit: usize,
}

impl<H: PoolHandle, T: Default> ElemPool<H, T> {
    /// Creates a new [`ElemPool`] with the given initial capacity.
    ///
    /// The capacity, and every later capacity, is rounded up to a multiple of `granularity`.
    pub fn with_capacity(capacity: usize, granularity: usize) -> Self {
        let mut pool = Self {
            elems: Vec::new(),
            next_free_ids: Vec::new(),
            next_free: H::INVALID,
            free_count: 0,
            allocated: BitVec::default(),
            granularity: granularity.max(1),
            limit: Self::handle_limit(),
        };
        pool.resize(capacity);
        pool
    }

    /// Caps the capacity of the pool below the limit imposed by the handle width.
    ///
    /// Once the pool reaches the limit, [`allocate`](Self::allocate) returns `INVALID`.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.min(Self::handle_limit());
        self
    }

    /// The number of elements addressable by `H`, including the reserved sentinel index.
    #[inline]
    fn handle_limit() -> usize {
        H::INVALID.index().saturating_add(1)
    }

    /// Returns the number of elements the pool can hold without growing.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.elems.len()
    }

    /// Returns the number of elements on the free list.
    #[inline]
    pub fn free_count(&self) -> usize {
        self.free_count
    }

    /// Returns the number of allocated elements.
    ///
    /// The element with the sentinel index is never allocated and counts as used
    /// once the pool has grown to the full handle width.
    #[inline]
    pub fn used_count(&self) -> usize {
        self.capacity() - self.free_count
    }

    /// Returns the capacity limit of the pool.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Allocates an element, growing the pool if the free list is empty.
    ///
    /// Returns `INVALID` if the pool is full and cannot grow any further.
    pub fn allocate(&mut self) -> H {
        if !self.next_free.is_valid() && !self.grow() {
            return H::INVALID;
        }
        self.allocate_no_resize()
    }

    /// Allocates an element without growing the pool.
    ///
    /// Returns `INVALID` if the free list is empty.
    pub fn allocate_no_resize(&mut self) -> H {
        let id = self.next_free;
        if !id.is_valid() {
            return H::INVALID;
        }

        let index = id.index();
        self.next_free = self.next_free_ids[index];
        self.next_free_ids[index] = H::INVALID;
        self.free_count -= 1;
        self.elems[index] = T::default();
        self.allocated.set(index);
        id
    }

    /// Resets the element and returns it to the free list.
    ///
    /// The handle must be allocated. Releasing a handle twice corrupts the free list.
    pub fn release(&mut self, id: H) {
        let index = id.index();
        debug_assert!(
            index < self.capacity(),
            "released {id:?} is out of bounds for a pool with capacity {}",
            self.capacity()
        );

        debug_assert!(self.allocated.get(index), "released free {id:?}");
        self.elems[index] = T::default();
        self.allocated.unset(index);
        self.next_free_ids[index] = self.next_free;
        self.next_free = id;
        self.free_count += 1;
    }

    /// Grows the pool to at least `new_capacity`, preserving all existing handles.
    ///
    /// Does nothing if the pool is already large enough.
    pub fn resize(&mut self, new_capacity: usize) {
        let old_capacity = self.capacity();
        let new_capacity = round_up(new_capacity, self.granularity).min(self.limit);
        if new_capacity <= old_capacity {
            return;
        }

        self.elems.resize_with(new_capacity, T::default);
        self.next_free_ids.resize(new_capacity, H::INVALID);
        self.allocated.grow(new_capacity);

        // The element at the sentinel index exists for alignment only.
        let usable_end = if new_capacity == Self::handle_limit() {
            new_capacity - 1
        } else {
            new_capacity
        };

        if usable_end > old_capacity {
            for index in old_capacity..usable_end {
                self.next_free_ids[index] = if index + 1 < usable_end {
                    H::from_index(index + 1)
                } else {
                    self.next_free
                };
            }
            self.next_free = H::from_index(old_capacity);
            self.free_count += usable_end - old_capacity;
        }

        self.debug_check_free_count();
    }

    /// Doubles the capacity of the pool. Returns `false` if the pool is at its limit.
    fn grow(&mut self) -> bool {
        let capacity = self.capacity();
        if capacity >= self.limit {
            return false;
        }

        let new_capacity = (capacity * 2).max(self.granularity).min(self.limit);
        bevy::log::debug!(
            "Growing element pool of `{}` from {capacity} to {new_capacity}",
            core::any::type_name::<T>()
        );
        self.resize(new_capacity);
        self.next_free.is_valid()
    }

    /// Walks the free list and counts its elements.
    pub fn compute_free_count(&self) -> usize {
        let mut count = 0;
        let mut next = self.next_free;
        while next.is_valid() {
            count += 1;
            next = self.next_free_ids[next.index()];
        }
        count
    }

    #[inline]
    fn debug_check_free_count(&self) {
        #[cfg(debug_assertions)]
        debug_assert_eq!(
            self.compute_free_count(),
            self.free_count,
            "free list of `{}` pool is out of sync with its counter",
            core::any::type_name::<T>()
        );
    }

    /// Returns the element for the given handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle is out of bounds.
    #[inline]
    pub fn get(&self, id: H) -> &T {
        &self.elems[id.index()]
    }

    /// Returns the element for the given handle mutably.
    ///
    /// # Panics
    ///
    /// Panics if the handle is out of bounds.
    #[inline]
    pub fn get_mut(&mut self, id: H) -> &mut T {
        &mut self.elems[id.index()]
    }

    /// Returns the element for the given handle, or `None` if the handle is out of bounds.
    #[inline]
    pub fn try_get(&self, id: H) -> Option<&T> {
        self.elems.get(id.index())
    }

    /// Returns `true` if the handle refers to an allocated element.
    #[inline]
    pub fn is_allocated(&self, id: H) -> bool {
        id.is_valid() && self.allocated.get(id.index())
    }

    /// Returns the set of allocated elements.
    #[inline]
    pub fn allocated(&self) -> &BitVec {
        &self.allocated
    }

    /// Returns all elements, including free ones.
    #[inline]
    pub fn elems(&self) -> &[T] {
        &self.elems
    }
}

impl<H: PoolHandle, T: Default> Default for ElemPool<H, T> {
    fn default() -> Self {
        Self::with_capacity(0, 1)
    }
}
