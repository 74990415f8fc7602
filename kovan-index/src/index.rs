//! Fixed-capacity sparse slot array.
//!
//! # Architecture
//! - **Slots**: Array of kovan `Atomic` pointers (null-initialized), one per bucket.
//! - **Addressing**: A hash selects its slot by its top `log2(capacity)` bits,
//!   so slot order follows list order.
//! - **Watermark**: Each slot holds the smallest-hash entry ever offered to it.
//!   Slots only move downward and are never cleared, even after the list
//!   unlinks the entry. Callers re-validate while scanning.
//! - **Occupancy**: A counter bumped exactly once per slot, on its first fill.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::iter::Enumerate;
use core::slice;
use core::sync::atomic::Ordering;
use kovan::{Atomic, Guard, Shared};
use portable_atomic::AtomicUsize;

use crate::error::CapacityError;
use crate::utils::{Backoff, CacheAligned};

/// Capacity used by `Default` and the smallest capacity `with_size_hint` picks.
pub const DEFAULT_CAPACITY: usize = 8;

/// Width of the hashes the index is addressed with.
const HASH_BITS: u32 = u64::BITS;

/// An entry of the hash-ordered list, as seen by the index.
///
/// The index only ever reads the hash. Keys, values and links stay private to
/// the list that owns the nodes.
pub trait Hashed {
    /// Full 64-bit hash the list is ordered by.
    fn key_hash(&self) -> u64;
}

/// Lock-free sparse index over a hash-ordered linked list.
///
/// Every slot is either empty or points at the entry with the smallest hash
/// ever published into that slot. Lookups return such entries as hints for
/// where to start walking the list; a hint may be stale and must be verified
/// against the list.
///
/// The index does not own its entries and never frees them.
pub struct SparseIndex<E> {
    slots: Box<[Atomic<E>]>,
    key_shifts: u32,
    count: CacheAligned<AtomicUsize>,
}

impl<E> SparseIndex<E> {
    /// Creates an empty index with `capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or not a power of two. Use
    /// [`try_new`](Self::try_new) to handle that case, or
    /// [`with_size_hint`](Self::with_size_hint) to round up instead.
    pub fn new(capacity: usize) -> Self {
        match Self::try_new(capacity) {
            Ok(index) => index,
            Err(err) => panic!("invalid sparse index capacity: {}", err),
        }
    }

    /// Creates an empty index with `capacity` slots, rejecting capacities the
    /// hash shift cannot address.
    pub fn try_new(capacity: usize) -> Result<Self, CapacityError> {
        if capacity == 0 {
            return Err(CapacityError::Zero);
        }
        if !capacity.is_power_of_two() {
            return Err(CapacityError::NotPowerOfTwo(capacity));
        }

        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(Atomic::null());
        }

        Ok(Self {
            slots: slots.into_boxed_slice(),
            key_shifts: HASH_BITS - capacity.trailing_zeros(),
            count: CacheAligned::new(AtomicUsize::new(0)),
        })
    }

    /// Creates an empty index large enough to give `expected` entries a slot
    /// each.
    ///
    /// The capacity is rounded up to the next power of two and is at least
    /// [`DEFAULT_CAPACITY`].
    pub fn with_size_hint(expected: usize) -> Self {
        let capacity = expected
            .max(DEFAULT_CAPACITY)
            .checked_next_power_of_two()
            .unwrap_or(1 << (usize::BITS - 1));
        Self::new(capacity)
    }

    /// Returns the number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns how far a hash is shifted right to become a slot index.
    pub fn key_shifts(&self) -> u32 {
        self.key_shifts
    }

    /// Returns the slot a hash maps to.
    #[inline(always)]
    pub fn index_of(&self, hashed_key: u64) -> usize {
        // A single-slot index shifts by the full hash width.
        hashed_key.checked_shr(self.key_shifts).unwrap_or(0) as usize
    }

    /// Returns the number of slots that have been filled.
    ///
    /// May briefly trail a concurrent `add_item` whose CAS already landed, but
    /// never runs ahead of the slots.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Returns true if nothing has been published yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Occupied slots as a whole percentage of capacity.
    pub fn fill_rate(&self) -> usize {
        self.len() * 100 / self.capacity()
    }

    /// Iterates over the occupied slots in ascending slot order.
    pub fn occupied<'g>(&'g self, guard: &'g Guard) -> Occupied<'g, E> {
        Occupied {
            slots: self.slots.iter().enumerate(),
            guard,
        }
    }

    #[inline(always)]
    fn slot(&self, idx: usize) -> &Atomic<E> {
        debug_assert!(idx < self.slots.len());
        // SAFETY: `index_of` keeps only the top log2(capacity) bits of a hash,
        // and the backward scan only walks down from such an index.
        unsafe { self.slots.get_unchecked(idx) }
    }
}

impl<E: Hashed> SparseIndex<E> {
    /// Returns the current content of the slot `hashed_key` maps to.
    ///
    /// This is a single atomic load with no fallback. A null result means
    /// nothing was ever published into exactly that slot. A non-null result is
    /// only a hint: it may belong to another key or be unlinked from the list.
    #[inline]
    pub fn item<'g>(&self, hashed_key: u64, guard: &'g Guard) -> Shared<'g, E> {
        self.slot(self.index_of(hashed_key))
            .load(Ordering::Acquire, guard)
    }

    /// Returns the best known entry to start a list scan for `hashed_key` from.
    ///
    /// Starting at the slot `hashed_key` maps to, walks the slots downward
    /// while the current one is empty or holds a larger hash than
    /// `hashed_key`. The walk stops at slot 0, whose content is returned as is:
    /// null only if slot 0 was never filled, and possibly an entry whose hash
    /// still exceeds `hashed_key`. Such an entry is still a valid lower bound
    /// to scan from because the list is sorted.
    pub fn item_or_predecessor<'g>(&self, hashed_key: u64, guard: &'g Guard) -> Shared<'g, E> {
        let mut idx = self.index_of(hashed_key);
        let mut item = self.slot(idx).load(Ordering::Acquire, guard);

        // SAFETY: every non-null slot was filled through `add_item`, whose
        // contract keeps the entry alive for as long as this index is.
        while idx > 0 && (item.is_null() || hashed_key < unsafe { item.deref() }.key_hash()) {
            idx -= 1;
            item = self.slot(idx).load(Ordering::Acquire, guard);
        }

        item
    }

    /// Publishes `item` into its slot if it lowers that slot's watermark.
    ///
    /// Returns the new occupancy count when this call filled an empty slot,
    /// and 0 otherwise (the slot already held a smaller or equal hash, or an
    /// existing occupant was replaced). Each slot produces a non-zero return
    /// exactly once.
    ///
    /// # Safety
    ///
    /// - `item` must be non-null and point to a fully initialized `E`.
    /// - The entry must stay allocated for as long as this index can be read.
    ///   The list may unlink it, but reclamation has to wait until the index
    ///   itself has been discarded (for example by retiring both through kovan
    ///   after a generation swap).
    pub unsafe fn add_item(&self, item: Shared<'_, E>, guard: &Guard) -> usize {
        debug_assert!(!item.is_null(), "published a null entry");

        // SAFETY: the caller guarantees `item` is valid.
        let key_hash = unsafe { item.deref() }.key_hash();
        let slot = self.slot(self.index_of(key_hash));
        let mut backoff = Backoff::new();

        loop {
            let current = slot.load(Ordering::Acquire, guard);

            if current.is_null() {
                match slot.compare_exchange(
                    current,
                    item,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                    guard,
                ) {
                    Ok(_) => return self.count.fetch_add(1, Ordering::AcqRel) + 1,
                    Err(_) => {
                        // Someone filled the slot first; compare against them.
                        backoff.spin();
                        continue;
                    }
                }
            }

            // SAFETY: the occupant was published under the same contract.
            if key_hash >= unsafe { current.deref() }.key_hash() {
                return 0;
            }

            match slot.compare_exchange(
                current,
                item,
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            ) {
                Ok(_) => return 0,
                Err(_) => backoff.spin(),
            }
        }
    }

    /// Publishes a run of entries, typically a walk of the list from its head
    /// into a freshly allocated, larger index.
    ///
    /// Returns how many slots this call filled.
    ///
    /// # Safety
    ///
    /// Every yielded entry must satisfy the contract of
    /// [`add_item`](Self::add_item).
    pub unsafe fn extend_from<'a, I>(&self, items: I, guard: &Guard) -> usize
    where
        I: IntoIterator<Item = Shared<'a, E>>,
        E: 'a,
    {
        let mut filled = 0;
        for item in items {
            // SAFETY: forwarded from the caller.
            if unsafe { self.add_item(item, guard) } != 0 {
                filled += 1;
            }
        }
        filled
    }
}

impl<E> Default for SparseIndex<E> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<E> fmt::Debug for SparseIndex<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseIndex")
            .field("capacity", &self.capacity())
            .field("key_shifts", &self.key_shifts)
            .field("len", &self.len())
            .finish()
    }
}

// SAFETY: the index only hands out shared pointers to entries; moving or
// sharing it across threads is sound when the entries themselves are.
unsafe impl<E: Send + Sync> Send for SparseIndex<E> {}
unsafe impl<E: Send + Sync> Sync for SparseIndex<E> {}

/// Iterator over the occupied slots of a [`SparseIndex`].
///
/// Yields `(slot index, entry)` pairs. Each slot is loaded once, so
/// concurrent publication may or may not be observed.
pub struct Occupied<'g, E> {
    slots: Enumerate<slice::Iter<'g, Atomic<E>>>,
    guard: &'g Guard,
}

impl<'g, E> Iterator for Occupied<'g, E> {
    type Item = (usize, Shared<'g, E>);

    fn next(&mut self) -> Option<Self::Item> {
        for (idx, slot) in self.slots.by_ref() {
            let item = slot.load(Ordering::Acquire, self.guard);
            if !item.is_null() {
                return Some((idx, item));
            }
        }
        None
    }
}
