//! Lock-free sparse slot index for hash-ordered linked lists
//!
//! A concurrent hash map that keeps all of its entries in one linked list,
//! sorted ascending by key hash, needs a way to jump close to the right spot
//! in that list without walking it from the head. This crate provides that
//! acceleration structure: a fixed-capacity array of slots, addressed by the
//! most significant bits of a hash, where every slot remembers the entry with
//! the smallest hash ever published into it.
//!
//! The index never owns entries. It stores `kovan` pointers to nodes that
//! belong to the enclosing list, and hands them back as scan-start hints.
//!
//! # Features
//!
//! - **Lock-Free**: Publication is a per-slot CAS loop, lookups are plain atomic loads
//! - **Monotonic**: A slot only ever moves to a smaller hash and is never cleared
//! - **Fixed Size**: Growth is done by building a new index and swapping it in
//! - **Occupancy Tracking**: Exact count of slots that went from empty to occupied
//!
//! # Example
//!
//! ```rust
//! use kovan::{Shared, pin};
//! use kovan_index::{Hashed, SparseIndex};
//!
//! struct Node {
//!     hash: u64,
//! }
//!
//! impl Hashed for Node {
//!     fn key_hash(&self) -> u64 {
//!         self.hash
//!     }
//! }
//!
//! let index = SparseIndex::new(4);
//! let node = Box::into_raw(Box::new(Node { hash: 5 << 60 }));
//!
//! let guard = pin();
//! // SAFETY: `node` is fully built and is freed only after `index` is gone.
//! let filled = unsafe { index.add_item(Shared::from_raw(node), &guard) };
//! assert_eq!(filled, 1);
//!
//! // Slot 3 is empty, so the hint falls back to the entry in slot 1.
//! let hint = index.item_or_predecessor(14 << 60, &guard);
//! assert_eq!(unsafe { hint.deref() }.key_hash(), 5 << 60);
//!
//! drop(guard);
//! drop(index);
//! unsafe { drop(Box::from_raw(node)) };
//! ```

#![warn(missing_docs)]
#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

mod error;
mod index;
mod utils;

pub use error::CapacityError;
pub use index::{DEFAULT_CAPACITY, Hashed, Occupied, SparseIndex};
