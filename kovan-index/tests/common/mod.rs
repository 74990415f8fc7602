#![allow(dead_code)]

use kovan::{Atomic, Guard, Shared, pin};
use kovan_index::{Hashed, SparseIndex};
use std::sync::atomic::Ordering;

/// Bare entry carrying only a hash.
pub struct Node {
    pub hash: u64,
}

impl Hashed for Node {
    fn key_hash(&self) -> u64 {
        self.hash
    }
}

pub fn nodes(hashes: &[u64]) -> Vec<Node> {
    hashes.iter().map(|&hash| Node { hash }).collect()
}

/// Places a small number in the top nibble so indices of a 4 or 16 slot
/// index can be read off directly.
pub fn top(nibble: u64) -> u64 {
    nibble << 60
}

pub fn publish<E: Hashed>(index: &SparseIndex<E>, entry: &E, guard: &Guard) -> usize {
    unsafe { index.add_item(Shared::from_raw(entry as *const E as *mut E), guard) }
}

pub fn hash_of<E: Hashed>(item: Shared<'_, E>) -> Option<u64> {
    unsafe { item.as_ref() }.map(|entry| entry.key_hash())
}

/// Odd-multiplier mix: a bijection on u64, so distinct keys never collide.
pub fn mix(key: u64) -> u64 {
    key.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Node of an insert-only, hash-ordered lock-free list.
pub struct ListNode {
    pub hash: u64,
    pub key: u64,
    next: Atomic<ListNode>,
}

impl Hashed for ListNode {
    fn key_hash(&self) -> u64 {
        self.hash
    }
}

/// Minimal hash-ordered list that starts every walk from a sparse index hint.
///
/// Keys map to hashes through `mix`, so a hash identifies its key.
pub struct IndexedList {
    head: Atomic<ListNode>,
    index: SparseIndex<ListNode>,
}

impl IndexedList {
    pub fn new(capacity: usize) -> Self {
        Self {
            head: Atomic::null(),
            index: SparseIndex::new(capacity),
        }
    }

    pub fn index(&self) -> &SparseIndex<ListNode> {
        &self.index
    }

    /// Link to start walking from when looking for `hash`.
    fn start<'g>(&'g self, hash: u64, guard: &'g Guard) -> &'g Atomic<ListNode> {
        let hint = self.index.item_or_predecessor(hash, guard);
        match unsafe { hint.as_ref() } {
            Some(node) if node.hash <= hash => &node.next,
            _ => &self.head,
        }
    }

    pub fn contains(&self, key: u64) -> bool {
        let hash = mix(key);
        let guard = pin();

        let hint = self.index.item_or_predecessor(hash, &guard);
        if let Some(node) = unsafe { hint.as_ref() } {
            if node.hash == hash {
                return node.key == key;
            }
        }

        let mut current = self.start(hash, &guard).load(Ordering::Acquire, &guard);
        while let Some(node) = unsafe { current.as_ref() } {
            if node.hash >= hash {
                return node.hash == hash && node.key == key;
            }
            current = node.next.load(Ordering::Acquire, &guard);
        }
        false
    }

    /// Inserts `key`, returning false if it was already present.
    pub fn insert(&self, key: u64) -> bool {
        let hash = mix(key);
        let guard = pin();

        let hint = self.index.item_or_predecessor(hash, &guard);
        if let Some(node) = unsafe { hint.as_ref() } {
            if node.hash == hash {
                return false;
            }
        }

        let mut prev_link = self.start(hash, &guard);

        loop {
            let mut current = prev_link.load(Ordering::Acquire, &guard);
            while let Some(node) = unsafe { current.as_ref() } {
                if node.hash >= hash {
                    break;
                }
                prev_link = &node.next;
                current = node.next.load(Ordering::Acquire, &guard);
            }

            if let Some(node) = unsafe { current.as_ref() } {
                if node.hash == hash {
                    return false;
                }
            }

            let new_node = Box::into_raw(Box::new(ListNode {
                hash,
                key,
                next: Atomic::new(current.as_raw()),
            }));

            match prev_link.compare_exchange(
                current,
                unsafe { Shared::from_raw(new_node) },
                Ordering::Release,
                Ordering::Acquire,
                &guard,
            ) {
                Ok(_) => {
                    unsafe { self.index.add_item(Shared::from_raw(new_node), &guard) };
                    return true;
                }
                // The list is insert-only, so `prev_link` stays a valid
                // place to resume from.
                Err(_) => unsafe { drop(Box::from_raw(new_node)) },
            }
        }
    }

    /// Hashes in list order, walked from the head.
    pub fn hashes(&self) -> Vec<u64> {
        let guard = pin();
        let mut out = Vec::new();
        let mut current = self.head.load(Ordering::Acquire, &guard);
        while let Some(node) = unsafe { current.as_ref() } {
            out.push(node.hash);
            current = node.next.load(Ordering::Acquire, &guard);
        }
        out
    }

    /// Builds a new index of `capacity` slots from a walk of the list.
    ///
    /// The result points into this list and must be dropped before it.
    pub fn rebuild(&self, capacity: usize) -> SparseIndex<ListNode> {
        let guard = pin();
        let index = SparseIndex::new(capacity);
        let mut nodes = Vec::new();
        let mut current = self.head.load(Ordering::Acquire, &guard);
        while let Some(node) = unsafe { current.as_ref() } {
            nodes.push(current);
            current = node.next.load(Ordering::Acquire, &guard);
        }
        unsafe { index.extend_from(nodes, &guard) };
        index
    }
}

impl Drop for IndexedList {
    fn drop(&mut self) {
        let guard = pin();
        let mut current = self.head.load(Ordering::Acquire, &guard);
        while !current.is_null() {
            unsafe {
                let next = current.deref().next.load(Ordering::Relaxed, &guard);
                drop(Box::from_raw(current.as_raw()));
                current = next;
            }
        }
    }
}
