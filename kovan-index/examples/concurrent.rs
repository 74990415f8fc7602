//! Example demonstrating concurrent publication into a sparse index
//!
//! Several threads publish entries while readers ask for scan-start hints.
//! Once the index passes half full, a larger generation is built from the
//! same entries, the way an enclosing map would grow.

use kovan::{Shared, pin};
use kovan_index::{Hashed, SparseIndex};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

struct Entry {
    hash: u64,
}

impl Hashed for Entry {
    fn key_hash(&self) -> u64 {
        self.hash
    }
}

fn shared(entry: &Entry) -> Shared<'_, Entry> {
    unsafe { Shared::from_raw(entry as *const Entry as *mut Entry) }
}

fn main() {
    println!("=== Lock-Free Sparse Index Demo ===\n");

    // Entries outlive every index generation built over them.
    let entries: Arc<Vec<Entry>> = Arc::new(
        (0..80_000u64)
            .map(|key| Entry {
                hash: key.wrapping_mul(0x9E37_79B9_7F4A_7C15),
            })
            .collect(),
    );
    let index = Arc::new(SparseIndex::<Entry>::with_size_hint(1024));
    println!("Created {:?}", index);

    println!("Publishing from 8 threads...");
    let start = Instant::now();
    let mut handles = Vec::new();
    for thread_id in 0..8 {
        let index = Arc::clone(&index);
        let entries = Arc::clone(&entries);
        handles.push(thread::spawn(move || {
            let guard = pin();
            let mut filled = 0;
            for entry in entries.iter().skip(thread_id).step_by(8) {
                // SAFETY: `entries` is kept alive until every index is dropped.
                if unsafe { index.add_item(shared(entry), &guard) } != 0 {
                    filled += 1;
                }
            }
            filled
        }));
    }

    let filled: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    println!(
        "Published 80,000 entries in {:?}; {} slots filled ({}% full)\n",
        start.elapsed(),
        filled,
        index.fill_rate()
    );

    println!("Looking up scan-start hints from 4 threads...");
    let mut handles = Vec::new();
    for thread_id in 0..4u64 {
        let index = Arc::clone(&index);
        handles.push(thread::spawn(move || {
            let guard = pin();
            let mut exact = 0;
            for i in 0..10_000u64 {
                let hash = (thread_id * 10_000 + i).wrapping_mul(0x2545_F491_4F6C_DD1D);
                let hint = index.item_or_predecessor(hash, &guard);
                if let Some(entry) = unsafe { hint.as_ref() } {
                    if index.index_of(entry.hash) == index.index_of(hash) {
                        exact += 1;
                    }
                }
            }
            exact
        }));
    }
    let exact: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    println!("{} of 40,000 hints came from the probed slot itself\n", exact);

    if index.fill_rate() >= 50 {
        let grown = SparseIndex::<Entry>::with_size_hint(index.capacity() * 2);
        let guard = pin();
        // SAFETY: same entries, same lifetime.
        let filled = unsafe { grown.extend_from(entries.iter().map(shared), &guard) };
        println!(
            "Grew to {} slots: {} filled ({}% full)",
            grown.capacity(),
            filled,
            grown.fill_rate()
        );
    }

    println!("\n=== Demo Complete ===");
}
