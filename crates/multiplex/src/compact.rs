//! Order-preserving sequence compaction
//!
//! The fan-out removes failed writers by index after each delivery pass.
//! This is the one shared algorithm behind that removal: a single walk
//! over the original list, skipping the failed indices, shifting
//! survivors left in place.

/// Remove the elements at the given indices from `items`.
///
/// `failed` must be ascending and deduplicated (it is collected that way
/// by a forward iteration over `items`). Survivor order is preserved;
/// the pass is O(n) in `items.len()` and allocates nothing.
pub fn compact_failed<T>(items: &mut Vec<T>, failed: &[usize]) {
    if failed.is_empty() {
        return;
    }
    debug_assert!(failed.windows(2).all(|w| w[0] < w[1]));
    debug_assert!(*failed.last().unwrap() < items.len());

    let mut next_failed = 0;
    let mut write = 0;
    for read in 0..items.len() {
        if next_failed < failed.len() && failed[next_failed] == read {
            next_failed += 1;
            continue;
        }
        if write != read {
            items.swap(write, read);
        }
        write += 1;
    }
    items.truncate(write);
}
