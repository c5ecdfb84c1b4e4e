//! Allocation Tracking
//!
//! [`TrackingAllocator`] wraps the system allocator and counts bytes and
//! allocations per thread. A benchmark binary opts in by installing it:
//!
//! ```ignore
//! #[global_allocator]
//! static GLOBAL: netbench::TrackingAllocator = netbench::TrackingAllocator;
//! ```
//!
//! Only allocations made on the measuring thread are counted; work moved to
//! other threads (for example tokio worker threads) is not seen.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

thread_local! {
    static ALLOC_BYTES: Cell<u64> = const { Cell::new(0) };
    static ALLOC_COUNT: Cell<u64> = const { Cell::new(0) };
}

#[inline]
fn note(bytes: usize) {
    // try_with: the allocator can run while thread locals are torn down
    let _ = ALLOC_BYTES.try_with(|b| b.set(b.get().wrapping_add(bytes as u64)));
    let _ = ALLOC_COUNT.try_with(|c| c.set(c.get().wrapping_add(1)));
}

/// Global allocator that counts allocations on each thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackingAllocator;

// SAFETY: every call is forwarded unchanged to `System`; the counters are
// plain thread-local cells that never allocate.
unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        note(layout.size());
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        note(layout.size());
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        note(new_size);
        unsafe { System.realloc(ptr, layout, new_size) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }
}

/// Zero this thread's counters.
#[inline]
pub fn reset_allocation_counter() {
    let _ = ALLOC_BYTES.try_with(|b| b.set(0));
    let _ = ALLOC_COUNT.try_with(|c| c.set(0));
}

/// Bytes and allocation count on this thread since the last reset.
///
/// Always `(0, 0)` unless [`TrackingAllocator`] is the global allocator.
#[inline]
pub fn current_allocation() -> (u64, u64) {
    let bytes = ALLOC_BYTES.try_with(Cell::get).unwrap_or(0);
    let count = ALLOC_COUNT.try_with(Cell::get).unwrap_or(0);
    (bytes, count)
}
