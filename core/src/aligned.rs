//! Growable, zero-initialised byte storage with a fixed 16-byte alignment.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

pub struct AlignedBytes {
    ptr: NonNull<u8>,
    capacity: usize,
}

// SAFETY: `AlignedBytes` is an owned byte buffer with no interior sharing.
unsafe impl Send for AlignedBytes {}
unsafe impl Sync for AlignedBytes {}

impl AlignedBytes {
    pub const ALIGN: usize = 16;

    pub fn new() -> Self {
        Self {
            ptr: Self::dangling(),
            capacity: 0,
        }
    }

    pub fn zeroed(size: usize) -> Self {
        let mut bytes = Self::new();
        bytes.reserve(size);
        bytes
    }

    fn dangling() -> NonNull<u8> {
        // Never dereferenced; only needs to be non-null and aligned.
        NonNull::new(Self::ALIGN as *mut u8).unwrap_or(NonNull::dangling())
    }

    fn layout(capacity: usize) -> Layout {
        // ALIGN is a power of two and capacities stay far below isize::MAX.
        Layout::from_size_align(capacity, Self::ALIGN).unwrap_or(Layout::new::<u8>())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Grows the buffer to hold at least `needed` bytes. Existing contents
    /// keep their offsets and new bytes are zero.
    pub fn reserve(&mut self, needed: usize) {
        if needed <= self.capacity {
            return;
        }
        let new_capacity = needed
            .max(self.capacity * 2)
            .max(64)
            .next_multiple_of(Self::ALIGN);
        let new_layout = Self::layout(new_capacity);
        // SAFETY: `new_layout` has non-zero size; when growing, `self.ptr`
        // was allocated with `Self::layout(self.capacity)`.
        let raw = unsafe {
            if self.capacity == 0 {
                alloc::alloc_zeroed(new_layout)
            } else {
                let raw = alloc::realloc(self.ptr.as_ptr(), Self::layout(self.capacity), new_capacity);
                if !raw.is_null() {
                    raw.add(self.capacity).write_bytes(0, new_capacity - self.capacity);
                }
                raw
            }
        };
        self.ptr = match NonNull::new(raw) {
            Some(ptr) => ptr,
            None => alloc::handle_alloc_error(new_layout),
        };
        self.capacity = new_capacity;
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `capacity` bytes are allocated and initialised.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.capacity) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and `&mut self` gives exclusive access.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.capacity) }
    }
}

impl Default for AlignedBytes {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AlignedBytes {
    fn drop(&mut self) {
        if self.capacity > 0 {
            // SAFETY: allocated with this layout in `reserve`.
            unsafe { alloc::dealloc(self.ptr.as_ptr(), Self::layout(self.capacity)) };
        }
    }
}
