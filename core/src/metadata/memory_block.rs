//! Reference counted arenas owning variable-length data.

use core::alloc::Layout;
use core::ptr::NonNull;
use std::sync::{Arc, Mutex};

use bumpalo::Bump;

use super::{read_usize, write_usize};
use crate::errors::{Error, Result};

/// Bytes occupied by a blockref slot in arrmeta.
pub const BLOCKREF_SIZE: usize = core::mem::size_of::<usize>();

/// Arena that owns the bytes behind variable-length strings and dimensions.
///
/// Shared through `Arc`; arrmeta blockref slots each hold one strong
/// reference. Allocations stay valid for as long as the block lives.
#[derive(Debug, Default)]
pub struct MemoryBlock {
    arena: Mutex<Bump>,
}

impl MemoryBlock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Allocates `size` zeroed bytes aligned to `align`.
    pub fn allocate_zeroed(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        let layout = Layout::from_size_align(size, align.max(1))
            .map_err(|e| Error::Type(format!("invalid allocation layout: {e}")))?;
        let arena = self.arena.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let ptr = arena.alloc_layout(layout);
        // SAFETY: `alloc_layout` returned `size` writable bytes.
        unsafe { core::ptr::write_bytes(ptr.as_ptr(), 0, size) };
        Ok(ptr)
    }

    /// Copies `bytes` into the block.
    pub fn allocate_copy(&self, bytes: &[u8], align: usize) -> Result<NonNull<u8>> {
        let layout = Layout::from_size_align(bytes.len(), align.max(1))
            .map_err(|e| Error::Type(format!("invalid allocation layout: {e}")))?;
        let arena = self.arena.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let ptr = arena.alloc_layout(layout);
        // SAFETY: the new allocation cannot overlap `bytes`.
        unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len()) };
        Ok(ptr)
    }

    pub fn allocated_bytes(&self) -> usize {
        self.arena
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .allocated_bytes()
    }
}

/// Stores an owning reference to `block` in an empty slot.
pub fn store(slot: &mut [u8], block: Arc<MemoryBlock>) {
    write_usize(slot, 0, Arc::into_raw(block) as usize);
}

/// Copies the reference in `src` into the empty slot `dst`, taking a new
/// strong reference.
///
/// # Safety
///
/// `src` must be zero or hold a reference written by [`store`].
pub unsafe fn copy(dst: &mut [u8], src: &[u8]) {
    let raw = read_usize(src, 0);
    if raw != 0 {
        // SAFETY: the slot owns a strong reference, so the count is at least one.
        unsafe { Arc::increment_strong_count(raw as *const MemoryBlock) };
    }
    write_usize(dst, 0, raw);
}

/// Drops the reference held by the slot and clears it.
///
/// # Safety
///
/// `slot` must be zero or hold a reference written by [`store`] or [`copy`].
pub unsafe fn release(slot: &mut [u8]) {
    let raw = read_usize(slot, 0);
    if raw != 0 {
        write_usize(slot, 0, 0);
        // SAFETY: the slot owned exactly this strong reference.
        drop(unsafe { Arc::from_raw(raw as *const MemoryBlock) });
    }
}

/// A new strong reference to the block in the slot, if any.
///
/// # Safety
///
/// `slot` must be zero or hold a live reference written by [`store`] or [`copy`].
pub unsafe fn get(slot: &[u8]) -> Option<Arc<MemoryBlock>> {
    let raw = read_usize(slot, 0);
    if raw == 0 {
        return None;
    }
    let ptr = raw as *const MemoryBlock;
    // SAFETY: the slot keeps the count above zero while we add ours.
    unsafe {
        Arc::increment_strong_count(ptr);
        Some(Arc::from_raw(ptr))
    }
}
