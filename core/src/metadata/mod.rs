//! Arrmeta: per-instance side data that a type needs to interpret its bytes.
//!
//! The layout of an arrmeta buffer is a pure function of its type. Each
//! descriptor owns its region and nests its children's regions after its own
//! header. Builtin and fixed-layout types use no arrmeta at all, so every
//! operation here is a no-op for them.

pub mod memory_block;

use core::fmt;
use std::sync::Arc;

pub use memory_block::{BLOCKREF_SIZE, MemoryBlock};

use crate::errors::{Error, Result};
use crate::types::Type;

pub const USIZE: usize = core::mem::size_of::<usize>();

#[inline]
pub fn read_usize(bytes: &[u8], offset: usize) -> usize {
    let mut buf = [0u8; USIZE];
    buf.copy_from_slice(&bytes[offset..offset + USIZE]);
    usize::from_ne_bytes(buf)
}

#[inline]
pub fn write_usize(bytes: &mut [u8], offset: usize, value: usize) {
    bytes[offset..offset + USIZE].copy_from_slice(&value.to_ne_bytes());
}

#[inline]
pub fn read_isize(bytes: &[u8], offset: usize) -> isize {
    read_usize(bytes, offset) as isize
}

#[inline]
pub fn write_isize(bytes: &mut [u8], offset: usize, value: isize) {
    write_usize(bytes, offset, value as usize);
}

/// Arrmeta header of a fixed dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeStride {
    pub dim_size: usize,
    pub stride: isize,
}

impl SizeStride {
    pub const SIZE: usize = 2 * USIZE;

    pub fn read(arrmeta: &[u8]) -> Self {
        Self {
            dim_size: read_usize(arrmeta, 0),
            stride: read_isize(arrmeta, USIZE),
        }
    }

    pub fn write(self, arrmeta: &mut [u8]) {
        write_usize(arrmeta, 0, self.dim_size);
        write_isize(arrmeta, USIZE, self.stride);
    }
}

/// Arrmeta header of a variable dimension. The blockref slot comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarDimArrmeta {
    pub stride: isize,
    pub offset: isize,
}

impl VarDimArrmeta {
    pub const SIZE: usize = BLOCKREF_SIZE + 2 * USIZE;

    pub fn read(arrmeta: &[u8]) -> Self {
        Self {
            stride: read_isize(arrmeta, BLOCKREF_SIZE),
            offset: read_isize(arrmeta, BLOCKREF_SIZE + USIZE),
        }
    }

    pub fn write(self, arrmeta: &mut [u8]) {
        write_isize(arrmeta, BLOCKREF_SIZE, self.stride);
        write_isize(arrmeta, BLOCKREF_SIZE + USIZE, self.offset);
    }
}

pub fn arrmeta_size(tp: &Type) -> usize {
    tp.arrmeta_size()
}

pub fn arrmeta_default_construct(
    tp: &Type,
    arrmeta: &mut [u8],
    shape: &[isize],
    blockref: Option<&Arc<MemoryBlock>>,
) -> Result<()> {
    match tp.extended() {
        Some(ext) => {
            check_len(tp, arrmeta.len())?;
            ext.arrmeta_default_construct(arrmeta, shape, blockref)
        }
        None => Ok(()),
    }
}

/// # Safety
///
/// `src` must hold constructed arrmeta of `tp`; `dst` must not.
pub unsafe fn arrmeta_copy_construct(tp: &Type, dst: &mut [u8], src: &[u8]) {
    if let Some(ext) = tp.extended() {
        unsafe { ext.arrmeta_copy_construct(dst, src) };
    }
}

/// # Safety
///
/// `arrmeta` must hold constructed or zeroed arrmeta of `tp`.
pub unsafe fn arrmeta_destruct(tp: &Type, arrmeta: &mut [u8]) {
    if let Some(ext) = tp.extended() {
        unsafe { ext.arrmeta_destruct(arrmeta) };
    }
}

pub fn arrmeta_debug_print(
    tp: &Type,
    arrmeta: &[u8],
    out: &mut dyn fmt::Write,
    indent: &str,
) -> fmt::Result {
    match tp.extended() {
        Some(ext) => ext.arrmeta_debug_print(arrmeta, out, indent),
        None => Ok(()),
    }
}

fn check_len(tp: &Type, len: usize) -> Result<()> {
    if len < tp.arrmeta_size() {
        return Err(Error::Type(format!(
            "arrmeta buffer of {len} bytes is too small for {tp}, which needs {}",
            tp.arrmeta_size()
        )));
    }
    Ok(())
}

/// Owned, constructed arrmeta for one type.
///
/// Construction runs the default constructor, `Clone` runs the copy
/// constructor and `Drop` the destructor, so the references held in blockref
/// slots are always balanced.
pub struct Arrmeta {
    tp: Type,
    bytes: Box<[u8]>,
}

impl Arrmeta {
    pub fn new(tp: &Type, shape: &[isize], blockref: Option<&Arc<MemoryBlock>>) -> Result<Self> {
        let mut bytes = vec![0u8; tp.arrmeta_size()].into_boxed_slice();
        arrmeta_default_construct(tp, &mut bytes, shape, blockref)?;
        Ok(Self {
            tp: tp.clone(),
            bytes,
        })
    }

    /// Takes a new reference to the arrmeta in `src`.
    ///
    /// # Safety
    ///
    /// `src` must hold constructed arrmeta of `tp`.
    pub unsafe fn copy_of(tp: &Type, src: &[u8]) -> Self {
        let mut bytes = vec![0u8; tp.arrmeta_size()].into_boxed_slice();
        unsafe { arrmeta_copy_construct(tp, &mut bytes, src) };
        Self {
            tp: tp.clone(),
            bytes,
        }
    }

    pub fn tp(&self) -> &Type {
        &self.tp
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Clone for Arrmeta {
    fn clone(&self) -> Self {
        // SAFETY: `self.bytes` is constructed arrmeta of `self.tp`.
        unsafe { Arrmeta::copy_of(&self.tp, &self.bytes) }
    }
}

impl Drop for Arrmeta {
    fn drop(&mut self) {
        // SAFETY: constructed on creation, destructed exactly once here.
        unsafe { arrmeta_destruct(&self.tp, &mut self.bytes) };
    }
}

impl fmt::Debug for Arrmeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "arrmeta for {}", self.tp)?;
        arrmeta_debug_print(&self.tp, &self.bytes, f, " ")
    }
}

#[cfg(test)]
mod arrmeta_test;
