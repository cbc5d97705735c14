//! Assignment and comparison kernels between string types.

use std::borrow::Cow;
use std::sync::Arc;

use tracing::debug;

use super::builder::{Kernel, KernelBuilder, KernelFrames};
use super::comparison::ComparisonType;
use super::ErrorMode;
use crate::errors::{Error, Result};
use crate::metadata::{Arrmeta, BLOCKREF_SIZE, MemoryBlock, memory_block};
use crate::types::string::store_string;
use crate::types::{FixedStringType, StringEncoding, StringType, Type, VarStringType};

fn string_of(tp: &Type) -> Option<&dyn StringType> {
    tp.extended().and_then(|ext| ext.as_string())
}

/// Fixed string to fixed string of the same encoding: a byte copy with zero
/// padding, truncating or raising when the destination is shorter.
#[derive(Debug, Clone)]
pub struct FixedStringCopyKernel {
    dst: FixedStringType,
    src: FixedStringType,
    errmode: ErrorMode,
}

impl Kernel for FixedStringCopyKernel {
    unsafe fn single(&self, _frames: &KernelFrames, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        let (dst, src) = unsafe {
            (
                core::slice::from_raw_parts_mut(dst, self.dst.byte_size()),
                core::slice::from_raw_parts(src[0], self.src.byte_size()),
            )
        };
        let range = self.src.range_of(src)?;
        self.dst.store_encoded(dst, self.errmode, range)
    }
}

#[derive(Debug)]
enum StringTarget {
    Fixed(FixedStringType),
    Var {
        block: Arc<MemoryBlock>,
        encoding: StringEncoding,
    },
}

impl StringTarget {
    fn encoding(&self) -> StringEncoding {
        match self {
            StringTarget::Fixed(tp) => tp.encoding(),
            StringTarget::Var { encoding, .. } => *encoding,
        }
    }
}

/// Any string to any string, transcoding when the encodings differ.
#[derive(Debug)]
pub struct StringAssignKernel {
    dst: StringTarget,
    src_meta: Arrmeta,
    errmode: ErrorMode,
}

impl Kernel for StringAssignKernel {
    unsafe fn single(&self, _frames: &KernelFrames, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        let src_tp = string_of(self.src_meta.tp())
            .ok_or_else(|| Error::Type(format!("{} is not a string type", self.src_meta.tp())))?;
        let bytes = unsafe { src_tp.string_range(self.src_meta.as_bytes(), src[0])? };
        let src_encoding = src_tp.encoding();
        let dst_encoding = self.dst.encoding();
        // Same encoding, or valid ASCII into a superset of it, copies the
        // bytes. Anything else goes through the decoder.
        let encoded: Cow<'_, [u8]> = if src_encoding == dst_encoding
            || (src_encoding == StringEncoding::Ascii
                && matches!(dst_encoding, StringEncoding::Latin1 | StringEncoding::Utf8)
                && bytes.is_ascii())
        {
            Cow::Borrowed(bytes)
        } else {
            let text = src_encoding.decode(bytes, self.errmode)?;
            Cow::Owned(dst_encoding.encode(&text, self.errmode)?)
        };
        match &self.dst {
            StringTarget::Fixed(tp) => {
                let dst = unsafe { core::slice::from_raw_parts_mut(dst, tp.byte_size()) };
                tp.store_encoded(dst, self.errmode, &encoded)
            }
            StringTarget::Var { block, encoding } => unsafe {
                store_string(block, dst, &encoded, encoding.unit_size())
            },
        }
    }
}

/// Appends a kernel assigning between two string types.
pub fn make_string_assignment_kernel(
    ckb: &mut KernelBuilder,
    dst_tp: &Type,
    dst_meta: &[u8],
    src_tp: &Type,
    src_meta: &[u8],
    errmode: ErrorMode,
) -> Result<usize> {
    if string_of(dst_tp).is_none() || string_of(src_tp).is_none() {
        return Err(Error::no_assignment(dst_tp, src_tp));
    }

    if let (Some(dst), Some(src)) = (
        dst_tp.extended_as::<FixedStringType>(),
        src_tp.extended_as::<FixedStringType>(),
    ) {
        if dst.encoding() == src.encoding() {
            debug!(%dst_tp, %src_tp, "fixed string copy kernel");
            ckb.emplace_back(FixedStringCopyKernel {
                dst: dst.clone(),
                src: src.clone(),
                errmode,
            });
            return Ok(ckb.len());
        }
    }

    let dst = if let Some(fixed) = dst_tp.extended_as::<FixedStringType>() {
        StringTarget::Fixed(fixed.clone())
    } else if let Some(var) = dst_tp.extended_as::<VarStringType>() {
        // SAFETY: `dst_meta` is constructed arrmeta of `dst_tp`.
        let block = unsafe { memory_block::get(&dst_meta[..BLOCKREF_SIZE]) }.ok_or_else(|| {
            Error::Type(format!("arrmeta for {dst_tp} has no memory block to write into"))
        })?;
        StringTarget::Var {
            block,
            encoding: var.encoding(),
        }
    } else {
        return Err(Error::no_assignment(dst_tp, src_tp));
    };

    debug!(%dst_tp, %src_tp, %errmode, "string assignment kernel");
    ckb.emplace_back(StringAssignKernel {
        dst,
        // SAFETY: `src_meta` is constructed arrmeta of `src_tp`.
        src_meta: unsafe { Arrmeta::copy_of(src_tp, src_meta) },
        errmode,
    });
    Ok(ckb.len())
}

/// Compares two strings by code point, whatever their encodings.
#[derive(Debug)]
pub struct StringCompareKernel {
    src0_meta: Arrmeta,
    src1_meta: Arrmeta,
    comptype: ComparisonType,
}

impl StringCompareKernel {
    unsafe fn decode<'a>(meta: &Arrmeta, data: *const u8) -> Result<Cow<'a, str>> {
        let tp = string_of(meta.tp())
            .ok_or_else(|| Error::Type(format!("{} is not a string type", meta.tp())))?;
        let bytes: &'a [u8] = unsafe { tp.string_range(meta.as_bytes(), data)? };
        if tp.encoding() == StringEncoding::Utf8 {
            if let Ok(s) = core::str::from_utf8(bytes) {
                return Ok(Cow::Borrowed(s));
            }
        }
        Ok(Cow::Owned(tp.encoding().decode(bytes, ErrorMode::None)?))
    }
}

impl Kernel for StringCompareKernel {
    unsafe fn single(&self, _frames: &KernelFrames, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        let a = unsafe { Self::decode(&self.src0_meta, src[0])? };
        let b = unsafe { Self::decode(&self.src1_meta, src[1])? };
        let result = match self.comptype {
            ComparisonType::Less | ComparisonType::SortingLess => a < b,
            ComparisonType::LessEqual => a <= b,
            ComparisonType::Equal => a == b,
            ComparisonType::NotEqual => a != b,
            ComparisonType::GreaterEqual => a >= b,
            ComparisonType::Greater => a > b,
        };
        unsafe { *dst = result as u8 };
        Ok(())
    }
}

/// Appends a kernel comparing two string types.
pub fn make_string_comparison_kernel(
    ckb: &mut KernelBuilder,
    src0_tp: &Type,
    src0_meta: &[u8],
    src1_tp: &Type,
    src1_meta: &[u8],
    comptype: ComparisonType,
) -> Result<usize> {
    if string_of(src0_tp).is_none() || string_of(src1_tp).is_none() {
        return Err(Error::no_comparison(comptype, src0_tp, src1_tp));
    }
    debug!(%src0_tp, %src1_tp, %comptype, "string comparison kernel");
    // SAFETY: both arrmeta slices are constructed for their types.
    let (src0_meta, src1_meta) = unsafe {
        (
            Arrmeta::copy_of(src0_tp, src0_meta),
            Arrmeta::copy_of(src1_tp, src1_meta),
        )
    };
    ckb.emplace_back(StringCompareKernel {
        src0_meta,
        src1_meta,
        comptype,
    });
    Ok(ckb.len())
}
