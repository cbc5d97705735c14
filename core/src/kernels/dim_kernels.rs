//! Assignment kernels for fixed and variable dimensions.
//!
//! A dimension kernel loops over the destination dimension and calls the
//! element kernel strided. Sources with fewer dimensions, or a dimension of
//! size one, broadcast with a stride of zero. An unallocated `var` destination
//! is allocated in its memory block with the source's size.

use std::sync::Arc;

use tracing::debug;

use super::builder::{Kernel, KernelBuilder, KernelFrames};
use super::{ErrorMode, KernelRequest, Partition, assignment};
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::metadata::{BLOCKREF_SIZE, MemoryBlock, SizeStride, VarDimArrmeta, memory_block};
use crate::types::dims::VarDimData;
use crate::types::{DimType, FixedDimType, Type, VarDimType};

/// Where the elements of the source come from.
#[derive(Debug, Clone, Copy)]
enum DimSource {
    /// The whole source is repeated for every destination element.
    Broadcast,
    Fixed { size: usize, stride: isize },
    Var { stride: isize, offset: isize },
}

impl DimSource {
    /// Size (`None` when broadcasting), first element and stride of the
    /// source at `src`.
    unsafe fn resolve(self, src: *const u8) -> (Option<usize>, *const u8, isize) {
        match self {
            DimSource::Broadcast => (None, src, 0),
            DimSource::Fixed { size, stride } => (Some(size), src, stride),
            DimSource::Var { stride, offset } => {
                let vd = unsafe { core::ptr::read_unaligned(src as *const VarDimData) };
                (Some(vd.size), vd.begin.wrapping_offset(offset) as *const u8, stride)
            }
        }
    }
}

fn broadcast_stride(src_size: Option<usize>, stride: isize, dst_size: usize) -> Result<isize> {
    match src_size {
        None => Ok(0),
        Some(n) if n == dst_size => Ok(stride),
        Some(1) => Ok(0),
        Some(n) => Err(Error::Broadcast {
            src: n.to_string(),
            dst: dst_size.to_string(),
        }),
    }
}

/// Assigns into an `N * T` destination.
#[derive(Debug)]
pub struct FixedDimKernel {
    dim_size: usize,
    dst_stride: isize,
    src: DimSource,
    child: usize,
}

impl Kernel for FixedDimKernel {
    unsafe fn single(&self, frames: &KernelFrames, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        let (src_size, src_begin, src_stride) = unsafe { self.src.resolve(src[0]) };
        let src_stride = broadcast_stride(src_size, src_stride, self.dim_size)?;
        unsafe {
            frames.strided(
                self.child,
                dst,
                self.dst_stride,
                &[src_begin],
                &[src_stride],
                self.dim_size,
                Partition::SERIAL,
            )
        }
    }
}

/// Assigns into a `var * T` destination, allocating it when empty.
#[derive(Debug)]
pub struct VarDimKernel {
    block: Arc<MemoryBlock>,
    dst_stride: isize,
    dst_offset: isize,
    element_alignment: usize,
    src: DimSource,
    child: usize,
}

impl Kernel for VarDimKernel {
    unsafe fn single(&self, frames: &KernelFrames, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        let (src_size, src_begin, src_stride) = unsafe { self.src.resolve(src[0]) };
        let mut vd = unsafe { core::ptr::read_unaligned(dst as *const VarDimData) };
        if vd.begin.is_null() {
            let size = src_size.unwrap_or(1);
            let bytes = self.dst_offset.unsigned_abs() + size * self.dst_stride.unsigned_abs();
            let begin = self.block.allocate_zeroed(bytes, self.element_alignment)?;
            vd = VarDimData {
                begin: begin.as_ptr(),
                size,
            };
            unsafe { core::ptr::write_unaligned(dst as *mut VarDimData, vd) };
        }
        let src_stride = broadcast_stride(src_size, src_stride, vd.size)?;
        unsafe {
            frames.strided(
                self.child,
                vd.begin.wrapping_offset(self.dst_offset),
                self.dst_stride,
                &[src_begin],
                &[src_stride],
                vd.size,
                Partition::SERIAL,
            )
        }
    }
}

/// Splits the source into how it feeds the destination dimension, plus the
/// type and arrmeta its elements are read with.
fn describe_source<'m>(
    dst_ndim: usize,
    src_tp: &Type,
    src_meta: &'m [u8],
) -> Result<(DimSource, Type, &'m [u8])> {
    if src_tp.ndim() < dst_ndim {
        return Ok((DimSource::Broadcast, src_tp.clone(), src_meta));
    }
    if let Some(fixed) = src_tp.extended_as::<FixedDimType>() {
        let ss = SizeStride::read(src_meta);
        return Ok((
            DimSource::Fixed {
                size: ss.dim_size,
                stride: ss.stride,
            },
            fixed.element_type().clone(),
            &src_meta[SizeStride::SIZE..],
        ));
    }
    if let Some(var) = src_tp.extended_as::<VarDimType>() {
        let md = VarDimArrmeta::read(src_meta);
        return Ok((
            DimSource::Var {
                stride: md.stride,
                offset: md.offset,
            },
            var.element_type().clone(),
            &src_meta[VarDimArrmeta::SIZE..],
        ));
    }
    Err(Error::Type(format!("cannot read {src_tp} as a dimension")))
}

/// Appends a kernel assigning to a fixed or variable dimension and returns
/// the builder's new end offset.
#[allow(clippy::too_many_arguments)]
pub fn make_dim_assignment_kernel(
    ckb: &mut KernelBuilder,
    dst_tp: &Type,
    dst_meta: &[u8],
    src_tp: &Type,
    src_meta: &[u8],
    _kernreq: KernelRequest,
    errmode: ErrorMode,
    ectx: &EvalContext,
) -> Result<usize> {
    let dst_ndim = dst_tp.ndim();
    if src_tp.ndim() > dst_ndim {
        return Err(Error::Broadcast {
            src: src_tp.to_string(),
            dst: dst_tp.to_string(),
        });
    }
    let (source, src_element, src_element_meta) = describe_source(dst_ndim, src_tp, src_meta)?;
    let root = ckb.len();

    if let Some(fixed) = dst_tp.extended_as::<FixedDimType>() {
        let ss = SizeStride::read(dst_meta);
        if let DimSource::Fixed { size, .. } = source {
            broadcast_stride(Some(size), 0, ss.dim_size).map_err(|_| Error::Broadcast {
                src: src_tp.to_string(),
                dst: dst_tp.to_string(),
            })?;
        }
        debug!(%dst_tp, %src_tp, ?source, "fixed dim assignment kernel");
        ckb.emplace_back(FixedDimKernel {
            dim_size: ss.dim_size,
            dst_stride: ss.stride,
            src: source,
            child: 0,
        });
        let child = ckb.len();
        assignment::make_assignment_kernel(
            ckb,
            fixed.element_type(),
            &dst_meta[SizeStride::SIZE..],
            &src_element,
            src_element_meta,
            KernelRequest::Strided,
            errmode,
            ectx,
        )?;
        ckb.get_mut::<FixedDimKernel>(root)?.child = child;
        return Ok(ckb.len());
    }

    if let Some(var) = dst_tp.extended_as::<VarDimType>() {
        let md = VarDimArrmeta::read(dst_meta);
        // SAFETY: `dst_meta` is constructed arrmeta of `dst_tp`.
        let block = unsafe { memory_block::get(&dst_meta[..BLOCKREF_SIZE]) }.ok_or_else(|| {
            Error::Type(format!("arrmeta for {dst_tp} has no memory block to allocate into"))
        })?;
        debug!(%dst_tp, %src_tp, ?source, "var dim assignment kernel");
        ckb.emplace_back(VarDimKernel {
            block,
            dst_stride: md.stride,
            dst_offset: md.offset,
            element_alignment: var.element_type().data_alignment(),
            src: source,
            child: 0,
        });
        let child = ckb.len();
        assignment::make_assignment_kernel(
            ckb,
            var.element_type(),
            &dst_meta[VarDimArrmeta::SIZE..],
            &src_element,
            src_element_meta,
            KernelRequest::Strided,
            errmode,
            ectx,
        )?;
        ckb.get_mut::<VarDimKernel>(root)?.child = child;
        return Ok(ckb.len());
    }

    Err(Error::no_assignment(dst_tp, src_tp))
}
