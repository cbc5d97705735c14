//! Assignment kernel dispatch.
//!
//! The path is chosen from the two types, in order:
//!
//! 1. either side is an expression: operand/value kernels, buffering through
//!    the value type when neither direct direction applies;
//! 2. both sides are builtin: a scalar conversion, or a plain copy for equal
//!    types;
//! 3. the destination's descriptor, then the source's.

use tracing::debug;

use super::builder::{Kernel, KernelBuilder, KernelFrames};
use super::builtin::BuiltinAssignKernel;
use super::{ErrorMode, KernelRequest, expression};
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::types::{Type, TypeKind};

/// Copies `size` bytes between values with identical layout.
#[derive(Debug, Clone, Copy)]
pub struct PodCopyKernel {
    pub size: usize,
}

impl Kernel for PodCopyKernel {
    unsafe fn single(&self, _frames: &KernelFrames, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        unsafe { core::ptr::copy(src[0], dst, self.size) };
        Ok(())
    }

    unsafe fn strided(
        &self,
        _frames: &KernelFrames,
        dst: *mut u8,
        dst_stride: isize,
        src: &[*const u8],
        src_stride: &[isize],
        count: usize,
        part: super::Partition,
    ) -> Result<()> {
        let size = self.size as isize;
        if part.thread_count == 1 && dst_stride == size && src_stride[0] == size {
            // Contiguous on both sides: one copy for the whole run.
            unsafe { core::ptr::copy(src[0], dst, count * self.size) };
            return Ok(());
        }
        super::partition::for_each_element(dst, dst_stride, src, src_stride, count, part, |d, s| {
            unsafe { core::ptr::copy(s[0], d, self.size) };
            Ok(())
        })
    }
}

/// Appends a kernel assigning one `src_tp` value to one `dst_tp` value and
/// returns the builder's new end offset.
///
/// `ErrorMode::Default` is replaced by the context's mode before any kernel
/// sees it.
#[allow(clippy::too_many_arguments)]
pub fn make_assignment_kernel(
    ckb: &mut KernelBuilder,
    dst_tp: &Type,
    dst_meta: &[u8],
    src_tp: &Type,
    src_meta: &[u8],
    kernreq: KernelRequest,
    errmode: ErrorMode,
    ectx: &EvalContext,
) -> Result<usize> {
    let errmode = ectx.resolve_errmode(errmode);
    for tp in [dst_tp, src_tp] {
        if tp.is_symbolic() {
            return Err(Error::Type(format!(
                "cannot assign values of the symbolic type {tp}"
            )));
        }
    }

    if dst_tp.is_expression() || src_tp.is_expression() {
        debug!(%dst_tp, %src_tp, %errmode, "expression assignment kernel");
        return expression::make_expression_assignment_kernel(
            ckb, dst_tp, dst_meta, src_tp, src_meta, kernreq, errmode, ectx,
        );
    }

    if dst_tp.is_builtin() && src_tp.is_builtin() {
        if [dst_tp, src_tp].iter().any(|tp| tp.kind() == TypeKind::Uninitialized)
            || (dst_tp.kind() == TypeKind::Void) != (src_tp.kind() == TypeKind::Void)
        {
            return Err(Error::no_assignment(dst_tp, src_tp));
        }
        if dst_tp == src_tp {
            debug!(%dst_tp, "builtin copy kernel");
            ckb.emplace_back(PodCopyKernel {
                size: dst_tp.data_size(),
            });
        } else {
            debug!(%dst_tp, %src_tp, %errmode, "builtin assignment kernel");
            ckb.emplace_back(BuiltinAssignKernel {
                dst: dst_tp.id(),
                src: src_tp.id(),
                errmode,
            });
        }
        return Ok(ckb.len());
    }

    // Equal types without strides or references copy as bytes.
    if dst_tp == src_tp && dst_tp.is_pod() && dst_tp.arrmeta_size() == 0 {
        debug!(%dst_tp, "pod copy kernel");
        ckb.emplace_back(PodCopyKernel {
            size: dst_tp.data_size(),
        });
        return Ok(ckb.len());
    }

    let descriptor = dst_tp.extended().or_else(|| src_tp.extended());
    match descriptor {
        Some(ext) => {
            debug!(%dst_tp, %src_tp, %errmode, "descriptor assignment kernel");
            ext.make_assignment_kernel(
                ckb, dst_tp, dst_meta, src_tp, src_meta, kernreq, errmode, ectx,
            )
        }
        None => Err(Error::no_assignment(dst_tp, src_tp)),
    }
}
