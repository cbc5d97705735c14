//! Kernels for expression types.
//!
//! An expression stores an operand and presents a value. When one side of an
//! assignment is exactly the other side's value type, the expression's own
//! operand/value kernel is used. Otherwise the expression side is converted
//! through a scratch buffer holding its value type.

use smallvec::{SmallVec, smallvec};
use tracing::debug;

use super::builder::{Kernel, KernelBuilder, KernelFrames};
use super::comparison::{self, ComparisonType};
use super::{ErrorMode, KernelRequest, assignment};
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::metadata::Arrmeta;
use crate::types::{ExpressionType, Type};

fn expression_of(tp: &Type) -> Option<&dyn ExpressionType> {
    tp.extended().and_then(|ext| ext.as_expression())
}

/// Appends the operand to value kernel of `src_tp`, which must be an
/// expression. `dst_tp` receives the value.
pub fn make_operand_to_value_assignment_kernel(
    ckb: &mut KernelBuilder,
    dst_meta: &[u8],
    src_tp: &Type,
    src_meta: &[u8],
    kernreq: KernelRequest,
    ectx: &EvalContext,
) -> Result<usize> {
    let expr = expression_of(src_tp)
        .ok_or_else(|| Error::Type(format!("{src_tp} is not an expression type")))?;
    expr.make_operand_to_value_assignment_kernel(ckb, dst_meta, src_meta, kernreq, ectx)
}

/// Appends the value to operand kernel of `dst_tp`, which must be an
/// expression.
pub fn make_value_to_operand_assignment_kernel(
    ckb: &mut KernelBuilder,
    dst_tp: &Type,
    dst_meta: &[u8],
    src_meta: &[u8],
    kernreq: KernelRequest,
    ectx: &EvalContext,
) -> Result<usize> {
    let expr = expression_of(dst_tp)
        .ok_or_else(|| Error::Type(format!("{dst_tp} is not an expression type")))?;
    expr.make_value_to_operand_assignment_kernel(ckb, dst_meta, src_meta, kernreq, ectx)
}

/// Scratch storage for one source of a [`BufferedKernel`].
#[derive(Debug)]
struct SourceBuffer {
    /// Arrmeta of the buffered value, owned by the frame.
    meta: Arrmeta,
    data_size: usize,
    /// Child frame filling the buffer from the outer source.
    fill: usize,
}

/// Runs a child kernel on sources first converted into per-call buffers.
///
/// Sources without a buffer are passed through unchanged.
#[derive(Debug, Default)]
pub struct BufferedKernel {
    child: usize,
    buffers: SmallVec<[Option<SourceBuffer>; 2]>,
}

impl BufferedKernel {
    pub fn buffered_count(&self) -> usize {
        self.buffers.iter().flatten().count()
    }
}

impl Kernel for BufferedKernel {
    unsafe fn single(&self, frames: &KernelFrames, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        // Sized up front so the words never move once pointers are taken.
        let mut scratch: SmallVec<[SmallVec<[u64; 8]>; 2]> = self
            .buffers
            .iter()
            .map(|b| match b {
                Some(b) => smallvec![0u64; b.data_size.div_ceil(8).max(1)],
                None => SmallVec::new(),
            })
            .collect();
        let mut args: SmallVec<[*const u8; 4]> = SmallVec::from_slice(src);
        for (i, (buffer, words)) in self.buffers.iter().zip(scratch.iter_mut()).enumerate() {
            if let Some(buffer) = buffer {
                let data = words.as_mut_ptr() as *mut u8;
                unsafe { frames.single(buffer.fill, data, &[src[i]])? };
                args[i] = data;
            }
        }
        unsafe { frames.single(self.child, dst, &args) }
    }
}

/// Builds a buffer for a `value_tp` value and the child frame that fills it
/// from `src_tp`.
fn make_source_buffer(
    ckb: &mut KernelBuilder,
    value_tp: &Type,
    src_tp: &Type,
    src_meta: &[u8],
    errmode: ErrorMode,
    ectx: &EvalContext,
) -> Result<SourceBuffer> {
    let meta = Arrmeta::new(value_tp, &[], None)?;
    let fill = ckb.len();
    assignment::make_assignment_kernel(
        ckb,
        value_tp,
        meta.as_bytes(),
        src_tp,
        src_meta,
        KernelRequest::Single,
        errmode,
        ectx,
    )?;
    Ok(SourceBuffer {
        meta,
        data_size: value_tp.data_size(),
        fill,
    })
}

/// Assignment where at least one side is an expression.
#[allow(clippy::too_many_arguments)]
pub fn make_expression_assignment_kernel(
    ckb: &mut KernelBuilder,
    dst_tp: &Type,
    dst_meta: &[u8],
    src_tp: &Type,
    src_meta: &[u8],
    kernreq: KernelRequest,
    errmode: ErrorMode,
    ectx: &EvalContext,
) -> Result<usize> {
    if let Some(expr) = expression_of(src_tp) {
        if expr.value_type() == dst_tp {
            return expr.make_operand_to_value_assignment_kernel(
                ckb, dst_meta, src_meta, kernreq, ectx,
            );
        }
    }
    if let Some(expr) = expression_of(dst_tp) {
        if expr.value_type() == src_tp {
            return expr.make_value_to_operand_assignment_kernel(
                ckb, dst_meta, src_meta, kernreq, ectx,
            );
        }
    }

    let root = ckb.emplace_back(BufferedKernel::default());
    if src_tp.is_expression() {
        // Read the source as its value type, then assign that to `dst_tp`.
        let value_tp = src_tp.value_type().clone();
        debug!(%dst_tp, %src_tp, %value_tp, "buffering expression source");
        let buffer = make_source_buffer(ckb, &value_tp, src_tp, src_meta, errmode, ectx)?;
        let child = ckb.len();
        assignment::make_assignment_kernel(
            ckb,
            dst_tp,
            dst_meta,
            &value_tp,
            buffer.meta.as_bytes(),
            KernelRequest::Single,
            errmode,
            ectx,
        )?;
        let kernel = ckb.get_mut::<BufferedKernel>(root)?;
        kernel.child = child;
        kernel.buffers.push(Some(buffer));
    } else {
        // Convert the source to the destination's value type, then store it
        // through the destination's operand.
        let value_tp = dst_tp.value_type().clone();
        debug!(%dst_tp, %src_tp, %value_tp, "buffering expression destination");
        let buffer = make_source_buffer(ckb, &value_tp, src_tp, src_meta, errmode, ectx)?;
        let child = ckb.len();
        make_value_to_operand_assignment_kernel(
            ckb,
            dst_tp,
            dst_meta,
            buffer.meta.as_bytes(),
            KernelRequest::Single,
            ectx,
        )?;
        let kernel = ckb.get_mut::<BufferedKernel>(root)?;
        kernel.child = child;
        kernel.buffers.push(Some(buffer));
    }
    Ok(ckb.len())
}

/// Buffers every expression source as its value type, then appends the child
/// built by `make_child` for the buffered types and arrmeta.
///
/// Conversions filling the buffers that ask for `ErrorMode::Default` use
/// `errmode` instead.
pub fn make_buffered_kernel<F>(
    ckb: &mut KernelBuilder,
    src_tps: &[Type],
    src_metas: &[&[u8]],
    errmode: ErrorMode,
    ectx: &EvalContext,
    make_child: F,
) -> Result<usize>
where
    F: FnOnce(&mut KernelBuilder, &[Type], &[&[u8]]) -> Result<usize>,
{
    let fill_ctx = ectx.clone().with_errmode(ectx.resolve_errmode(errmode));
    let root = ckb.emplace_back(BufferedKernel::default());
    let mut buffers: SmallVec<[Option<SourceBuffer>; 2]> = SmallVec::new();
    for (tp, &meta) in src_tps.iter().zip(src_metas) {
        let buffer = if tp.is_expression() {
            let value_tp = tp.value_type().clone();
            Some(make_source_buffer(ckb, &value_tp, tp, meta, ErrorMode::Default, &fill_ctx)?)
        } else {
            None
        };
        buffers.push(buffer);
    }
    let tps: Vec<Type> = buffers
        .iter()
        .zip(src_tps)
        .map(|(b, tp)| b.as_ref().map_or_else(|| tp.clone(), |b| b.meta.tp().clone()))
        .collect();
    let metas: Vec<&[u8]> = buffers
        .iter()
        .zip(src_metas)
        .map(|(b, &meta)| b.as_ref().map_or(meta, |b| b.meta.as_bytes()))
        .collect();
    let child = ckb.len();
    make_child(ckb, &tps, &metas)?;
    drop(metas);
    let kernel = ckb.get_mut::<BufferedKernel>(root)?;
    kernel.child = child;
    kernel.buffers = buffers;
    Ok(ckb.len())
}

/// Comparison where at least one operand is an expression: each expression
/// operand is buffered as its value type, converting with the context's
/// comparison error mode.
pub fn make_buffered_comparison_kernel(
    ckb: &mut KernelBuilder,
    src0_tp: &Type,
    src0_meta: &[u8],
    src1_tp: &Type,
    src1_meta: &[u8],
    comptype: ComparisonType,
    ectx: &EvalContext,
) -> Result<usize> {
    make_buffered_kernel(
        ckb,
        &[src0_tp.clone(), src1_tp.clone()],
        &[src0_meta, src1_meta],
        ectx.resolve_comparison_errmode(ErrorMode::Default),
        ectx,
        |ckb, tps, metas| {
            comparison::make_comparison_kernel(ckb, &tps[0], metas[0], &tps[1], metas[1], comptype, ectx)
        },
    )
}
