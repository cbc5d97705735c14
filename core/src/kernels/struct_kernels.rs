//! Field-wise kernels for structs and tuples.
//!
//! Two structs pair their fields by name. When either side is a tuple, fields
//! pair by position.

use smallvec::SmallVec;
use tracing::debug;

use super::builder::{Kernel, KernelBuilder, KernelFrames};
use super::comparison::{self, ComparisonType};
use super::{ErrorMode, KernelRequest, assignment};
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::types::{StructType, Type};

#[derive(Debug, Clone, Copy)]
struct FieldPair {
    dst_offset: usize,
    src_offset: usize,
    child: usize,
}

/// For each field of `dst`, the index of the field of `src` feeding it.
fn pair_fields(dst: &StructType, src: &StructType) -> Option<SmallVec<[usize; 8]>> {
    if dst.field_count() != src.field_count() {
        return None;
    }
    if dst.is_tuple() || src.is_tuple() {
        return Some((0..dst.field_count()).collect());
    }
    dst.fields()
        .iter()
        .map(|f| f.name.as_deref().and_then(|name| src.field_index(name)))
        .collect()
}

fn struct_of(tp: &Type) -> Option<&StructType> {
    tp.extended().and_then(|ext| ext.as_struct())
}

/// Assigns every field with its own child kernel.
#[derive(Debug, Default)]
pub struct StructAssignKernel {
    fields: SmallVec<[FieldPair; 4]>,
}

impl Kernel for StructAssignKernel {
    unsafe fn single(&self, frames: &KernelFrames, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        for field in &self.fields {
            unsafe {
                frames.single(
                    field.child,
                    dst.add(field.dst_offset),
                    &[src[0].add(field.src_offset)],
                )?;
            }
        }
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
pub fn make_struct_assignment_kernel(
    ckb: &mut KernelBuilder,
    dst_tp: &Type,
    dst_meta: &[u8],
    src_tp: &Type,
    src_meta: &[u8],
    _kernreq: KernelRequest,
    errmode: ErrorMode,
    ectx: &EvalContext,
) -> Result<usize> {
    let (Some(dst), Some(src)) = (struct_of(dst_tp), struct_of(src_tp)) else {
        return Err(Error::no_assignment(dst_tp, src_tp));
    };
    let pairing = pair_fields(dst, src).ok_or_else(|| Error::no_assignment(dst_tp, src_tp))?;
    debug!(%dst_tp, %src_tp, fields = pairing.len(), "struct assignment kernel");

    let root = ckb.emplace_back(StructAssignKernel::default());
    let mut fields = SmallVec::new();
    for (i, &j) in pairing.iter().enumerate() {
        let child = ckb.len();
        assignment::make_assignment_kernel(
            ckb,
            &dst.fields()[i].tp,
            dst.field_arrmeta(dst_meta, i),
            &src.fields()[j].tp,
            src.field_arrmeta(src_meta, j),
            KernelRequest::Single,
            errmode,
            ectx,
        )?;
        fields.push(FieldPair {
            dst_offset: dst.data_offset(i),
            src_offset: src.data_offset(j),
            child,
        });
    }
    ckb.get_mut::<StructAssignKernel>(root)?.fields = fields;
    Ok(ckb.len())
}

/// Field-wise equality; `NotEqual` negates the result.
#[derive(Debug)]
pub struct StructCompareKernel {
    fields: SmallVec<[FieldPair; 4]>,
    negate: bool,
}

impl Kernel for StructCompareKernel {
    unsafe fn single(&self, frames: &KernelFrames, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        let mut equal = true;
        for field in &self.fields {
            let mut result = 0u8;
            unsafe {
                frames.single(
                    field.child,
                    &mut result,
                    &[src[0].add(field.dst_offset), src[1].add(field.src_offset)],
                )?;
            }
            if result == 0 {
                equal = false;
                break;
            }
        }
        unsafe { *dst = (equal != self.negate) as u8 };
        Ok(())
    }
}

/// Only equality comparisons are defined on structs.
pub fn make_struct_comparison_kernel(
    ckb: &mut KernelBuilder,
    src0_tp: &Type,
    src0_meta: &[u8],
    src1_tp: &Type,
    src1_meta: &[u8],
    comptype: ComparisonType,
    ectx: &EvalContext,
) -> Result<usize> {
    let (Some(s0), Some(s1)) = (struct_of(src0_tp), struct_of(src1_tp)) else {
        return Err(Error::no_comparison(comptype, src0_tp, src1_tp));
    };
    if !comptype.is_equality() {
        return Err(Error::no_comparison(comptype, src0_tp, src1_tp));
    }
    let pairing =
        pair_fields(s0, s1).ok_or_else(|| Error::no_comparison(comptype, src0_tp, src1_tp))?;
    debug!(%src0_tp, %src1_tp, %comptype, "struct comparison kernel");

    let root = ckb.emplace_back(StructCompareKernel {
        fields: SmallVec::new(),
        negate: comptype == ComparisonType::NotEqual,
    });
    let mut fields = SmallVec::new();
    for (i, &j) in pairing.iter().enumerate() {
        let child = ckb.len();
        comparison::make_comparison_kernel(
            ckb,
            &s0.fields()[i].tp,
            s0.field_arrmeta(src0_meta, i),
            &s1.fields()[j].tp,
            s1.field_arrmeta(src1_meta, j),
            ComparisonType::Equal,
            ectx,
        )?;
        fields.push(FieldPair {
            dst_offset: s0.data_offset(i),
            src_offset: s1.data_offset(j),
            child,
        });
    }
    ckb.get_mut::<StructCompareKernel>(root)?.fields = fields;
    Ok(ckb.len())
}
