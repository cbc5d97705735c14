//! `binary_search : (N * T, T) -> int64` over a fixed dimension sorted by
//! the `sorting_less` order.

use std::sync::Arc;

use tracing::debug;

use super::{CallCursor, CallGraph, Callable, CallableRef, KwdValue};
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::kernels::{
    ComparisonType, Kernel, KernelBuilder, KernelFrames, KernelRequest, make_comparison_kernel,
};
use crate::metadata::SizeStride;
use crate::types::{
    DimType, FixedDimType, Type, TypeKind, TypeVars, make_callable, make_typevar, make_typevar_dim,
};

pub fn binary_search() -> CallableRef {
    Arc::new(BinarySearchCallable::new())
}

#[derive(Debug)]
pub struct BinarySearchCallable {
    ty: Type,
}

impl BinarySearchCallable {
    pub fn new() -> Self {
        let t = make_typevar("T");
        Self {
            ty: make_callable(
                Type::int64(),
                vec![make_typevar_dim("N", t.clone()), t],
                Vec::new(),
            ),
        }
    }

    fn unpack<'a, T>(&self, args: &'a [T]) -> Result<(&'a T, &'a T)> {
        match args {
            [haystack, key] => Ok((haystack, key)),
            _ => Err(Error::ArityMismatch {
                callable: self.name().to_string(),
                expected: 2,
                found: args.len(),
            }),
        }
    }

    fn fixed_dim<'a>(&self, tp: &'a Type) -> Result<&'a FixedDimType> {
        tp.extended_as::<FixedDimType>()
            .ok_or_else(|| Error::TypeMismatch {
                operation: self.name().to_string(),
                expected: "a fixed dimension".to_string(),
                found: tp.to_string(),
            })
    }
}

impl Default for BinarySearchCallable {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes the index of an element equal to the key, or -1.
#[derive(Debug)]
struct BinarySearchKernel {
    dim_size: usize,
    stride: isize,
    element_less_key: usize,
    key_less_element: usize,
}

impl BinarySearchKernel {
    unsafe fn less(
        frames: &KernelFrames,
        child: usize,
        a: *const u8,
        b: *const u8,
    ) -> Result<bool> {
        let mut result = 0u8;
        unsafe { frames.single(child, &mut result, &[a, b])? };
        Ok(result != 0)
    }
}

impl Kernel for BinarySearchKernel {
    unsafe fn single(&self, frames: &KernelFrames, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        let (haystack, key) = (src[0], src[1]);
        let (mut lo, mut hi) = (0usize, self.dim_size);
        let mut found = -1i64;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let element = haystack.wrapping_offset(mid as isize * self.stride);
            if unsafe { Self::less(frames, self.element_less_key, element, key)? } {
                lo = mid + 1;
            } else if unsafe { Self::less(frames, self.key_less_element, key, element)? } {
                hi = mid;
            } else {
                found = mid as i64;
                break;
            }
        }
        unsafe { core::ptr::write_unaligned(dst as *mut i64, found) };
        Ok(())
    }
}

impl Callable for BinarySearchCallable {
    fn name(&self) -> &str {
        "binary_search"
    }

    fn ty(&self) -> &Type {
        &self.ty
    }

    fn resolve(
        &self,
        _cg: &mut CallGraph,
        _caller: Option<&dyn Callable>,
        _dst_tp: Option<&Type>,
        src_tps: &[Type],
        _kwds: &[(&str, KwdValue)],
        _tp_vars: &mut TypeVars,
    ) -> Result<Type> {
        let (haystack, key) = self.unpack(src_tps)?;
        let element = self.fixed_dim(haystack)?.element_type();
        // Equality is the only order these kinds have.
        if matches!(element.kind(), TypeKind::Complex | TypeKind::Struct | TypeKind::Tuple) {
            return Err(Error::no_comparison(ComparisonType::SortingLess, element, key));
        }
        Ok(Type::int64())
    }

    fn instantiate(
        &self,
        _cursor: &mut CallCursor<'_>,
        ckb: &mut KernelBuilder,
        _dst_tp: &Type,
        _dst_meta: &[u8],
        src_tps: &[Type],
        src_metas: &[&[u8]],
        _kernreq: KernelRequest,
        _kwds: &[(&str, KwdValue)],
        _tp_vars: &TypeVars,
        ectx: &EvalContext,
    ) -> Result<()> {
        let (haystack, key) = self.unpack(src_tps)?;
        let (haystack_meta, key_meta) = self.unpack(src_metas)?;
        let element = self.fixed_dim(haystack)?.element_type();
        let element_meta = &haystack_meta[SizeStride::SIZE..];
        let SizeStride { dim_size, stride } = SizeStride::read(haystack_meta);
        debug!(%element, dim_size, stride, "binary search kernel");

        let root = ckb.emplace_back(BinarySearchKernel {
            dim_size,
            stride,
            element_less_key: 0,
            key_less_element: 0,
        });
        let element_less_key = ckb.len();
        make_comparison_kernel(
            ckb,
            element,
            element_meta,
            key,
            key_meta,
            ComparisonType::SortingLess,
            ectx,
        )?;
        let key_less_element = ckb.len();
        make_comparison_kernel(
            ckb,
            key,
            key_meta,
            element,
            element_meta,
            ComparisonType::SortingLess,
            ectx,
        )?;
        let kernel = ckb.get_mut::<BinarySearchKernel>(root)?;
        kernel.element_less_key = element_less_key;
        kernel.key_less_element = key_less_element;
        Ok(())
    }
}
