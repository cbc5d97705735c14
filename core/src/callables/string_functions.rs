//! Array functions of the string types.

use std::sync::Arc;

use super::{CallCursor, CallGraph, Callable, CallableRef, KwdValue, single_arg};
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::kernels::{ErrorMode, Kernel, KernelBuilder, KernelFrames, KernelRequest, expression};
use crate::metadata::Arrmeta;
use crate::types::{StringEncoding, Type, TypeVars, make_any, make_callable};

/// `utf8_len : (Any) -> int64`, the number of bytes the string takes when
/// encoded as UTF-8.
pub fn utf8_len() -> CallableRef {
    Arc::new(Utf8LengthCallable::new())
}

#[derive(Debug)]
pub struct Utf8LengthCallable {
    ty: Type,
}

impl Utf8LengthCallable {
    pub fn new() -> Self {
        Self {
            ty: make_callable(Type::int64(), vec![make_any()], Vec::new()),
        }
    }
}

impl Default for Utf8LengthCallable {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct Utf8LengthKernel {
    src_meta: Arrmeta,
}

impl Kernel for Utf8LengthKernel {
    unsafe fn single(&self, _frames: &KernelFrames, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        let tp = self
            .src_meta
            .tp()
            .extended()
            .and_then(|ext| ext.as_string())
            .ok_or_else(|| Error::Type(format!("{} is not a string type", self.src_meta.tp())))?;
        let bytes = unsafe { tp.string_range(self.src_meta.as_bytes(), src[0])? };
        let len = match tp.encoding() {
            StringEncoding::Utf8 | StringEncoding::Ascii => bytes.len(),
            encoding => encoding.decode(bytes, ErrorMode::None)?.len(),
        };
        unsafe { core::ptr::write_unaligned(dst as *mut i64, len as i64) };
        Ok(())
    }
}

impl Callable for Utf8LengthCallable {
    fn name(&self) -> &str {
        "utf8_len"
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
        let src_tp = single_arg(self, src_tps)?;
        if src_tp.value_type().extended().and_then(|ext| ext.as_string()).is_none() {
            return Err(Error::TypeMismatch {
                operation: "utf8_len".to_string(),
                expected: "a string type".to_string(),
                found: src_tp.to_string(),
            });
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
        let src_tp = single_arg(self, src_tps)?;
        single_arg(self, src_metas)?;
        let make = |ckb: &mut KernelBuilder, tps: &[Type], metas: &[&[u8]]| -> Result<usize> {
            let (tp, meta) = (single_arg(self, tps)?, single_arg(self, metas)?);
            // SAFETY: `meta` is constructed arrmeta of `tp`.
            let src_meta = unsafe { Arrmeta::copy_of(tp, meta) };
            ckb.emplace_back(Utf8LengthKernel { src_meta });
            Ok(ckb.len())
        };
        if src_tp.is_expression() {
            expression::make_buffered_kernel(
                ckb,
                src_tps,
                src_metas,
                ErrorMode::Default,
                ectx,
                make,
            )?;
        } else {
            make(ckb, src_tps, src_metas)?;
        }
        Ok(())
    }
}
