//! `field_access : (Any, field: string) -> Any`, one named field of a struct.

use std::sync::Arc;

use tracing::debug;

use super::{CallCursor, CallGraph, Callable, CallableRef, KwdValue, kwd, single_arg};
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::kernels::{self, ErrorMode, Kernel, KernelBuilder, KernelFrames, KernelRequest};
use crate::types::{
    KwdParam, StringEncoding, StructType, Type, TypeVars, make_any, make_callable, make_string,
};

pub fn field_access() -> CallableRef {
    Arc::new(FieldAccessCallable::new())
}

#[derive(Debug)]
pub struct FieldAccessCallable {
    ty: Type,
}

impl FieldAccessCallable {
    pub fn new() -> Self {
        Self {
            ty: make_callable(
                make_any(),
                vec![make_any()],
                vec![KwdParam::required("field", make_string(StringEncoding::Utf8))],
            ),
        }
    }

    /// The struct argument and the index of the requested field.
    fn lookup<'a>(
        &self,
        src_tps: &'a [Type],
        kwds: &[(&str, KwdValue)],
    ) -> Result<(&'a StructType, usize)> {
        let src_tp = single_arg(self, src_tps)?;
        let name = kwd(kwds, "field")
            .and_then(KwdValue::as_str)
            .ok_or_else(|| Error::Keyword {
                callable: self.name().to_string(),
                message: "field must be given as a string".to_string(),
            })?;
        let st = src_tp
            .extended_as::<StructType>()
            .filter(|st| !st.is_tuple())
            .ok_or_else(|| Error::TypeMismatch {
                operation: self.name().to_string(),
                expected: "a struct type".to_string(),
                found: src_tp.to_string(),
            })?;
        let index = st
            .field_index(name)
            .ok_or_else(|| Error::Type(format!("{src_tp} has no field named {name:?}")))?;
        Ok((st, index))
    }
}

impl Default for FieldAccessCallable {
    fn default() -> Self {
        Self::new()
    }
}

/// Offsets the struct pointer to the field and assigns it through the child.
#[derive(Debug)]
struct FieldAccessKernel {
    offset: usize,
    child: usize,
}

impl Kernel for FieldAccessKernel {
    unsafe fn single(&self, frames: &KernelFrames, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        unsafe { frames.single(self.child, dst, &[src[0].add(self.offset)]) }
    }
}

impl Callable for FieldAccessCallable {
    fn name(&self) -> &str {
        "field_access"
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
        kwds: &[(&str, KwdValue)],
        _tp_vars: &mut TypeVars,
    ) -> Result<Type> {
        let (st, index) = self.lookup(src_tps, kwds)?;
        Ok(st.fields()[index].tp.clone())
    }

    fn instantiate(
        &self,
        _cursor: &mut CallCursor<'_>,
        ckb: &mut KernelBuilder,
        dst_tp: &Type,
        dst_meta: &[u8],
        src_tps: &[Type],
        src_metas: &[&[u8]],
        _kernreq: KernelRequest,
        kwds: &[(&str, KwdValue)],
        _tp_vars: &TypeVars,
        ectx: &EvalContext,
    ) -> Result<()> {
        let (st, index) = self.lookup(src_tps, kwds)?;
        let src_meta = single_arg(self, src_metas)?;
        let offset = st.data_offset(index);
        debug!(field = index, offset, "field access kernel");
        let root = ckb.emplace_back(FieldAccessKernel { offset, child: 0 });
        let child = ckb.len();
        kernels::make_assignment_kernel(
            ckb,
            dst_tp,
            dst_meta,
            &st.fields()[index].tp,
            st.field_arrmeta(src_meta, index),
            KernelRequest::Single,
            ErrorMode::Default,
            ectx,
        )?;
        ckb.get_mut::<FieldAccessKernel>(root)?.child = child;
        Ok(())
    }
}
