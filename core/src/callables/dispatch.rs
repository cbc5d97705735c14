//! Multiple dispatch over concrete overloads of one generic signature.

use std::sync::Arc;

use super::{CallCursor, CallGraph, Callable, CallableRef, KwdValue, apply, signature};
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::kernels::{KernelBuilder, KernelRequest};
use crate::types::{Type, TypeVars, make_callable, make_typevar};

/// A generic callable that forwards to the first overload whose signature
/// accepts the argument types.
#[derive(Debug)]
pub struct DispatchCallable {
    name: String,
    ty: Type,
    overloads: Vec<CallableRef>,
}

impl DispatchCallable {
    pub fn new(name: impl Into<String>, ty: Type, overloads: Vec<CallableRef>) -> Self {
        Self {
            name: name.into(),
            ty,
            overloads,
        }
    }

    pub fn overloads(&self) -> &[CallableRef] {
        &self.overloads
    }

    fn select(&self, src_tps: &[Type]) -> Result<&CallableRef> {
        for overload in &self.overloads {
            let sig = signature(overload.as_ref())?;
            let mut tp_vars = TypeVars::new();
            let accepts = sig.npos() == src_tps.len()
                && sig
                    .pos_types()
                    .iter()
                    .zip(src_tps)
                    .all(|(param, src)| param.matches(src, &mut tp_vars));
            if accepts {
                return Ok(overload);
            }
        }
        let found: Vec<String> = src_tps.iter().map(ToString::to_string).collect();
        let expected: Vec<String> = self.overloads.iter().map(|o| o.ty().to_string()).collect();
        Err(Error::TypeMismatch {
            operation: self.name.clone(),
            expected: format!("one of {}", expected.join(", ")),
            found: format!("({})", found.join(", ")),
        })
    }
}

impl Callable for DispatchCallable {
    fn name(&self) -> &str {
        &self.name
    }

    fn ty(&self) -> &Type {
        &self.ty
    }

    fn resolve(
        &self,
        cg: &mut CallGraph,
        _caller: Option<&dyn Callable>,
        dst_tp: Option<&Type>,
        src_tps: &[Type],
        kwds: &[(&str, KwdValue)],
        tp_vars: &mut TypeVars,
    ) -> Result<Type> {
        let overload = self.select(src_tps)?;
        cg.resolve(overload, Some(self), dst_tp, src_tps, kwds, tp_vars)
    }

    fn instantiate(
        &self,
        cursor: &mut CallCursor<'_>,
        ckb: &mut KernelBuilder,
        dst_tp: &Type,
        dst_meta: &[u8],
        src_tps: &[Type],
        src_metas: &[&[u8]],
        kernreq: KernelRequest,
        kwds: &[(&str, KwdValue)],
        tp_vars: &TypeVars,
        ectx: &EvalContext,
    ) -> Result<()> {
        cursor.instantiate_next(
            ckb, dst_tp, dst_meta, src_tps, src_metas, kernreq, kwds, tp_vars, ectx,
        )
    }
}

macro_rules! int_mod_overloads {
    ($($t:ty),+) => {
        vec![$(apply("mod", |a: $t, b: $t| if b == 0 { 0 } else { a.wrapping_rem(b) })),+]
    };
}

/// `mod : (T, T) -> T` for the integer and floating point types.
/// Integer remainders take the sign of the dividend; a zero divisor gives
/// zero.
pub fn mod_callable() -> CallableRef {
    let t = make_typevar("T");
    let ty = make_callable(t.clone(), vec![t.clone(), t], Vec::new());
    let mut overloads = int_mod_overloads!(i8, i16, i32, i64, u8, u16, u32, u64);
    overloads.push(apply("mod", |a: f32, b: f32| a % b));
    overloads.push(apply("mod", |a: f64, b: f64| a % b));
    Arc::new(DispatchCallable::new("mod", ty, overloads))
}
