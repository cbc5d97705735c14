//! Callables wrapping plain Rust functions of scalars.

use core::fmt;
use core::marker::PhantomData;
use std::sync::Arc;

use super::{CallCursor, CallGraph, Callable, CallableRef, KwdValue};
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::kernels::{Kernel, KernelBuilder, KernelFrames, KernelRequest};
use crate::types::{Type, TypeVars, make_callable};
use crate::value::Primitive;

/// A function whose parameters and result are [`Primitive`] scalars.
/// `Args` is the tuple of parameter types.
pub trait ScalarFn<Args>: Send + Sync + 'static {
    fn param_types() -> Vec<Type>;

    fn return_type() -> Type;

    /// # Safety
    ///
    /// `dst` and `src` must point to values of the return and parameter
    /// types.
    unsafe fn invoke(&self, dst: *mut u8, src: &[*const u8]);
}

macro_rules! impl_scalar_fn {
    ($($arg:ident $idx:tt),+) => {
        impl<Func, Ret, $($arg),+> ScalarFn<($($arg,)+)> for Func
        where
            Func: Fn($($arg),+) -> Ret + Send + Sync + 'static,
            Ret: Primitive,
            $($arg: Primitive),+
        {
            fn param_types() -> Vec<Type> {
                vec![$(<$arg as Primitive>::tp()),+]
            }

            fn return_type() -> Type {
                Ret::tp()
            }

            unsafe fn invoke(&self, dst: *mut u8, src: &[*const u8]) {
                let ret = (self)($(unsafe { <$arg as Primitive>::read_from(src[$idx]) }),+);
                unsafe { ret.write_to(dst) };
            }
        }
    };
}

impl_scalar_fn!(A 0);
impl_scalar_fn!(A 0, B 1);
impl_scalar_fn!(A 0, B 1, C 2);

struct ApplyKernel<F, Args> {
    func: Arc<F>,
    _args: PhantomData<fn(Args)>,
}

impl<F: ScalarFn<Args>, Args: 'static> Kernel for ApplyKernel<F, Args> {
    unsafe fn single(&self, _frames: &KernelFrames, dst: *mut u8, src: &[*const u8]) -> Result<()> {
        unsafe { self.func.invoke(dst, src) };
        Ok(())
    }
}

/// Applies a Rust function element by element.
pub struct ApplyFunctionCallable<F, Args> {
    name: String,
    ty: Type,
    func: Arc<F>,
    _args: PhantomData<fn(Args)>,
}

impl<F: ScalarFn<Args>, Args: 'static> ApplyFunctionCallable<F, Args> {
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            ty: make_callable(F::return_type(), F::param_types(), Vec::new()),
            func: Arc::new(func),
            _args: PhantomData,
        }
    }
}

/// Shorthand for a shared [`ApplyFunctionCallable`].
pub fn apply<F: ScalarFn<Args>, Args: 'static>(name: &str, func: F) -> CallableRef {
    Arc::new(ApplyFunctionCallable::new(name, func))
}

impl<F, Args> fmt::Debug for ApplyFunctionCallable<F, Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplyFunctionCallable")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .finish()
    }
}

impl<F: ScalarFn<Args>, Args: 'static> Callable for ApplyFunctionCallable<F, Args> {
    fn name(&self) -> &str {
        &self.name
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
        let params = F::param_types();
        if params.len() != src_tps.len() {
            return Err(Error::ArityMismatch {
                callable: self.name.clone(),
                expected: params.len(),
                found: src_tps.len(),
            });
        }
        for (i, (param, src)) in params.iter().zip(src_tps).enumerate() {
            if param != src {
                return Err(Error::TypeMismatch {
                    operation: format!("argument {i} of {}", self.name),
                    expected: param.to_string(),
                    found: src.to_string(),
                });
            }
        }
        Ok(F::return_type())
    }

    fn instantiate(
        &self,
        _cursor: &mut CallCursor<'_>,
        ckb: &mut KernelBuilder,
        _dst_tp: &Type,
        _dst_meta: &[u8],
        _src_tps: &[Type],
        _src_metas: &[&[u8]],
        _kernreq: KernelRequest,
        _kwds: &[(&str, KwdValue)],
        _tp_vars: &TypeVars,
        _ectx: &EvalContext,
    ) -> Result<()> {
        ckb.emplace_back(ApplyKernel::<F, Args> {
            func: self.func.clone(),
            _args: PhantomData,
        });
        Ok(())
    }
}
