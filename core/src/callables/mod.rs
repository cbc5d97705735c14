//! Callables: named operations with (possibly symbolic) signatures.
//!
//! Calling one is a two-phase protocol:
//!
//! 1. [`plan`] matches the argument types against the signature, binding the
//!    type variables once for every parameter, and runs
//!    [`Callable::resolve`], which fixes the concrete return type and records
//!    the call steps in a [`CallGraph`]. No kernel frame is built.
//! 2. [`Plan::instantiate`] walks the graph with a [`CallCursor`] and asks
//!    each step to emplace its frames into a [`KernelBuilder`].
//!
//! An expression can therefore be fully type checked, and its destination
//! allocated, before any kernel state exists.

pub mod apply;
pub mod assign;
pub mod binary_search;
mod call_graph;
pub mod dispatch;
pub mod field_access;
pub mod registry;
pub mod string_functions;

#[cfg(test)]
mod callables_test;

use core::fmt;
use std::sync::Arc;

use tracing::debug;

pub use apply::{ApplyFunctionCallable, ScalarFn, apply};
pub use assign::AssignCallable;
pub use binary_search::BinarySearchCallable;
pub use call_graph::{CallCursor, CallGraph, CallNode};
pub use dispatch::DispatchCallable;
pub use field_access::FieldAccessCallable;
pub use registry::Registry;

use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::kernels::{CompiledKernel, KernelBuilder, KernelRequest};
use crate::types::{CallableType, StringEncoding, Type, TypeVars, make_string};
use crate::value::Buffer;

pub type CallableRef = Arc<dyn Callable>;

/// A keyword argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum KwdValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl KwdValue {
    pub fn tp(&self) -> Type {
        match self {
            KwdValue::Bool(_) => Type::bool_(),
            KwdValue::Int(_) => Type::int64(),
            KwdValue::Float(_) => Type::float64(),
            KwdValue::Str(_) => make_string(StringEncoding::Utf8),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            KwdValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for KwdValue {
    fn from(s: &str) -> Self {
        KwdValue::Str(s.to_string())
    }
}

/// Looks up a keyword argument by name.
pub fn kwd<'a>(kwds: &'a [(&str, KwdValue)], name: &str) -> Option<&'a KwdValue> {
    kwds.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
}

/// The only argument of a unary callable.
pub(crate) fn single_arg<'a, T>(callable: &dyn Callable, args: &'a [T]) -> Result<&'a T> {
    match args {
        [arg] => Ok(arg),
        _ => Err(Error::ArityMismatch {
            callable: callable.name().to_string(),
            expected: 1,
            found: args.len(),
        }),
    }
}

pub trait Callable: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// The signature, a callable type.
    fn ty(&self) -> &Type;

    /// Determines the concrete return type for these argument types.
    ///
    /// `tp_vars` holds the bindings made while matching the signature, and
    /// `kwds` the keyword values, already checked against their declared
    /// types. Any error that does not depend on arrmeta is raised here.
    /// Implementations that delegate to other callables go through
    /// [`CallGraph::resolve`], so that each step is recorded in order.
    #[allow(clippy::too_many_arguments)]
    fn resolve(
        &self,
        cg: &mut CallGraph,
        caller: Option<&dyn Callable>,
        dst_tp: Option<&Type>,
        src_tps: &[Type],
        kwds: &[(&str, KwdValue)],
        tp_vars: &mut TypeVars,
    ) -> Result<Type>;

    /// Emplaces the frames of this step. Steps recorded by nested resolves
    /// are instantiated through `cursor`, in the order they were resolved.
    #[allow(clippy::too_many_arguments)]
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
    ) -> Result<()>;
}

/// Signature of `callable`, which must be a callable type.
pub fn signature(callable: &dyn Callable) -> Result<&CallableType> {
    callable
        .ty()
        .extended()
        .and_then(|ext| ext.as_callable())
        .ok_or_else(|| {
            Error::Type(format!(
                "{} has type {}, which is not a callable type",
                callable.name(),
                callable.ty()
            ))
        })
}

/// The result of resolving a call: a concrete return type and the recorded
/// call steps, ready to instantiate.
#[derive(Debug)]
pub struct Plan {
    graph: CallGraph,
    dst_tp: Type,
    src_tps: Vec<Type>,
    kwds: Vec<(String, KwdValue)>,
    tp_vars: TypeVars,
}

impl Plan {
    pub fn dst_tp(&self) -> &Type {
        &self.dst_tp
    }

    pub fn src_tps(&self) -> &[Type] {
        &self.src_tps
    }

    pub fn graph(&self) -> &CallGraph {
        &self.graph
    }

    pub fn tp_vars(&self) -> &TypeVars {
        &self.tp_vars
    }

    /// Builds the kernel for arrays described by `dst_meta` and `src_metas`.
    pub fn instantiate(
        &self,
        dst_meta: &[u8],
        src_metas: &[&[u8]],
        kernreq: KernelRequest,
        ectx: &EvalContext,
    ) -> Result<CompiledKernel> {
        if src_metas.len() != self.src_tps.len() {
            return Err(Error::Type(format!(
                "plan has {} sources, but arrmeta for {} was provided",
                self.src_tps.len(),
                src_metas.len()
            )));
        }
        let kwds: Vec<(&str, KwdValue)> = self
            .kwds
            .iter()
            .map(|(name, value)| (name.as_str(), value.clone()))
            .collect();
        let mut ckb = KernelBuilder::new();
        let mut cursor = self.graph.cursor();
        cursor.instantiate_next(
            &mut ckb,
            &self.dst_tp,
            dst_meta,
            &self.src_tps,
            src_metas,
            kernreq,
            &kwds,
            &self.tp_vars,
            ectx,
        )?;
        ckb.finish()
    }
}

/// Resolves a call of `callable` with arguments of `src_tps`.
///
/// `dst_tp`, when given, is the type the caller wants back; callables with a
/// symbolic return type (such as assignment) need it.
pub fn plan(
    callable: &CallableRef,
    dst_tp: Option<&Type>,
    src_tps: &[Type],
    kwds: &[(&str, KwdValue)],
) -> Result<Plan> {
    let name = callable.name().to_string();
    let sig = signature(callable.as_ref())?;

    if sig.npos() != src_tps.len() {
        return Err(Error::ArityMismatch {
            callable: name,
            expected: sig.npos(),
            found: src_tps.len(),
        });
    }

    let mut tp_vars = TypeVars::new();
    for (i, (param, arg)) in sig.pos_types().iter().zip(src_tps).enumerate() {
        let mut trial = tp_vars.clone();
        if param.matches(arg, &mut trial) {
            tp_vars = trial;
            continue;
        }
        // Report the first variable this parameter shares with an earlier
        // one, if that is what failed.
        let mut vars: Vec<String> = param.vars().into_iter().collect();
        vars.sort();
        if let Some((var, bound)) = vars
            .iter()
            .find_map(|v| tp_vars.get(v.as_str()).map(|bound| (v, bound)))
        {
            return Err(Error::TypeVarConflict {
                name: var.clone(),
                bound: bound.to_string(),
                found: arg.to_string(),
            });
        }
        return Err(Error::TypeMismatch {
            operation: format!("argument {i} of {name}"),
            expected: param.to_string(),
            found: arg.to_string(),
        });
    }

    for (kwd_name, value) in kwds {
        let Some(index) = sig.kwd_index(kwd_name) else {
            return Err(Error::Keyword {
                callable: name,
                message: format!("unexpected keyword argument {kwd_name:?}"),
            });
        };
        let param = &sig.kwds()[index];
        let found = value.tp();
        if !param.tp.matches(&found, &mut tp_vars) {
            return Err(Error::Keyword {
                callable: name,
                message: format!(
                    "keyword {kwd_name:?} expects {}, but {found} was provided",
                    param.tp
                ),
            });
        }
    }
    for param in sig.kwds() {
        if !param.optional && kwd(kwds, &param.name).is_none() {
            return Err(Error::Keyword {
                callable: name,
                message: format!("missing required keyword argument {:?}", param.name),
            });
        }
    }

    let declared = sig.return_type().substitute(&tp_vars, false)?;
    let mut graph = CallGraph::new();
    let ret = graph.resolve(callable, None, dst_tp, src_tps, kwds, &mut tp_vars)?;
    if ret.is_symbolic() {
        return Err(Error::Type(format!(
            "{name} did not resolve to a concrete return type, got {ret}"
        )));
    }
    if !declared.is_symbolic() && declared != ret {
        return Err(Error::TypeMismatch {
            operation: format!("return of {name}"),
            expected: declared.to_string(),
            found: ret.to_string(),
        });
    }
    if let Some(dst_tp) = dst_tp {
        if dst_tp != &ret {
            return Err(Error::TypeMismatch {
                operation: format!("destination of {name}"),
                expected: ret.to_string(),
                found: dst_tp.to_string(),
            });
        }
    }
    debug!(callable = %name, %ret, steps = graph.len(), "resolved call");

    Ok(Plan {
        graph,
        dst_tp: ret,
        src_tps: src_tps.to_vec(),
        kwds: kwds
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect(),
        tp_vars,
    })
}

/// Plans, allocates a destination of the resolved type, and runs the call
/// once on `args`.
pub fn call(
    callable: &CallableRef,
    args: &[&Buffer],
    kwds: &[(&str, KwdValue)],
    ectx: &EvalContext,
) -> Result<Buffer> {
    let src_tps: Vec<Type> = args.iter().map(|a| a.tp().clone()).collect();
    let plan = plan(callable, None, &src_tps, kwds)?;
    let mut dst = Buffer::new(plan.dst_tp())?;
    run(&plan, &mut dst, args, ectx)?;
    Ok(dst)
}

/// Like [`call`], writing into an existing destination whose type is passed
/// to resolution.
pub fn call_into(
    callable: &CallableRef,
    dst: &mut Buffer,
    args: &[&Buffer],
    kwds: &[(&str, KwdValue)],
    ectx: &EvalContext,
) -> Result<()> {
    let src_tps: Vec<Type> = args.iter().map(|a| a.tp().clone()).collect();
    let dst_tp = dst.tp().clone();
    let plan = plan(callable, Some(&dst_tp), &src_tps, kwds)?;
    run(&plan, dst, args, ectx)
}

fn run(plan: &Plan, dst: &mut Buffer, args: &[&Buffer], ectx: &EvalContext) -> Result<()> {
    let src_metas: Vec<&[u8]> = args.iter().map(|a| a.arrmeta()).collect();
    let kernel = plan.instantiate(dst.arrmeta(), &src_metas, KernelRequest::Single, ectx)?;
    let src: Vec<*const u8> = args.iter().map(|a| a.as_ptr()).collect();
    // SAFETY: every pointer is the data of a buffer whose type and arrmeta
    // the kernel was instantiated for.
    unsafe { kernel.single(dst.as_mut_ptr(), &src) }
}
