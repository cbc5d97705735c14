//! `assign : (Any, errmode: ?string) -> Any`.

use super::{CallCursor, CallGraph, Callable, KwdValue, kwd, single_arg};
use crate::errors::{Error, Result};
use crate::eval_context::EvalContext;
use crate::kernels::{self, ErrorMode, KernelBuilder, KernelRequest};
use crate::types::{KwdParam, StringEncoding, Type, TypeVars, make_any, make_callable, make_string};

/// Assignment as a callable. The destination type is whatever the caller
/// asks for; the optional `errmode` keyword names an [`ErrorMode`].
#[derive(Debug)]
pub struct AssignCallable {
    ty: Type,
}

impl AssignCallable {
    pub fn new() -> Self {
        Self {
            ty: make_callable(
                make_any(),
                vec![make_any()],
                vec![KwdParam::optional("errmode", make_string(StringEncoding::Utf8))],
            ),
        }
    }
}

impl Default for AssignCallable {
    fn default() -> Self {
        Self::new()
    }
}

fn errmode_of(kwds: &[(&str, KwdValue)]) -> Result<ErrorMode> {
    match kwd(kwds, "errmode") {
        None => Ok(ErrorMode::Default),
        Some(KwdValue::Str(name)) => ErrorMode::from_name(name).map_err(|e| Error::Keyword {
            callable: "assign".to_string(),
            message: e.to_string(),
        }),
        Some(other) => Err(Error::Keyword {
            callable: "assign".to_string(),
            message: format!("errmode must be a string, got {other:?}"),
        }),
    }
}

impl Callable for AssignCallable {
    fn name(&self) -> &str {
        "assign"
    }

    fn ty(&self) -> &Type {
        &self.ty
    }

    fn resolve(
        &self,
        _cg: &mut CallGraph,
        _caller: Option<&dyn Callable>,
        dst_tp: Option<&Type>,
        src_tps: &[Type],
        kwds: &[(&str, KwdValue)],
        _tp_vars: &mut TypeVars,
    ) -> Result<Type> {
        single_arg(self, src_tps)?;
        errmode_of(kwds)?;
        dst_tp
            .cloned()
            .ok_or_else(|| Error::Type("assign needs the destination type from its caller".to_string()))
    }

    fn instantiate(
        &self,
        _cursor: &mut CallCursor<'_>,
        ckb: &mut KernelBuilder,
        dst_tp: &Type,
        dst_meta: &[u8],
        src_tps: &[Type],
        src_metas: &[&[u8]],
        kernreq: KernelRequest,
        kwds: &[(&str, KwdValue)],
        _tp_vars: &TypeVars,
        ectx: &EvalContext,
    ) -> Result<()> {
        let errmode = errmode_of(kwds)?;
        kernels::make_assignment_kernel(
            ckb,
            dst_tp,
            dst_meta,
            single_arg(self, src_tps)?,
            single_arg(self, src_metas)?,
            kernreq,
            errmode,
            ectx,
        )?;
        Ok(())
    }
}
